use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use chrono::{DateTime, Utc};

use super::types::MessageRecord;

/// Merge per-session batches into one stream ordered by
/// `(timestamp, session_id)`.
///
/// Only the head of each batch competes, so a session's records always come
/// out in the order they were read, even if its own timestamps step backwards.
pub fn merge_batches(batches: Vec<Vec<MessageRecord>>) -> Vec<MessageRecord> {
    let total = batches.iter().map(Vec::len).sum();
    let mut queues: Vec<VecDeque<MessageRecord>> = batches
        .into_iter()
        .filter(|batch| !batch.is_empty())
        .map(VecDeque::from)
        .collect();

    let mut heap: BinaryHeap<Reverse<(DateTime<Utc>, String, usize)>> = queues
        .iter()
        .enumerate()
        .filter_map(|(idx, queue)| queue.front().map(|r| Reverse(head_key(r, idx))))
        .collect();

    let mut merged = Vec::with_capacity(total);
    while let Some(Reverse((_, _, idx))) = heap.pop() {
        let Some(record) = queues[idx].pop_front() else {
            continue;
        };
        merged.push(record);
        if let Some(next) = queues[idx].front() {
            heap.push(Reverse(head_key(next, idx)));
        }
    }

    merged
}

fn head_key(record: &MessageRecord, idx: usize) -> (DateTime<Utc>, String, usize) {
    (record.timestamp, record.session_id.clone(), idx)
}

/// Keep the `count` most recent records of an already merged stream.
pub fn last_n(mut merged: Vec<MessageRecord>, count: usize) -> Vec<MessageRecord> {
    let skip = merged.len().saturating_sub(count);
    merged.drain(..skip);
    merged
}
