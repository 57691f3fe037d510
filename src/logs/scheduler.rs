use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::discovery::{DiscoveryFilter, SessionScan, list_agents, scan_sessions};
use super::error::TailError;
use super::merge::{last_n, merge_batches};
use super::reader::{SessionReader, StartAt};
use super::types::{MessageRecord, ReadCursor, SessionDescriptor};
use super::watcher::{ChangeNotifier, Wake};

#[derive(Debug, Clone)]
pub struct TailConfig {
    /// Agents root, e.g. `~/.openclaw/agents`.
    pub root: PathBuf,
    pub filter: DiscoveryFilter,
    /// Records to replay before following; 0 skips replay.
    pub replay_count: usize,
    pub follow: bool,
    pub poll_interval: Duration,
    pub rescan_interval: Duration,
    /// Use filesystem events in addition to polling.
    pub watch_events: bool,
}

impl TailConfig {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            filter: DiscoveryFilter::default(),
            replay_count: 0,
            follow: true,
            poll_interval: Duration::from_millis(500),
            rescan_interval: Duration::from_secs(5),
            watch_events: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailState {
    Replay,
    Follow,
    Done,
}

/// What the scheduler hands to the presentation layer. The channel closing
/// marks the end of the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TailEvent {
    Record(MessageRecord),
    ReplayComplete { emitted: usize },
    /// Follow mode has begun.
    Started { sessions: usize, agents: Vec<String> },
    SessionsAdded(usize),
    Error(String),
}

/// Merges every discovered session into one time-ordered stream.
///
/// Owns the open readers for the lifetime of a run; they are all closed when
/// the state reaches `Done`.
pub struct Tailer {
    config: TailConfig,
    state: TailState,
    readers: BTreeMap<String, SessionReader>,
    /// Cursors of sessions that dropped out of discovery, restored if they
    /// come back.
    parked: BTreeMap<String, ReadCursor>,
    /// Whether a discovery pass has succeeded yet. Until then every existing
    /// transcript counts as history.
    discovered_once: bool,
    last_scan: Option<Instant>,
}

impl Tailer {
    pub fn new(config: TailConfig) -> Self {
        let state = if config.replay_count > 0 {
            TailState::Replay
        } else if config.follow {
            TailState::Follow
        } else {
            TailState::Done
        };

        Self {
            config,
            state,
            readers: BTreeMap::new(),
            parked: BTreeMap::new(),
            discovered_once: false,
            last_scan: None,
        }
    }

    pub fn state(&self) -> TailState {
        self.state
    }

    pub fn session_count(&self) -> usize {
        self.readers.len()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &SessionDescriptor> {
        self.readers.values().map(SessionReader::descriptor)
    }

    /// Initial discovery plus replay. Returns the replayed records (empty when
    /// no replay was requested) and leaves the tailer in `Follow` or `Done`.
    ///
    /// On a discovery failure the tailer still moves on to `Follow` (or `Done`)
    /// with no sessions, so a follow loop can retry on the next rescan.
    pub fn start(&mut self) -> Result<Vec<MessageRecord>, TailError> {
        let replaying = self.state == TailState::Replay;
        let discovered = self.discover();
        let next = if self.config.follow {
            TailState::Follow
        } else {
            TailState::Done
        };

        let descriptors = match discovered {
            Ok(scan) => scan.sessions,
            Err(e) => {
                self.transition(next);
                return Err(e);
            }
        };
        self.discovered_once = true;

        let start = if replaying {
            StartAt::Beginning
        } else {
            StartAt::End
        };
        for descriptor in descriptors {
            self.open_reader(descriptor, start);
        }

        let replayed = if replaying {
            let merged = merge_batches(self.read_all());
            last_n(merged, self.config.replay_count)
        } else {
            Vec::new()
        };

        self.transition(next);
        Ok(replayed)
    }

    /// Rediscover sessions: open readers for new ones (from the beginning, all
    /// of their content is unseen) and drop the ones that went away.
    /// Returns the number of sessions added.
    ///
    /// A dropped session keeps its cursor, so if it is discovered again it
    /// resumes where it stopped. Sessions of agents whose directory could not
    /// be read this pass are kept as they are. If no discovery has succeeded
    /// before, existing transcripts are history and are opened at their end.
    pub fn rescan(&mut self) -> Result<usize, TailError> {
        let scan = self.discover()?;
        Ok(self.apply_scan(scan))
    }

    fn apply_scan(&mut self, scan: SessionScan) -> usize {
        let current: BTreeMap<String, SessionDescriptor> = scan
            .sessions
            .into_iter()
            .map(|d| (d.session_id.clone(), d))
            .collect();

        let gone: Vec<String> = self
            .readers
            .iter()
            .filter(|(id, reader)| {
                !current.contains_key(*id)
                    && !scan.unreadable_agents.contains(&reader.descriptor().agent_id)
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in gone {
            if let Some(reader) = self.readers.remove(&id) {
                tracing::info!("Session {} no longer discovered, dropping", id);
                self.parked.insert(id, reader.close());
            }
        }

        let start = if self.discovered_once {
            StartAt::Beginning
        } else {
            StartAt::End
        };

        let mut added = 0;
        for (id, descriptor) in current {
            match self.readers.get_mut(&id) {
                Some(reader) => {
                    if reader.descriptor().source_location != descriptor.source_location {
                        tracing::debug!(
                            "Session {} moved to {}",
                            id,
                            descriptor.source_location.display()
                        );
                        reader.relocate(descriptor);
                    }
                }
                None => match self.parked.remove(&id) {
                    Some(cursor) => {
                        tracing::info!("Session {} rediscovered at offset {}", id, cursor.offset);
                        self.readers.insert(id, SessionReader::resume(descriptor, cursor));
                    }
                    None => {
                        if self.open_reader(descriptor, start) {
                            added += 1;
                        }
                    }
                },
            }
        }
        self.discovered_once = true;

        if added > 0 {
            tracing::info!("Discovered {} new session(s)", added);
        }
        added
    }

    pub fn rescan_due(&self) -> bool {
        self.last_scan
            .is_none_or(|at| at.elapsed() >= self.config.rescan_interval)
    }

    /// Read every session once and merge the new records.
    pub fn poll(&mut self) -> Vec<MessageRecord> {
        merge_batches(self.read_all())
    }

    /// Close every reader and finish.
    pub fn shutdown(&mut self) {
        for (_, reader) in std::mem::take(&mut self.readers) {
            reader.close();
        }
        self.parked.clear();
        self.transition(TailState::Done);
    }

    /// Drive the whole state machine, sending events until the run is done or
    /// `cancel` fires. Dropping the receiver also ends the run.
    pub async fn run(mut self, tx: mpsc::Sender<TailEvent>, cancel: CancellationToken) {
        let replaying = self.state == TailState::Replay;

        match self.start() {
            Ok(replayed) => {
                let emitted = replayed.len();
                for record in replayed {
                    if tx.send(TailEvent::Record(record)).await.is_err() {
                        self.shutdown();
                        return;
                    }
                }
                if replaying && tx.send(TailEvent::ReplayComplete { emitted }).await.is_err() {
                    self.shutdown();
                    return;
                }
            }
            Err(e) => {
                tracing::warn!("Initial discovery failed: {}", e);
                if tx.send(TailEvent::Error(e.to_string())).await.is_err() {
                    self.shutdown();
                    return;
                }
            }
        }

        if self.state == TailState::Follow {
            self.follow(&tx, &cancel).await;
        }

        self.shutdown();
    }

    async fn follow(&mut self, tx: &mpsc::Sender<TailEvent>, cancel: &CancellationToken) {
        let started = TailEvent::Started {
            sessions: self.readers.len(),
            agents: self.agent_names(),
        };
        if tx.send(started).await.is_err() {
            return;
        }

        let mut notifier = if self.config.watch_events {
            ChangeNotifier::watching(&self.config.root, self.config.poll_interval)
        } else {
            ChangeNotifier::polling(self.config.poll_interval)
        };

        loop {
            let wake = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                wake = notifier.wait() => wake,
            };
            if let Wake::Changed(paths) = &wake {
                tracing::trace!("Woken by {} changed path(s)", paths.len());
            }

            if self.rescan_due() {
                let event = match self.rescan() {
                    Ok(0) => None,
                    Ok(added) => Some(TailEvent::SessionsAdded(added)),
                    Err(e) => {
                        tracing::warn!("Session discovery failed: {}", e);
                        Some(TailEvent::Error(e.to_string()))
                    }
                };
                if let Some(event) = event
                    && tx.send(event).await.is_err()
                {
                    return;
                }
            }

            for record in self.poll() {
                if tx.send(TailEvent::Record(record)).await.is_err() {
                    return;
                }
            }
        }
    }

    fn discover(&mut self) -> Result<SessionScan, TailError> {
        self.last_scan = Some(Instant::now());
        scan_sessions(&self.config.root, &self.config.filter)
    }

    fn open_reader(&mut self, descriptor: SessionDescriptor, start: StartAt) -> bool {
        let id = descriptor.session_id.clone();
        match SessionReader::open(descriptor, start) {
            Ok(reader) => {
                self.readers.insert(id, reader);
                true
            }
            Err(e) => {
                tracing::debug!("Could not open session {}: {}", id, e);
                false
            }
        }
    }

    /// One batch per session, in session id order.
    fn read_all(&mut self) -> Vec<Vec<MessageRecord>> {
        self.readers
            .values_mut()
            .filter_map(|reader| match reader.read_new() {
                Ok(records) => Some(records),
                Err(e) => {
                    tracing::warn!("{}", e);
                    None
                }
            })
            .collect()
    }

    fn agent_names(&self) -> Vec<String> {
        if !self.config.filter.agents.is_empty() {
            return self.config.filter.agents.clone();
        }
        list_agents(&self.config.root).unwrap_or_default()
    }

    fn transition(&mut self, next: TailState) {
        if self.state != next {
            tracing::debug!("Tailer {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}
