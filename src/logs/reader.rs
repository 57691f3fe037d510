use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use super::error::TailError;
use super::parser::parse_line;
use super::types::{MessageRecord, ReadCursor, SessionDescriptor};

/// Where a freshly opened reader starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartAt {
    /// Read everything already in the file.
    Beginning,
    /// Skip existing content; only later appends are returned.
    End,
}

/// Incremental reader over one session transcript.
///
/// The file is opened per `read_new` call and closed before it returns, so a
/// reader never pins a rotated or deleted file.
#[derive(Debug)]
pub struct SessionReader {
    descriptor: SessionDescriptor,
    cursor: ReadCursor,
    skipped: u64,
}

impl SessionReader {
    pub fn open(descriptor: SessionDescriptor, start: StartAt) -> Result<Self, TailError> {
        let offset = match start {
            StartAt::Beginning => 0,
            StartAt::End => std::fs::metadata(&descriptor.source_location)
                .map_err(|source| TailError::SourceUnavailable {
                    path: descriptor.source_location.clone(),
                    source,
                })?
                .len(),
        };

        let cursor = ReadCursor {
            session_id: descriptor.session_id.clone(),
            offset,
        };

        Ok(Self {
            descriptor,
            cursor,
            skipped: 0,
        })
    }

    /// Continue a session from a cursor handed back by an earlier [`close`].
    ///
    /// [`close`]: SessionReader::close
    pub fn resume(descriptor: SessionDescriptor, cursor: ReadCursor) -> Self {
        Self {
            descriptor,
            cursor,
            skipped: 0,
        }
    }

    /// Return every complete record appended since the previous call.
    ///
    /// A trailing line without its newline is left for the next call. If the
    /// file shrank below the cursor it was truncated or replaced, and reading
    /// restarts from the top.
    pub fn read_new(&mut self) -> Result<Vec<MessageRecord>, TailError> {
        let path = &self.descriptor.source_location;
        let unavailable = |source| TailError::SourceUnavailable {
            path: path.clone(),
            source,
        };

        let mut file = File::open(path).map_err(unavailable)?;
        let len = file.metadata().map_err(unavailable)?.len();

        let mut position = self.cursor.offset;
        if len < position {
            tracing::debug!(
                "{} shrank from {} to {} bytes, rereading from start",
                path.display(),
                position,
                len
            );
            position = 0;
        }
        if len == position {
            self.cursor.offset = position;
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(position)).map_err(unavailable)?;
        let mut buf = Vec::with_capacity((len - position) as usize);
        file.read_to_end(&mut buf).map_err(unavailable)?;

        let Some(last_newline) = buf.iter().rposition(|&b| b == b'\n') else {
            self.cursor.offset = position;
            return Ok(Vec::new());
        };
        let complete = &buf[..=last_newline];

        let mut records = Vec::new();
        for raw in complete.split(|&b| b == b'\n') {
            let line = String::from_utf8_lossy(raw);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match parse_line(line, &self.descriptor.agent_id, &self.descriptor.session_id) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => {
                    // Skip malformed lines - error recovery
                    self.skipped += 1;
                    tracing::debug!("{}: skipping line: {}", path.display(), e);
                }
            }
        }

        self.cursor.offset = position + complete.len() as u64;
        Ok(records)
    }

    /// Point the reader at the session's new location (e.g. after the
    /// transcript was renamed to `.deleted.`), keeping the cursor.
    pub fn relocate(&mut self, descriptor: SessionDescriptor) {
        self.descriptor = descriptor;
    }

    pub fn descriptor(&self) -> &SessionDescriptor {
        &self.descriptor
    }

    pub fn cursor(&self) -> &ReadCursor {
        &self.cursor
    }

    /// Number of malformed lines skipped so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Release the reader, handing back its cursor.
    pub fn close(self) -> ReadCursor {
        tracing::debug!(
            "closing reader for session {} at offset {}",
            self.cursor.session_id,
            self.cursor.offset
        );
        self.cursor
    }
}
