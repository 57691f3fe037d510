use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TailError {
    /// One log line could not be turned into a record. Never fatal to the stream.
    #[error("malformed record: {reason}")]
    MalformedRecord { reason: String },

    #[error("session source unavailable: {}: {source}", .path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("session discovery failed: {}: {source}", .path.display())]
    DiscoveryFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TailError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        TailError::MalformedRecord {
            reason: reason.into(),
        }
    }
}
