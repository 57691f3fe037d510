pub mod discovery;
pub mod error;
pub mod merge;
pub mod parser;
pub mod reader;
pub mod scheduler;
pub mod types;
pub mod watcher;

pub use discovery::{DiscoveryFilter, SessionScan, list_agents, list_sessions, scan_sessions, state_dir};
pub use error::TailError;
pub use parser::parse_line;
pub use reader::{SessionReader, StartAt};
pub use scheduler::{TailConfig, TailEvent, TailState, Tailer};
pub use types::{MessageRecord, ReadCursor, Role, SessionDescriptor};
pub use watcher::{ChangeNotifier, Wake};
