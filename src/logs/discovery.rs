//! Session discovery over the OpenClaw state directory.
//!
//! ```text
//! ~/.openclaw/agents/
//! ├── main/
//! │   └── sessions/
//! │       ├── <sessionId>.jsonl
//! │       └── <sessionId>.deleted.<stamp>.jsonl
//! └── penny/
//!     └── sessions/
//!         └── ...
//! ```

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::error::TailError;
use super::parser::extract_session_id;
use super::types::SessionDescriptor;

const DELETED_MARKER: &str = ".deleted.";

/// Which sessions to enumerate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryFilter {
    /// Agent ids to include; empty means every agent.
    pub agents: Vec<String>,
    pub include_deleted: bool,
}

impl DiscoveryFilter {
    fn accepts_agent(&self, agent_id: &str) -> bool {
        self.agents.is_empty() || self.agents.iter().any(|a| a == agent_id)
    }
}

fn default_state_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".openclaw").join("agents"))
}

/// Resolve the agents root: `$OPENCLAW_STATE_DIR`, then the configured path,
/// then `~/.openclaw/agents`.
pub fn state_dir(configured: Option<&Path>) -> Result<PathBuf, TailError> {
    if let Ok(dir) = std::env::var("OPENCLAW_STATE_DIR")
        && !dir.is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    if let Some(dir) = configured {
        return Ok(dir.to_path_buf());
    }
    default_state_dir().ok_or_else(|| TailError::Config("Could not find home directory".into()))
}

pub fn sessions_dir(root: &Path, agent_id: &str) -> PathBuf {
    root.join(agent_id).join("sessions")
}

/// Agent ids that have a `sessions/` directory, sorted.
pub fn list_agents(root: &Path) -> Result<Vec<String>, TailError> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(TailError::DiscoveryFailure {
                path: root.to_path_buf(),
                source,
            });
        }
    };

    let mut agents: Vec<String> = entries
        .flatten()
        .filter(|entry| entry.path().join("sessions").is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(String::from))
        .collect();

    agents.sort();
    Ok(agents)
}

/// Result of one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionScan {
    pub sessions: Vec<SessionDescriptor>,
    /// Agents whose `sessions/` directory could not be read this pass. Their
    /// sessions are absent from `sessions` without having gone away.
    pub unreadable_agents: Vec<String>,
}

/// Enumerate session transcripts under `root`, unique by session id and
/// sorted by it.
///
/// A session that has both a live and a `.deleted.` transcript is reported
/// once, as the live one.
pub fn list_sessions(
    root: &Path,
    filter: &DiscoveryFilter,
) -> Result<Vec<SessionDescriptor>, TailError> {
    scan_sessions(root, filter).map(|scan| scan.sessions)
}

/// Like [`list_sessions`], also reporting the agents that were skipped
/// because their sessions directory was unreadable.
pub fn scan_sessions(root: &Path, filter: &DiscoveryFilter) -> Result<SessionScan, TailError> {
    let mut by_id: BTreeMap<String, SessionDescriptor> = BTreeMap::new();
    let mut unreadable_agents = Vec::new();

    for agent_id in list_agents(root)? {
        if !filter.accepts_agent(&agent_id) {
            continue;
        }

        let dir = sessions_dir(root, &agent_id);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Skipping unreadable sessions dir {}: {}", dir.display(), e);
                unreadable_agents.push(agent_id);
                continue;
            }
        };

        let mut files: Vec<(String, PathBuf)> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                name.ends_with(".jsonl").then(|| (name, entry.path()))
            })
            .collect();
        files.sort();

        for (name, path) in files {
            let deleted = name.contains(DELETED_MARKER);
            if deleted && !filter.include_deleted {
                continue;
            }

            let session_id = extract_session_id(&name).to_string();
            if session_id.is_empty() {
                continue;
            }

            let descriptor = SessionDescriptor {
                session_id: session_id.clone(),
                agent_id: agent_id.clone(),
                deleted,
                source_location: path,
            };

            match by_id.get(&session_id) {
                Some(existing) if existing.deleted && !deleted => {
                    by_id.insert(session_id, descriptor);
                }
                Some(_) => {}
                None => {
                    by_id.insert(session_id, descriptor);
                }
            }
        }
    }

    Ok(SessionScan {
        sessions: by_id.into_values().collect(),
        unreadable_agents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, agent: &str, file: &str) {
        let dir = sessions_dir(root, agent);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), "").unwrap();
    }

    fn ids(sessions: &[SessionDescriptor]) -> Vec<&str> {
        sessions.iter().map(|s| s.session_id.as_str()).collect()
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("nope");
        assert!(list_agents(&root).unwrap().is_empty());
        assert!(list_sessions(&root, &DiscoveryFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn lists_agents_with_sessions_dir_only() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "penny", "b.jsonl");
        touch(dir.path(), "main", "a.jsonl");
        fs::create_dir_all(dir.path().join("empty-agent")).unwrap();
        fs::write(dir.path().join("stray.txt"), "").unwrap();

        assert_eq!(list_agents(dir.path()).unwrap(), vec!["main", "penny"]);
    }

    #[test]
    fn ignores_non_jsonl_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "main", "a.jsonl");
        touch(dir.path(), "main", "sessions.json");
        touch(dir.path(), "main", "a.jsonl.lock");

        let sessions = list_sessions(dir.path(), &DiscoveryFilter::default()).unwrap();
        assert_eq!(ids(&sessions), vec!["a"]);
    }

    #[test]
    fn excludes_deleted_unless_requested() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "main", "live.jsonl");
        touch(dir.path(), "main", "gone.deleted.2026-01-01T00-00-00.jsonl");

        let filter = DiscoveryFilter::default();
        let sessions = list_sessions(dir.path(), &filter).unwrap();
        assert_eq!(ids(&sessions), vec!["live"]);
        assert!(sessions.iter().all(|s| !s.deleted));

        let filter = DiscoveryFilter {
            include_deleted: true,
            ..Default::default()
        };
        let sessions = list_sessions(dir.path(), &filter).unwrap();
        assert_eq!(ids(&sessions), vec!["gone", "live"]);
        assert!(sessions[0].deleted);
    }

    #[test]
    fn live_transcript_wins_over_deleted_copy() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "main", "dup.deleted.1.jsonl");
        touch(dir.path(), "main", "dup.jsonl");

        let filter = DiscoveryFilter {
            include_deleted: true,
            ..Default::default()
        };
        let sessions = list_sessions(dir.path(), &filter).unwrap();
        assert_eq!(sessions.len(), 1);
        assert!(!sessions[0].deleted);
        assert!(sessions[0].source_location.ends_with("dup.jsonl"));
    }

    #[test]
    fn agent_filter_restricts_sessions() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "main", "a.jsonl");
        touch(dir.path(), "penny", "b.jsonl");

        let filter = DiscoveryFilter {
            agents: vec!["main".to_string()],
            include_deleted: false,
        };
        let sessions = list_sessions(dir.path(), &filter).unwrap();
        assert_eq!(ids(&sessions), vec!["a"]);
        assert_eq!(sessions[0].agent_id, "main");
    }

    #[test]
    fn repeated_discovery_is_stable() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "main", "z.jsonl");
        touch(dir.path(), "penny", "m.jsonl");
        touch(dir.path(), "main", "a.jsonl");

        let filter = DiscoveryFilter::default();
        let first = list_sessions(dir.path(), &filter).unwrap();
        let second = list_sessions(dir.path(), &filter).unwrap();
        assert_eq!(first, second);
        assert_eq!(ids(&first), vec!["a", "m", "z"]);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_sessions_dir_is_reported_not_fatal() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        touch(dir.path(), "main", "a.jsonl");
        touch(dir.path(), "penny", "b.jsonl");
        let locked = sessions_dir(dir.path(), "penny");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits do not bind when running as root
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let scan = scan_sessions(dir.path(), &DiscoveryFilter::default()).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(ids(&scan.sessions), vec!["a"]);
        assert_eq!(scan.unreadable_agents, vec!["penny"]);
    }

    #[test]
    fn unreadable_root_is_discovery_failure() {
        let dir = TempDir::new().unwrap();
        let file_root = dir.path().join("not-a-dir");
        fs::write(&file_root, "").unwrap();

        let err = list_sessions(&file_root, &DiscoveryFilter::default()).unwrap_err();
        assert!(matches!(err, TailError::DiscoveryFailure { .. }));
    }
}
