use anyhow::Result;
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebouncedEventKind, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::mpsc as tokio_mpsc;
use tokio::time::{Interval, MissedTickBehavior};

pub enum WatcherEvent {
    FileModified(PathBuf),
    Error(String),
}

/// Debounced recursive watch over the agents root.
pub struct LogWatcher {
    _watcher: notify_debouncer_mini::Debouncer<RecommendedWatcher>,
    event_rx: tokio_mpsc::UnboundedReceiver<WatcherEvent>,
}

impl LogWatcher {
    pub fn new(path: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let (event_tx, event_rx) = tokio_mpsc::unbounded_channel();

        let mut debouncer = new_debouncer(Duration::from_millis(100), tx)?;

        debouncer.watcher().watch(path, RecursiveMode::Recursive)?;

        // Spawn a thread to convert sync events to async
        std::thread::spawn(move || {
            while let Ok(events) = rx.recv() {
                match events {
                    Ok(events) => {
                        for event in events {
                            if event.kind == DebouncedEventKind::Any
                                && event_tx.send(WatcherEvent::FileModified(event.path)).is_err()
                            {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        if event_tx.send(WatcherEvent::Error(e.to_string())).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok(Self {
            _watcher: debouncer,
            event_rx,
        })
    }

    pub async fn next_event(&mut self) -> Option<WatcherEvent> {
        self.event_rx.recv().await
    }
}

/// Why the scheduler was woken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wake {
    /// A filesystem event arrived; paths are whatever the OS reported.
    Changed(Vec<PathBuf>),
    /// Poll interval elapsed.
    Tick,
}

/// Wake-up source for the follow loop.
///
/// The poll interval is always armed since filesystem events can be dropped
/// or never delivered (network mounts, missing root at start-up).
pub struct ChangeNotifier {
    interval: Interval,
    watcher: Option<LogWatcher>,
}

impl ChangeNotifier {
    /// Poll-only notifier.
    pub fn polling(poll_interval: Duration) -> Self {
        let mut interval = tokio::time::interval(poll_interval);
        // Don't let missed ticks accumulate
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            interval,
            watcher: None,
        }
    }

    /// Poll plus filesystem events under `root`. Falls back to polling alone if
    /// the watch cannot be established.
    pub fn watching(root: &Path, poll_interval: Duration) -> Self {
        let mut notifier = Self::polling(poll_interval);
        match LogWatcher::new(root) {
            Ok(watcher) => notifier.watcher = Some(watcher),
            Err(e) => tracing::warn!(
                "File watching unavailable for {}, polling only: {}",
                root.display(),
                e
            ),
        }
        notifier
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    pub async fn wait(&mut self) -> Wake {
        let Some(watcher) = self.watcher.as_mut() else {
            self.interval.tick().await;
            return Wake::Tick;
        };

        tokio::select! {
            _ = self.interval.tick() => Wake::Tick,
            event = watcher.next_event() => match event {
                Some(WatcherEvent::FileModified(path)) => {
                    let mut paths = vec![path];
                    // Drain whatever else is queued so one wake covers a burst
                    while let Ok(WatcherEvent::FileModified(path)) = watcher.event_rx.try_recv() {
                        paths.push(path);
                    }
                    Wake::Changed(paths)
                }
                Some(WatcherEvent::Error(e)) => {
                    tracing::warn!("File watcher error: {}", e);
                    Wake::Tick
                }
                None => {
                    tracing::warn!("File watcher stopped, polling only");
                    self.watcher = None;
                    Wake::Tick
                }
            },
        }
    }
}
