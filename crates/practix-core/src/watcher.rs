//! File watcher for the corpus directory
//!
//! Uses notify with adaptive debouncing; a burst of writes (an import in
//! progress) collapses into a single reload once it settles.

use crate::event::DataEvent;
use crate::query::QueryService;
use crate::store::corpus::CATEGORIES_FILE;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Configuration for the file watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Base debounce delay
    pub debounce_delay: Duration,

    /// Maximum debounce delay during burst
    pub max_debounce_delay: Duration,

    /// Burst detection threshold (events per second)
    pub burst_threshold: u32,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_delay: Duration::from_millis(500),
            max_debounce_delay: Duration::from_secs(3),
            burst_threshold: 10,
        }
    }
}

/// Watches a corpus directory and reloads the catalog on change
pub struct FileWatcher {
    /// Notify watcher instance
    _watcher: RecommendedWatcher,

    /// Shutdown signal
    shutdown_tx: mpsc::Sender<()>,
}

impl FileWatcher {
    /// Start watching `corpus_dir`
    pub async fn start(
        corpus_dir: PathBuf,
        service: Arc<QueryService>,
        config: WatcherConfig,
    ) -> Result<Self, notify::Error> {
        let (event_tx, mut event_rx) = mpsc::channel::<notify::Result<Event>>(100);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.blocking_send(res);
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&corpus_dir, RecursiveMode::Recursive)?;

        info!(corpus = %corpus_dir.display(), "File watcher started");

        tokio::spawn(async move {
            let mut debounce = DebounceState::new(config);

            loop {
                // A pending reload fires once the quiet period has passed
                let wait = debounce.time_until_due().unwrap_or(Duration::from_secs(3600));

                tokio::select! {
                    Some(result) = event_rx.recv() => {
                        match result {
                            Ok(event) => {
                                if let Some(path) = Self::relevant_path(&event, &corpus_dir) {
                                    trace!(path = %path.display(), "Corpus file changed");
                                    debounce.record(Instant::now());
                                }
                            }
                            Err(e) => {
                                error!(error = %e, "File watcher error");
                                service.events().publish(DataEvent::WatcherError(e.to_string()));
                            }
                        }
                    }
                    _ = tokio::time::sleep(wait), if debounce.is_pending() => {
                        debounce.clear();
                        Self::reload(&service).await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("File watcher shutting down");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            shutdown_tx,
        })
    }

    /// Corpus file touched by a create/modify/remove event, if any
    fn relevant_path(event: &Event, corpus_dir: &Path) -> Option<PathBuf> {
        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
            _ => return None,
        }

        let path = event.paths.first()?;
        if !path.starts_with(corpus_dir) {
            return None;
        }

        let is_categories = path
            .file_name()
            .map(|n| n == CATEGORIES_FILE)
            .unwrap_or(false);
        let is_items = path.extension().map(|e| e == "jsonl").unwrap_or(false);

        (is_categories || is_items).then(|| path.clone())
    }

    async fn reload(service: &QueryService) {
        match service.reload_corpus().await {
            Ok(report) if report.has_fatal_errors() => {
                warn!(errors = report.errors.len(), "Corpus reload failed, keeping previous data");
            }
            Ok(report) => {
                debug!(
                    items = report.items_loaded,
                    skipped = report.items_skipped,
                    "Corpus reloaded after file change"
                );
            }
            Err(e) => error!(error = %e, "Corpus reload unavailable"),
        }
    }

    /// Stop the watcher
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Trailing-edge debounce with burst-adaptive delay
struct DebounceState {
    config: WatcherConfig,
    last_event: Option<Instant>,
    event_count_window: VecDeque<Instant>,
}

impl DebounceState {
    fn new(config: WatcherConfig) -> Self {
        Self {
            config,
            last_event: None,
            event_count_window: VecDeque::new(),
        }
    }

    fn record(&mut self, now: Instant) {
        self.event_count_window.push_back(now);
        while self
            .event_count_window
            .front()
            .map(|t| now.duration_since(*t) > Duration::from_secs(1))
            .unwrap_or(false)
        {
            self.event_count_window.pop_front();
        }
        self.last_event = Some(now);
    }

    fn is_pending(&self) -> bool {
        self.last_event.is_some()
    }

    fn delay(&self) -> Duration {
        if self.event_count_window.len() as u32 > self.config.burst_threshold {
            self.config.max_debounce_delay
        } else {
            self.config.debounce_delay
        }
    }

    /// Time left before a pending reload is due
    fn time_until_due(&self) -> Option<Duration> {
        let last = self.last_event?;
        Some(self.delay().saturating_sub(last.elapsed()))
    }

    fn clear(&mut self) {
        self.last_event = None;
        self.event_count_window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WatcherConfig {
        WatcherConfig {
            debounce_delay: Duration::from_millis(100),
            max_debounce_delay: Duration::from_millis(500),
            burst_threshold: 5,
        }
    }

    fn modify(path: &str) -> Event {
        Event {
            kind: EventKind::Modify(notify::event::ModifyKind::Data(
                notify::event::DataChange::Content,
            )),
            paths: vec![PathBuf::from(path)],
            ..Default::default()
        }
    }

    #[test]
    fn test_debounce_extends_during_bursts() {
        let mut state = DebounceState::new(config());
        assert!(!state.is_pending());

        let now = Instant::now();
        state.record(now);
        assert!(state.is_pending());
        assert_eq!(state.delay(), Duration::from_millis(100));

        for _ in 0..10 {
            state.record(now);
        }
        assert_eq!(state.delay(), Duration::from_millis(500));

        state.clear();
        assert!(state.time_until_due().is_none());
    }

    #[test]
    fn test_relevant_paths() {
        let dir = PathBuf::from("/data/corpus");

        let result = FileWatcher::relevant_path(&modify("/data/corpus/categories.json"), &dir);
        assert!(result.is_some());

        let result = FileWatcher::relevant_path(&modify("/data/corpus/items/part-1.jsonl"), &dir);
        assert!(result.is_some());

        assert!(FileWatcher::relevant_path(&modify("/data/corpus/notes.txt"), &dir).is_none());
        assert!(FileWatcher::relevant_path(&modify("/elsewhere/items.jsonl"), &dir).is_none());
    }
}
