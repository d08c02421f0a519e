//! Editable surface for Folio: working copy files and the watcher that
//! turns saves from any text editor into `FileChanged` events.

pub mod filter;
pub mod working_copy;

pub use filter::{DefaultFileFilter, FileFilter};
pub use working_copy::WorkingCopy;

use async_trait::async_trait;
use folio_core::{
    ChangeType, EventBus, FolioError, Plugin, PluginContext, PluginStatus, Result, SystemEvent,
};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type Change = (PathBuf, ChangeType);

fn change_type(kind: &EventKind) -> Option<ChangeType> {
    match kind {
        EventKind::Create(_) => Some(ChangeType::Created),
        EventKind::Modify(_) => Some(ChangeType::Modified),
        EventKind::Remove(_) => Some(ChangeType::Deleted),
        _ => None,
    }
}

/// Fold a change into the pending batch, one entry per path
fn merge_change(pending: &mut Vec<Change>, (path, kind): Change) {
    match pending.iter_mut().find(|(existing, _)| *existing == path) {
        Some((_, current)) => {
            // A file created and then written within one batch is still new
            if !(*current == ChangeType::Created && kind == ChangeType::Modified) {
                *current = kind;
            }
        }
        None => pending.push((path, kind)),
    }
}

async fn debounce_changes(
    mut changes: mpsc::UnboundedReceiver<Change>,
    event_bus: Arc<dyn EventBus>,
    window: Duration,
) {
    while let Some(first) = changes.recv().await {
        let mut pending = vec![first];
        let deadline = tokio::time::sleep(window);
        tokio::pin!(deadline);

        let mut closed = false;
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                next = changes.recv() => match next {
                    Some(change) => merge_change(&mut pending, change),
                    None => {
                        closed = true;
                        break;
                    }
                },
            }
        }

        for (path, kind) in pending {
            debug!("Working copy change: {} ({:?})", path.display(), kind);
            if let Err(e) = event_bus
                .publish_system_event(SystemEvent::file_changed(path, kind))
                .await
            {
                warn!("Failed to publish file change: {}", e);
            }
        }

        if closed {
            break;
        }
    }
}

/// Watches the working directory and publishes debounced file changes
pub struct FileWatcherPlugin {
    name: String,
    version: String,
    status: PluginStatus,
    root: Option<PathBuf>,
    watched: Option<PathBuf>,
    watcher: Option<RecommendedWatcher>,
    task: Option<JoinHandle<()>>,
}

impl FileWatcherPlugin {
    /// Create a watcher for the configured working directory
    pub fn new() -> Self {
        Self {
            name: "file-watcher".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: PluginStatus::Loading,
            root: None,
            watched: None,
            watcher: None,
            task: None,
        }
    }

    /// Watch `root` instead of the configured working directory
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::new()
        }
    }

    /// Resolved directory being watched, once initialized
    pub fn watched_path(&self) -> Option<&PathBuf> {
        self.watched.as_ref()
    }
}

impl Default for FileWatcherPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for FileWatcherPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    async fn initialize(&mut self, context: &PluginContext) -> Result<()> {
        let editor = &context.config.editor;
        let root = self
            .root
            .clone()
            .unwrap_or_else(|| editor.working_dir.clone());
        let working_copy = WorkingCopy::open(&root).await?;
        let root = working_copy.root().to_path_buf();

        let filter: Arc<dyn FileFilter> = Arc::new(DefaultFileFilter::from_config(&root, editor));
        let window = filter.debounce_duration();
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    let Some(kind) = change_type(&event.kind) else {
                        return;
                    };
                    for path in event.paths {
                        if filter.should_watch(&path) {
                            let _ = sender.send((path, kind.clone()));
                        }
                    }
                }
                Err(e) => warn!("File watcher error: {}", e),
            },
            notify::Config::default(),
        )
        .map_err(|e| FolioError::file_system(format!("Failed to create watcher: {}", e)))?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| {
                FolioError::file_system(format!("Failed to watch {}: {}", root.display(), e))
            })?;

        let event_bus = context.event_bus.clone();
        self.task = Some(tokio::spawn(debounce_changes(receiver, event_bus, window)));
        self.watcher = Some(watcher);
        self.watched = Some(root.clone());
        self.status = PluginStatus::Active;

        info!("Watching working copy at {}", root.display());
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        // Dropping the watcher closes the channel and lets the task drain
        self.watcher = None;
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(Duration::from_secs(1), &mut task)
                .await
                .is_err()
            {
                debug!("File change task did not drain in time");
                task.abort();
            }
        }
        self.status = PluginStatus::Stopped;
        Ok(())
    }

    fn status(&self) -> PluginStatus {
        self.status.clone()
    }

    fn provided_services(&self) -> Vec<&str> {
        vec!["file_watching"]
    }
}
