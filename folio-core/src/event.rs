//! Event bus connecting the session, the preview server and the watcher

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ErrorSeverity, FolioError, Result};

/// Anything that can travel over the event bus
pub trait Event: Send + Sync + Clone + std::fmt::Debug + 'static {
    /// Stable snake_case identifier, e.g. `document_loaded`
    fn event_type(&self) -> &str;

    fn timestamp(&self) -> SystemTime;

    /// Get event metadata
    fn metadata(&self) -> HashMap<String, String> {
        HashMap::new()
    }
}

/// Event bus for publishing and subscribing to system events
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Deliver `event` to every matching subscriber
    async fn publish_system_event(&self, event: SystemEvent) -> Result<()>;

    /// Subscribe to every system event
    async fn subscribe_system_events(
        &self,
        handler: Arc<dyn SystemEventHandler>,
    ) -> Result<SubscriptionId>;

    /// Subscribe to the system events accepted by `filter`
    async fn subscribe_filtered(
        &self,
        handler: Arc<dyn SystemEventHandler>,
        filter: Box<dyn EventFilter>,
    ) -> Result<SubscriptionId>;

    /// Drop a subscription; unknown ids are an error
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;

    async fn subscription_count(&self) -> usize;
}

/// Handler for system events
#[async_trait]
pub trait SystemEventHandler: Send + Sync {
    /// Handle a system event
    async fn handle_system_event(&self, event: &SystemEvent) -> Result<()>;

    /// Name shown when the handler fails
    fn handler_name(&self) -> &str {
        "anonymous"
    }
}

/// Filter deciding whether an event reaches a handler
pub trait EventFilter: Send + Sync {
    fn should_handle(&self, event: &SystemEvent) -> bool;
}

impl<F> EventFilter for F
where
    F: Fn(&SystemEvent) -> bool + Send + Sync,
{
    fn should_handle(&self, event: &SystemEvent) -> bool {
        self(event)
    }
}

/// Handle returned by a subscription, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Kind of change seen in the working copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Created,
    Modified,
    Deleted,
}

/// Everything the session and its plugins announce
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SystemEvent {
    /// A document was fetched from the store into the session
    DocumentLoaded {
        filename: String,
        bytes: usize,
        timestamp: SystemTime,
    },
    /// A blank document was created in the session
    DocumentCreated {
        filename: String,
        timestamp: SystemTime,
    },
    /// The session went from clean to dirty
    DocumentModified {
        filename: String,
        timestamp: SystemTime,
    },
    /// A document was written to the store
    DocumentPublished {
        filename: String,
        comment: String,
        bytes: usize,
        timestamp: SystemTime,
    },
    /// The publish target of the session changed
    DocumentRenamed {
        from: String,
        to: String,
        timestamp: SystemTime,
    },
    /// The store listing was fetched
    ListingRefreshed {
        entries: usize,
        timestamp: SystemTime,
    },
    /// File system change detected in the working directory
    FileChanged {
        path: PathBuf,
        change_type: ChangeType,
        timestamp: SystemTime,
    },
    /// A browser attached to the preview socket
    PreviewClientConnected {
        client_id: Uuid,
        timestamp: SystemTime,
    },
    /// A browser left the preview socket
    PreviewClientDisconnected {
        client_id: Uuid,
        timestamp: SystemTime,
    },
    /// The preview server is accepting connections
    ServerStarted {
        address: String,
        timestamp: SystemTime,
    },
    /// Plugin was loaded
    PluginLoaded {
        plugin_name: String,
        version: String,
        timestamp: SystemTime,
    },
    /// Plugin was unloaded
    PluginUnloaded {
        plugin_name: String,
        timestamp: SystemTime,
    },
    /// Error surfaced to the user
    Error {
        source: String,
        message: String,
        severity: ErrorSeverity,
        timestamp: SystemTime,
    },
}

impl Event for SystemEvent {
    fn event_type(&self) -> &str {
        match self {
            SystemEvent::DocumentLoaded { .. } => "document_loaded",
            SystemEvent::DocumentCreated { .. } => "document_created",
            SystemEvent::DocumentModified { .. } => "document_modified",
            SystemEvent::DocumentPublished { .. } => "document_published",
            SystemEvent::DocumentRenamed { .. } => "document_renamed",
            SystemEvent::ListingRefreshed { .. } => "listing_refreshed",
            SystemEvent::FileChanged { .. } => "file_changed",
            SystemEvent::PreviewClientConnected { .. } => "preview_client_connected",
            SystemEvent::PreviewClientDisconnected { .. } => "preview_client_disconnected",
            SystemEvent::ServerStarted { .. } => "server_started",
            SystemEvent::PluginLoaded { .. } => "plugin_loaded",
            SystemEvent::PluginUnloaded { .. } => "plugin_unloaded",
            SystemEvent::Error { .. } => "error",
        }
    }

    fn timestamp(&self) -> SystemTime {
        match self {
            SystemEvent::DocumentLoaded { timestamp, .. }
            | SystemEvent::DocumentCreated { timestamp, .. }
            | SystemEvent::DocumentModified { timestamp, .. }
            | SystemEvent::DocumentPublished { timestamp, .. }
            | SystemEvent::DocumentRenamed { timestamp, .. }
            | SystemEvent::ListingRefreshed { timestamp, .. }
            | SystemEvent::FileChanged { timestamp, .. }
            | SystemEvent::PreviewClientConnected { timestamp, .. }
            | SystemEvent::PreviewClientDisconnected { timestamp, .. }
            | SystemEvent::ServerStarted { timestamp, .. }
            | SystemEvent::PluginLoaded { timestamp, .. }
            | SystemEvent::PluginUnloaded { timestamp, .. }
            | SystemEvent::Error { timestamp, .. } => *timestamp,
        }
    }

    fn metadata(&self) -> HashMap<String, String> {
        let mut metadata = HashMap::new();

        match self {
            SystemEvent::DocumentLoaded {
                filename, bytes, ..
            } => {
                metadata.insert("filename".to_string(), filename.clone());
                metadata.insert("bytes".to_string(), bytes.to_string());
            }
            SystemEvent::DocumentCreated { filename, .. }
            | SystemEvent::DocumentModified { filename, .. } => {
                metadata.insert("filename".to_string(), filename.clone());
            }
            SystemEvent::DocumentPublished {
                filename,
                comment,
                bytes,
                ..
            } => {
                metadata.insert("filename".to_string(), filename.clone());
                metadata.insert("comment".to_string(), comment.clone());
                metadata.insert("bytes".to_string(), bytes.to_string());
            }
            SystemEvent::DocumentRenamed { from, to, .. } => {
                metadata.insert("from".to_string(), from.clone());
                metadata.insert("to".to_string(), to.clone());
            }
            SystemEvent::ListingRefreshed { entries, .. } => {
                metadata.insert("entries".to_string(), entries.to_string());
            }
            SystemEvent::FileChanged {
                path, change_type, ..
            } => {
                metadata.insert("path".to_string(), path.display().to_string());
                metadata.insert("change_type".to_string(), format!("{:?}", change_type));
            }
            SystemEvent::PreviewClientConnected { client_id, .. }
            | SystemEvent::PreviewClientDisconnected { client_id, .. } => {
                metadata.insert("client_id".to_string(), client_id.to_string());
            }
            SystemEvent::ServerStarted { address, .. } => {
                metadata.insert("address".to_string(), address.clone());
            }
            SystemEvent::PluginLoaded {
                plugin_name,
                version,
                ..
            } => {
                metadata.insert("plugin_name".to_string(), plugin_name.clone());
                metadata.insert("version".to_string(), version.clone());
            }
            SystemEvent::PluginUnloaded { plugin_name, .. } => {
                metadata.insert("plugin_name".to_string(), plugin_name.clone());
            }
            SystemEvent::Error {
                source,
                message,
                severity,
                ..
            } => {
                metadata.insert("source".to_string(), source.clone());
                metadata.insert("message".to_string(), message.clone());
                metadata.insert("severity".to_string(), severity.to_string());
            }
        }

        metadata
    }
}

impl SystemEvent {
    pub fn document_loaded(filename: String, bytes: usize) -> Self {
        Self::DocumentLoaded {
            filename,
            bytes,
            timestamp: SystemTime::now(),
        }
    }

    pub fn document_created(filename: String) -> Self {
        Self::DocumentCreated {
            filename,
            timestamp: SystemTime::now(),
        }
    }

    pub fn document_modified(filename: String) -> Self {
        Self::DocumentModified {
            filename,
            timestamp: SystemTime::now(),
        }
    }

    pub fn document_published(filename: String, comment: String, bytes: usize) -> Self {
        Self::DocumentPublished {
            filename,
            comment,
            bytes,
            timestamp: SystemTime::now(),
        }
    }

    pub fn document_renamed(from: String, to: String) -> Self {
        Self::DocumentRenamed {
            from,
            to,
            timestamp: SystemTime::now(),
        }
    }

    pub fn listing_refreshed(entries: usize) -> Self {
        Self::ListingRefreshed {
            entries,
            timestamp: SystemTime::now(),
        }
    }

    pub fn file_changed(path: PathBuf, change_type: ChangeType) -> Self {
        Self::FileChanged {
            path,
            change_type,
            timestamp: SystemTime::now(),
        }
    }

    pub fn preview_client_connected(client_id: Uuid) -> Self {
        Self::PreviewClientConnected {
            client_id,
            timestamp: SystemTime::now(),
        }
    }

    pub fn preview_client_disconnected(client_id: Uuid) -> Self {
        Self::PreviewClientDisconnected {
            client_id,
            timestamp: SystemTime::now(),
        }
    }

    pub fn server_started(address: String) -> Self {
        Self::ServerStarted {
            address,
            timestamp: SystemTime::now(),
        }
    }

    pub fn plugin_loaded(plugin_name: String, version: String) -> Self {
        Self::PluginLoaded {
            plugin_name,
            version,
            timestamp: SystemTime::now(),
        }
    }

    pub fn plugin_unloaded(plugin_name: String) -> Self {
        Self::PluginUnloaded {
            plugin_name,
            timestamp: SystemTime::now(),
        }
    }

    pub fn error(source: String, message: String, severity: ErrorSeverity) -> Self {
        Self::Error {
            source,
            message,
            severity,
            timestamp: SystemTime::now(),
        }
    }

    /// Build an error event from a surfaced failure
    pub fn from_error(source: &str, error: &FolioError) -> Self {
        Self::error(source.to_string(), error.to_string(), error.severity())
    }

    /// Human-readable summary used in logs and tests
    pub fn description(&self) -> String {
        match self {
            SystemEvent::DocumentLoaded {
                filename, bytes, ..
            } => format!("Loaded {} ({} bytes)", filename, bytes),
            SystemEvent::DocumentCreated { filename, .. } => {
                format!("Created new document {}", filename)
            }
            SystemEvent::DocumentModified { filename, .. } => {
                format!("Page {} is modified", filename)
            }
            SystemEvent::DocumentPublished {
                filename,
                comment,
                bytes,
                ..
            } => {
                if comment.is_empty() {
                    format!("Published {} ({} bytes)", filename, bytes)
                } else {
                    format!("Published {} ({} bytes): {}", filename, bytes, comment)
                }
            }
            SystemEvent::DocumentRenamed { from, to, .. } => {
                format!("Renamed {} to {}", from, to)
            }
            SystemEvent::ListingRefreshed { entries, .. } => {
                format!("Listing refreshed with {} documents", entries)
            }
            SystemEvent::FileChanged {
                path, change_type, ..
            } => format!("File {} was {:?}", path.display(), change_type),
            SystemEvent::PreviewClientConnected { client_id, .. } => {
                format!("Preview client {} connected", client_id)
            }
            SystemEvent::PreviewClientDisconnected { client_id, .. } => {
                format!("Preview client {} disconnected", client_id)
            }
            SystemEvent::ServerStarted { address, .. } => {
                format!("Preview server listening on {}", address)
            }
            SystemEvent::PluginLoaded {
                plugin_name,
                version,
                ..
            } => format!("Plugin {} v{} loaded", plugin_name, version),
            SystemEvent::PluginUnloaded { plugin_name, .. } => {
                format!("Plugin {} unloaded", plugin_name)
            }
            SystemEvent::Error {
                source,
                message,
                severity,
                ..
            } => format!("{} error from {}: {}", severity, source, message),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SystemEvent::Error { .. })
    }

    /// Check if this is a document lifecycle event
    pub fn is_document_event(&self) -> bool {
        matches!(
            self,
            SystemEvent::DocumentLoaded { .. }
                | SystemEvent::DocumentCreated { .. }
                | SystemEvent::DocumentModified { .. }
                | SystemEvent::DocumentPublished { .. }
                | SystemEvent::DocumentRenamed { .. }
        )
    }

    /// Working copy change reported by the watcher
    pub fn is_file_event(&self) -> bool {
        matches!(self, SystemEvent::FileChanged { .. })
    }
}

/// One log line: seconds since the epoch, upper-case type, description
pub fn format_event_for_log(event: &SystemEvent) -> String {
    let timestamp = event
        .timestamp()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    format!(
        "[{}] {}: {}",
        timestamp,
        event.event_type().to_uppercase(),
        event.description()
    )
}

struct Subscription {
    handler: Arc<dyn SystemEventHandler>,
    filter: Option<Box<dyn EventFilter>>,
}

/// In-memory implementation of the event bus
pub struct InMemoryEventBus {
    subscriptions: RwLock<HashMap<SubscriptionId, Arc<Subscription>>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    async fn insert(&self, subscription: Subscription) -> SubscriptionId {
        let id = SubscriptionId::new();
        tracing::debug!(
            "Created subscription {:?} for handler {}",
            id,
            subscription.handler.handler_name()
        );
        self.subscriptions
            .write()
            .await
            .insert(id, Arc::new(subscription));
        id
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish_system_event(&self, event: SystemEvent) -> Result<()> {
        // Snapshot so handlers may subscribe or unsubscribe while handling
        let subscriptions: Vec<Arc<Subscription>> =
            self.subscriptions.read().await.values().cloned().collect();

        if subscriptions.is_empty() {
            tracing::trace!("No subscribers for event type: {}", event.event_type());
            return Ok(());
        }

        let mut handlers_called = 0;
        for subscription in subscriptions {
            if let Some(filter) = &subscription.filter {
                if !filter.should_handle(&event) {
                    continue;
                }
            }

            if let Err(e) = subscription.handler.handle_system_event(&event).await {
                tracing::error!(
                    "Handler {} failed on {}: {}",
                    subscription.handler.handler_name(),
                    event.event_type(),
                    e
                );
            } else {
                handlers_called += 1;
            }
        }

        tracing::debug!(
            "Event {} reached {} handlers",
            event.event_type(),
            handlers_called
        );

        Ok(())
    }

    async fn subscribe_system_events(
        &self,
        handler: Arc<dyn SystemEventHandler>,
    ) -> Result<SubscriptionId> {
        Ok(self
            .insert(Subscription {
                handler,
                filter: None,
            })
            .await)
    }

    async fn subscribe_filtered(
        &self,
        handler: Arc<dyn SystemEventHandler>,
        filter: Box<dyn EventFilter>,
    ) -> Result<SubscriptionId> {
        Ok(self
            .insert(Subscription {
                handler,
                filter: Some(filter),
            })
            .await)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        if self.subscriptions.write().await.remove(&id).is_some() {
            tracing::debug!("Removed subscription: {:?}", id);
            Ok(())
        } else {
            Err(FolioError::event_bus(format!(
                "Unknown subscription: {:?}",
                id
            )))
        }
    }

    async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}
