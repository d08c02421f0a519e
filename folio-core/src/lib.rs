//! Folio Core - shared foundation of the Folio page editor
//!
//! This crate provides the document model, the store and surface interfaces,
//! configuration, the event bus and the plugin lifecycle used by every other
//! Folio crate.

pub mod config;
pub mod document;
pub mod error;
pub mod event;
pub mod plugin;
pub mod store;
pub mod surface;

#[cfg(test)]
mod event_test;


pub use config::{
    Config, ConfigLoadContext, ConfigMetadata, EditorConfig, PreviewConfig, StoreConfig,
    ValidationIssue, ValidationResult, ValidationStatus,
};
pub use document::{
    normalize_filename, Document, DocumentVersion, FetchedDocument, ListingEntry, Submission,
    BLANK_DOCUMENT,
};
pub use error::{ErrorSeverity, FolioError, Result};
pub use event::{
    ChangeType, Event, EventBus, EventFilter, InMemoryEventBus, SubscriptionId, SystemEvent,
    SystemEventHandler,
};
pub use plugin::{Plugin, PluginContext, PluginInfo, PluginRegistry, PluginStatus};
pub use store::DocumentStore;
pub use surface::{PageSurface, RenderOutcome, SessionPhase, SessionView};

use std::sync::Arc;
use std::time::Duration;

/// Core engine owning the event bus, configuration and loaded plugins
pub struct CoreEngine {
    event_bus: Arc<dyn EventBus>,
    plugin_registry: PluginRegistry,
    config: Arc<Config>,
}

impl CoreEngine {
    pub fn new(config: Config) -> Self {
        Self {
            event_bus: Arc::new(InMemoryEventBus::new()),
            plugin_registry: PluginRegistry::new(),
            config: Arc::new(config),
        }
    }

    /// Get the plugin context handed to plugins on registration
    pub fn create_plugin_context(&self) -> PluginContext {
        PluginContext::new(self.event_bus.clone(), self.config.clone())
    }

    /// Register and initialize a plugin
    pub async fn register_plugin(&mut self, plugin: Box<dyn Plugin>) -> Result<()> {
        let context = self.create_plugin_context();
        self.plugin_registry.register_plugin(plugin, &context).await
    }

    /// Stop all plugins and announce each one as unloaded
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down Folio core engine");

        let shutdown_timeout = Duration::from_secs(10);
        let stopped =
            match tokio::time::timeout(shutdown_timeout, self.plugin_registry.shutdown()).await {
                Ok(stopped) => stopped,
                Err(_) => {
                    tracing::error!(
                        "Plugins did not stop within {:?}",
                        shutdown_timeout
                    );
                    Vec::new()
                }
            };

        for name in stopped {
            self.event_bus
                .publish_system_event(SystemEvent::plugin_unloaded(name))
                .await?;
        }

        tracing::info!("Core engine shutdown complete");
        Ok(())
    }

    pub fn event_bus(&self) -> Arc<dyn EventBus> {
        self.event_bus.clone()
    }

    pub fn config(&self) -> Arc<Config> {
        self.config.clone()
    }

    pub fn plugin_registry(&self) -> &PluginRegistry {
        &self.plugin_registry
    }
}
