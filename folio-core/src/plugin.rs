//! Plugin lifecycle: the preview server and the working copy watcher are
//! plugins started and stopped by the core engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

use crate::config::Config;
use crate::error::{FolioError, Result};
use crate::event::{EventBus, SystemEvent};

/// A long-running component owned by the engine
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Names of plugins that must be registered first
    fn dependencies(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Start the plugin. Background tasks are spawned here.
    async fn initialize(&mut self, context: &PluginContext) -> Result<()>;

    /// Stop every task started by `initialize`
    async fn shutdown(&mut self) -> Result<()>;

    fn status(&self) -> PluginStatus {
        PluginStatus::Active
    }

    /// Service labels shown in plugin listings
    fn provided_services(&self) -> Vec<&str> {
        Vec::new()
    }
}

/// What a plugin can reach while it initializes
#[derive(Clone)]
pub struct PluginContext {
    pub event_bus: Arc<dyn EventBus>,
    pub config: Arc<Config>,
}

impl PluginContext {
    pub fn new(event_bus: Arc<dyn EventBus>, config: Arc<Config>) -> Self {
        Self { event_bus, config }
    }
}

struct LoadedPlugin {
    plugin: Box<dyn Plugin>,
    info: PluginInfo,
}

/// Plugins in the order they were started
#[derive(Default)]
pub struct PluginRegistry {
    loaded: Vec<LoadedPlugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, name: &str) -> Option<&LoadedPlugin> {
        self.loaded.iter().find(|entry| entry.info.name == name)
    }

    /// Initialize `plugin` and keep it.
    ///
    /// Names are unique and dependencies must already be loaded. A plugin
    /// whose initialization fails is dropped.
    pub async fn register_plugin(
        &mut self,
        mut plugin: Box<dyn Plugin>,
        context: &PluginContext,
    ) -> Result<()> {
        let name = plugin.name().to_string();
        if self.find(&name).is_some() {
            return Err(FolioError::plugin(format!(
                "Plugin {} is already registered",
                name
            )));
        }

        let missing: Vec<String> = plugin
            .dependencies()
            .into_iter()
            .filter(|dependency| self.find(dependency).is_none())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(FolioError::plugin(format!(
                "Plugin {} needs {} loaded first",
                name,
                missing.join(", ")
            )));
        }

        let version = plugin.version().to_string();
        tracing::info!("Starting plugin {} v{}", name, version);
        plugin.initialize(context).await?;

        let to_owned =
            |labels: Vec<&str>| -> Vec<String> { labels.into_iter().map(String::from).collect() };
        let info = PluginInfo {
            name: name.clone(),
            version: version.clone(),
            status: plugin.status(),
            load_time: SystemTime::now(),
            dependencies: to_owned(plugin.dependencies()),
            provided_services: to_owned(plugin.provided_services()),
        };
        self.loaded.push(LoadedPlugin { plugin, info });

        let announced = context
            .event_bus
            .publish_system_event(SystemEvent::plugin_loaded(name, version))
            .await;
        if let Err(e) = announced {
            tracing::warn!("Plugin start was not announced: {}", e);
        }
        Ok(())
    }

    /// Stop every plugin, newest first, and return their names in stop order.
    /// Shutdown errors are logged and do not stop the sweep.
    pub async fn shutdown(&mut self) -> Vec<String> {
        let mut stopped = Vec::with_capacity(self.loaded.len());
        while let Some(mut entry) = self.loaded.pop() {
            tracing::debug!("Stopping plugin {}", entry.info.name);
            if let Err(e) = entry.plugin.shutdown().await {
                tracing::error!("Plugin {} failed to stop: {}", entry.info.name, e);
            }
            stopped.push(entry.info.name);
        }
        stopped
    }

    /// Registration record of `name` with its current status
    pub fn get_plugin_info(&self, name: &str) -> Option<PluginInfo> {
        self.find(name).map(|entry| PluginInfo {
            status: entry.plugin.status(),
            ..entry.info.clone()
        })
    }

    pub fn list_plugins(&self) -> Vec<&PluginInfo> {
        self.loaded.iter().map(|entry| &entry.info).collect()
    }

    pub fn is_plugin_loaded(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn is_plugin_active(&self, name: &str) -> bool {
        self.find(name)
            .is_some_and(|entry| entry.plugin.status() == PluginStatus::Active)
    }
}

/// Registration record of a plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub status: PluginStatus,
    pub load_time: SystemTime,
    pub dependencies: Vec<String>,
    pub provided_services: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginStatus {
    Loading,
    Active,
    Error(String),
    /// Turned off by configuration
    Disabled,
    Stopped,
}
