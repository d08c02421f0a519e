//! Configuration management for the Folio system

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::document::BLANK_DOCUMENT;
use crate::error::{FolioError, Result};

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "FOLIO_";

/// Client configuration, stored as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub global_settings: HashMap<String, serde_json::Value>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            store: StoreConfig::default(),
            preview: PreviewConfig::default(),
            editor: EditorConfig::default(),
            global_settings: HashMap::new(),
        }
    }

    /// Read a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FolioError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| FolioError::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Default location of the user configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("folio").join("config.json"))
    }

    /// Fail on the first validation error
    pub fn validate(&self) -> Result<()> {
        let result = self.validate_comprehensive();
        if let Some(first) = result.errors.first() {
            return Err(FolioError::Config(format!(
                "{}: {}",
                first.field_path, first.message
            )));
        }
        Ok(())
    }

    /// Validate every field and collect all errors and warnings
    pub fn validate_comprehensive(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        let url = self.store.base_url.trim();
        if url.is_empty() {
            result.error("store.base_url", "Store URL must not be empty");
        } else if !(url.starts_with("http://") || url.starts_with("https://")) {
            result.error(
                "store.base_url",
                format!("Store URL must start with http:// or https://, got '{}'", url),
            );
        }

        if self.store.request_timeout_secs == Some(0) {
            result.error(
                "store.request_timeout_secs",
                "Timeout must be positive; omit it to wait indefinitely",
            );
        }

        if self.preview.port == 0 {
            result.error("preview.port", "Invalid port number");
        }
        if self.preview.hostname.trim().is_empty() {
            result.error("preview.hostname", "Hostname must not be empty");
        }

        if self.editor.working_dir.as_os_str().is_empty() {
            result.error("editor.working_dir", "Working directory must not be empty");
        } else if !self.editor.working_dir.exists() {
            result.warning(
                "editor.working_dir",
                format!(
                    "Working directory does not exist yet and will be created: {}",
                    self.editor.working_dir.display()
                ),
            );
        }

        if self.editor.debounce_ms > 5_000 {
            result.warning(
                "editor.debounce_ms",
                "Debounce above 5 seconds makes the preview feel unresponsive",
            );
        }

        result.is_valid = result.errors.is_empty();
        result
    }

    /// Build the effective configuration: file, overrides, then validation
    pub fn load_with_context(context: &ConfigLoadContext) -> Result<(Self, ConfigMetadata)> {
        let start_time = SystemTime::now();
        let mut source_files = Vec::new();

        let mut config = match &context.base_path {
            Some(path) if path.exists() => {
                source_files.push(path.clone());
                Self::from_file(path)?
            }
            Some(path) if context.require_base => {
                return Err(FolioError::Config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            _ => Self::new(),
        };

        config.apply_environment_overrides(&context.environment_overrides)?;
        config.apply_cli_overrides(&context.cli_overrides)?;

        let validation = config.validate_comprehensive();
        let validation_status = if !validation.is_valid {
            ValidationStatus::Invalid
        } else if validation.warnings.is_empty() {
            ValidationStatus::Valid
        } else {
            ValidationStatus::ValidWithWarnings
        };

        let metadata = ConfigMetadata {
            loaded_at: start_time,
            source_files,
            validation_status,
            validation,
        };

        Ok((config, metadata))
    }

    /// Collect `FOLIO_*` variables from the process environment
    pub fn environment_overrides_from_process() -> HashMap<String, String> {
        std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect()
    }

    /// Apply `FOLIO_*` environment overrides
    pub fn apply_environment_overrides(
        &mut self,
        env_overrides: &HashMap<String, String>,
    ) -> Result<()> {
        for (key, value) in env_overrides {
            match key.as_str() {
                "FOLIO_STORE_URL" => self.store.base_url = value.clone(),
                "FOLIO_STORE_TIMEOUT" => {
                    self.store.request_timeout_secs = Some(value.parse().map_err(|_| {
                        FolioError::Config(format!(
                            "Invalid timeout in environment variable: {}",
                            value
                        ))
                    })?);
                }
                "FOLIO_PREVIEW_HOSTNAME" => self.preview.hostname = value.clone(),
                "FOLIO_PREVIEW_PORT" => {
                    self.preview.port = value.parse().map_err(|_| {
                        FolioError::Config(format!(
                            "Invalid port in environment variable: {}",
                            value
                        ))
                    })?;
                }
                "FOLIO_PREVIEW_ENABLED" => {
                    self.preview.enabled = value.parse().map_err(|_| {
                        FolioError::Config(format!(
                            "Invalid boolean in environment variable: {}",
                            value
                        ))
                    })?;
                }
                "FOLIO_WORKING_DIR" => self.editor.working_dir = PathBuf::from(value),
                key if key.starts_with("FOLIO_GLOBAL_") => {
                    let setting_key = key["FOLIO_GLOBAL_".len()..].to_lowercase();
                    self.global_settings
                        .insert(setting_key, env_value_to_json(value));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Apply `section.field` overrides collected from command line flags
    pub fn apply_cli_overrides(
        &mut self,
        cli_overrides: &HashMap<String, serde_json::Value>,
    ) -> Result<()> {
        for (key, value) in cli_overrides {
            match (key.as_str(), value) {
                ("store.base_url", serde_json::Value::String(url)) => {
                    self.store.base_url = url.clone();
                }
                ("preview.hostname", serde_json::Value::String(hostname)) => {
                    self.preview.hostname = hostname.clone();
                }
                ("preview.port", serde_json::Value::Number(port)) => {
                    let port = port
                        .as_u64()
                        .and_then(|p| u16::try_from(p).ok())
                        .ok_or_else(|| FolioError::Config(format!("Invalid port: {}", port)))?;
                    self.preview.port = port;
                }
                ("preview.enabled", serde_json::Value::Bool(enabled)) => {
                    self.preview.enabled = *enabled;
                }
                ("editor.working_dir", serde_json::Value::String(dir)) => {
                    self.editor.working_dir = PathBuf::from(dir);
                }
                (key, value) if key.starts_with("global.") => {
                    self.global_settings
                        .insert(key["global.".len()..].to_string(), value.clone());
                }
                (key, _) => {
                    tracing::debug!("Ignoring unknown CLI override: {}", key);
                }
            }
        }
        Ok(())
    }

    /// Typed read of a free-form setting
    pub fn get_global_setting<T>(&self, key: &str) -> Option<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.global_settings
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// `global_settings.dev_mode`, set by `--dev-mode` or `FOLIO_GLOBAL_DEV_MODE`
    pub fn dev_mode(&self) -> bool {
        self.get_global_setting("dev_mode").unwrap_or(false)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn env_value_to_json(value: &str) -> serde_json::Value {
    if let Ok(flag) = value.parse::<bool>() {
        return serde_json::Value::Bool(flag);
    }
    if let Ok(int) = value.parse::<i64>() {
        return serde_json::Value::from(int);
    }
    if let Some(num) = value
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
    {
        return serde_json::Value::Number(num);
    }
    serde_json::Value::String(value.to_string())
}

/// Connection settings for the document store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub base_url: String,
    /// Requests wait indefinitely unless this is set
    pub request_timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:80".to_string(),
            request_timeout_secs: None,
            user_agent: format!("folio/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Local preview server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub hostname: String,
    pub port: u16,
    pub enabled: bool,
    pub cors_enabled: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            hostname: "127.0.0.1".to_string(),
            port: 3000,
            enabled: true,
            cors_enabled: true,
        }
    }
}

/// Working copy and editing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub working_dir: PathBuf,
    pub debounce_ms: u64,
    pub blank_template: String,
    pub ignore_patterns: Vec<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from(".folio"),
            debounce_ms: 100,
            blank_template: BLANK_DOCUMENT.to_string(),
            ignore_patterns: vec![
                "**/*.tmp".to_string(),
                "**/*.swp".to_string(),
                "**/*.swx".to_string(),
                "**/*~".to_string(),
                "**/.#*".to_string(),
                "**/4913".to_string(),
            ],
        }
    }
}

/// Outcome of a comprehensive validation pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    fn error(&mut self, field_path: &str, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            field_path: field_path.to_string(),
            message: message.into(),
        });
    }

    fn warning(&mut self, field_path: &str, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            field_path: field_path.to_string(),
            message: message.into(),
        });
    }
}

/// A single validation error or warning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field_path: String,
    pub message: String,
}

/// Where configuration comes from
#[derive(Debug, Clone)]
pub struct ConfigLoadContext {
    pub base_path: Option<PathBuf>,
    /// Fail when `base_path` is set but missing
    pub require_base: bool,
    pub environment_overrides: HashMap<String, String>,
    pub cli_overrides: HashMap<String, serde_json::Value>,
}

impl Default for ConfigLoadContext {
    fn default() -> Self {
        Self {
            base_path: Config::default_path(),
            require_base: false,
            environment_overrides: HashMap::new(),
            cli_overrides: HashMap::new(),
        }
    }
}

/// How a configuration was assembled
#[derive(Debug, Clone)]
pub struct ConfigMetadata {
    pub loaded_at: SystemTime,
    pub source_files: Vec<PathBuf>,
    pub validation_status: ValidationStatus,
    pub validation: ValidationResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    Valid,
    ValidWithWarnings,
    Invalid,
}
