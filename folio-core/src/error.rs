//! Error handling for the Folio system

use thiserror::Error;

/// Result type alias for Folio operations
pub type Result<T> = std::result::Result<T, FolioError>;

/// Main error type for the Folio system
#[derive(Error, Debug)]
pub enum FolioError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The store could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// The store answered with a payload that could not be understood
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The store refused a publish request
    #[error("Write rejected: {0}")]
    WriteRejected(String),

    /// The store answered a read request with a non-success status
    #[error("Request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    /// A document name that cannot be sent to the store
    #[error("Invalid filename '{0}'")]
    InvalidFilename(String),

    /// Operation not allowed in the current session state
    #[error("Session error: {0}")]
    Session(String),

    /// Plugin-related errors
    #[error("Plugin error: {0}")]
    Plugin(String),

    /// Event bus errors
    #[error("Event bus error: {0}")]
    EventBus(String),

    /// Preview server errors
    #[error("Server error: {0}")]
    Server(String),

    /// File system errors
    #[error("File system error: {0}")]
    FileSystem(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error("Error: {0}")]
    Generic(String),
}

impl FolioError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Create a new malformed response error
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create a new write rejection error
    pub fn write_rejected<S: Into<String>>(msg: S) -> Self {
        Self::WriteRejected(msg.into())
    }

    /// Create a new request failure error
    pub fn request_failed<S: Into<String>>(status: u16, msg: S) -> Self {
        Self::RequestFailed {
            status,
            message: msg.into(),
        }
    }

    /// Create a new invalid filename error
    pub fn invalid_filename<S: Into<String>>(name: S) -> Self {
        Self::InvalidFilename(name.into())
    }

    /// Create a new session error
    pub fn session<S: Into<String>>(msg: S) -> Self {
        Self::Session(msg.into())
    }

    /// Create a new plugin error
    pub fn plugin<S: Into<String>>(msg: S) -> Self {
        Self::Plugin(msg.into())
    }

    /// Create a new event bus error
    pub fn event_bus<S: Into<String>>(msg: S) -> Self {
        Self::EventBus(msg.into())
    }

    /// Create a new server error
    pub fn server<S: Into<String>>(msg: S) -> Self {
        Self::Server(msg.into())
    }

    /// Create a new file system error
    pub fn file_system<S: Into<String>>(msg: S) -> Self {
        Self::FileSystem(msg.into())
    }

    /// Create a generic error
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Self::Generic(msg.into())
    }

    /// Check if this is a recoverable error
    ///
    /// Recoverable errors leave the session usable; the user can retry the
    /// operation or carry on editing.
    pub fn is_recoverable(&self) -> bool {
        match self {
            FolioError::Config(_) => false,
            FolioError::Network(_) => true,
            FolioError::MalformedResponse(_) => true,
            FolioError::WriteRejected(_) => true,
            FolioError::RequestFailed { .. } => true,
            FolioError::InvalidFilename(_) => true,
            FolioError::Session(_) => true,
            FolioError::Plugin(_) => true,
            FolioError::EventBus(_) => true,
            FolioError::Server(_) => false,
            FolioError::FileSystem(_) => true,
            FolioError::Io(_) => true,
            FolioError::Json(_) => false,
            FolioError::Generic(_) => true,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            FolioError::Config(_) => ErrorSeverity::High,
            FolioError::Network(_) => ErrorSeverity::High,
            FolioError::MalformedResponse(_) => ErrorSeverity::Medium,
            FolioError::WriteRejected(_) => ErrorSeverity::High,
            FolioError::RequestFailed { .. } => ErrorSeverity::Medium,
            FolioError::InvalidFilename(_) => ErrorSeverity::Low,
            FolioError::Session(_) => ErrorSeverity::Low,
            FolioError::Plugin(_) => ErrorSeverity::Medium,
            FolioError::EventBus(_) => ErrorSeverity::Medium,
            FolioError::Server(_) => ErrorSeverity::Critical,
            FolioError::FileSystem(_) => ErrorSeverity::Medium,
            FolioError::Io(_) => ErrorSeverity::Medium,
            FolioError::Json(_) => ErrorSeverity::Low,
            FolioError::Generic(_) => ErrorSeverity::Low,
        }
    }

    /// Short label for the failing subsystem, used in event payloads
    pub fn kind(&self) -> &'static str {
        match self {
            FolioError::Config(_) => "config",
            FolioError::Network(_) => "network",
            FolioError::MalformedResponse(_) => "malformed_response",
            FolioError::WriteRejected(_) => "write_rejected",
            FolioError::RequestFailed { .. } => "request_failed",
            FolioError::InvalidFilename(_) => "invalid_filename",
            FolioError::Session(_) => "session",
            FolioError::Plugin(_) => "plugin",
            FolioError::EventBus(_) => "event_bus",
            FolioError::Server(_) => "server",
            FolioError::FileSystem(_) => "file_system",
            FolioError::Io(_) => "io",
            FolioError::Json(_) => "json",
            FolioError::Generic(_) => "generic",
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Low => write!(f, "LOW"),
            ErrorSeverity::Medium => write!(f, "MEDIUM"),
            ErrorSeverity::High => write!(f, "HIGH"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
