use thiserror::Error;

/// Sound system errors using thiserror for structured error handling.
///
/// Configuration failures (`NoOutputDevice`, `ManifestNotFound`,
/// `ManifestRead`, `ArchiveOpen`) are fatal to the engine and only surface
/// once during initialization. Asset failures are logged per sample.
/// `InvalidArgument` and `NotFound` reach the immediate caller.

#[derive(Error, Debug)]
pub enum SoundError {
    #[error("No usable audio output device: {0}")]
    NoOutputDevice(String),

    #[error("Sound manifest not found: {path}")]
    ManifestNotFound { path: String },

    #[error("Failed to read sound manifest: {path}")]
    ManifestRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open sound archive: {path}")]
    ArchiveOpen {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to decode sound sample: {path}")]
    DecodeFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Undefined sound sample: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SoundError {
    /// Whether this error left the engine non-operative
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SoundError::NoOutputDevice(_)
                | SoundError::ManifestNotFound { .. }
                | SoundError::ManifestRead { .. }
                | SoundError::ArchiveOpen { .. }
        )
    }
}

/// Result type for sound system operations
pub type SoundResult<T> = Result<T, SoundError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to create config directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;
