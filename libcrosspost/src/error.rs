//! Error types for Crosspost

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrosspostError>;

#[derive(Error, Debug)]
pub enum CrosspostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CrosspostError {
    /// Short machine-readable name of the error category
    pub fn kind(&self) -> &'static str {
        match self {
            CrosspostError::Config(_) => "configuration",
            CrosspostError::Media(_) => "media",
            CrosspostError::Platform(_) => "platform",
            CrosspostError::Transport(_) => "transport",
            CrosspostError::InvalidInput(_) => "invalid_input",
        }
    }

    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CrosspostError::InvalidInput(_) => 3,
            CrosspostError::Platform(PlatformError::Authentication(_)) => 2,
            CrosspostError::Config(_) => 2,
            CrosspostError::Platform(_) => 1,
            CrosspostError::Media(_) => 1,
            CrosspostError::Transport(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse posts file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Failed to load env file: {0}")]
    EnvFile(String),
}

#[derive(Error, Debug, Clone)]
pub enum MediaError {
    #[error("Image not found: {0}")]
    NotFound(String),

    #[error("Image unreadable: {0}")]
    Unreadable(String),

    #[error("Image rejected: {0}")]
    Rejected(String),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Target forbidden: {0}")]
    Forbidden(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),
}
