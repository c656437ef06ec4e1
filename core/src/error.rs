use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Another backup run is active (lock at {path})")]
    AlreadyRunning { path: String },

    #[error("Source directory not found: {path}")]
    SourceNotFound { path: String },

    #[error("Insufficient space at destination: {needed} bytes needed, {available} available")]
    InsufficientSpace { needed: u64, available: u64 },

    #[error("Archive creation failed: {0}")]
    ArchiveCreationFailed(String),

    #[error("Failed to write checksum record: {0}")]
    ChecksumWriteFailed(String),

    #[error("Checksum mismatch for {archive}")]
    ChecksumMismatch { archive: String },

    #[error("Backup not found: {name}")]
    BackupNotFound { name: String },

    #[error("Restore failed: {0}")]
    RestoreFailed(String),

    #[error("Config file not found at {path}")]
    ConfigMissing { path: String },

    #[error("Invalid config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
