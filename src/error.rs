use std::path::PathBuf;
use thiserror::Error;

/// Main error type for pkgrisk
#[derive(Error, Debug)]
pub enum PkgriskError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Scoring policy failed validation (weights, thresholds, ordering)
    #[error("Scoring policy validation failed: {errors:?}")]
    PolicyValidation { errors: Vec<ValidationError> },

    /// Metrics bundle is structurally invalid
    #[error("Invalid metrics bundle for {package}: {errors:?}")]
    InvalidBundle {
        package: String,
        errors: Vec<ValidationError>,
    },

    /// Chunk payload could not be parsed
    #[error("Corrupt chunk {path}: {source}")]
    CorruptChunk {
        path: String,
        source: serde_json::Error,
    },

    /// Same package name appears twice in one publish batch
    #[error("Duplicate package in publish batch: {ecosystem}/{name}")]
    DuplicatePackage { ecosystem: String, name: String },

    /// Record belongs to a different ecosystem than the one being published
    #[error("Package {name} belongs to ecosystem '{found}', expected '{expected}'")]
    EcosystemMismatch {
        name: String,
        expected: String,
        found: String,
    },

    /// Published chunk set disagrees with its manifest
    #[error("Chunk manifest mismatch for {ecosystem}: {problems:?}")]
    ManifestMismatch {
        ecosystem: String,
        problems: Vec<String>,
    },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PkgriskError {
    pub(crate) fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        Self::Io {
            source,
            context: context.into(),
        }
    }

    pub(crate) fn json(source: serde_json::Error, context: impl Into<String>) -> Self {
        Self::Json {
            source,
            context: context.into(),
        }
    }
}

/// Validation error for configuration, policy, and bundle checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Path to the key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Result type for pkgrisk operations
pub type Result<T> = std::result::Result<T, PkgriskError>;
