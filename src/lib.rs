//! Sumi-Mirror: a faithful site mirror with fidelity scoring
//!
//! This crate mirrors a live multi-page site into a self-contained local copy
//! (pages plus content-addressed image assets, with links and image maps
//! rewritten to local paths), then scores how faithfully the mirror reproduces
//! the origin.

pub mod config;
pub mod mirror;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;
pub mod validate;

use thiserror::Error;

/// Main error type for Sumi-Mirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Failed to rewrite references in {page}: {message}")]
    Rewrite { page: String, message: String },

    #[error("Invalid status transition for {page}: {from:?} -> {to:?}")]
    InvalidTransition {
        page: String,
        from: state::PageStatus,
        to: state::PageStatus,
    },

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Failure of a single fetch after the retry policy has been applied
///
/// Callers must be able to tell "the origin could not be reached at all"
/// apart from "the origin answered with an error page".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection-level failure (reset, refused, timeout) surviving every attempt
    #[error("{url} unreachable after {attempts} attempt(s): {reason}")]
    Transient {
        url: String,
        attempts: u32,
        reason: String,
    },

    /// The origin answered with a non-2xx status that was final
    #[error("{url} answered HTTP {status} after {attempts} attempt(s)")]
    Permanent {
        url: String,
        status: u16,
        attempts: u32,
    },
}

impl FetchError {
    /// Returns true if the origin could not be reached at all
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns the final HTTP status, if the origin answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Permanent { status, .. } => Some(*status),
            Self::Transient { .. } => None,
        }
    }

    /// Number of attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Transient { attempts, .. } | Self::Permanent { attempts, .. } => *attempts,
        }
    }
}

/// Result type alias for Sumi-Mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use mirror::{run_mirror, MirrorResult, Orchestrator, Page};
pub use state::{AssetStatus, PageStatus};
pub use url::{extract_domain, normalize_url, PageStyle};
pub use validate::{run_validation, ValidationReport, Validator};
