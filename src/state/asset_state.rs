use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of resolving one asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    /// Downloaded during this run and written to the assets directory
    Stored,

    /// Taken over from a previous run's mapping without downloading
    Reused,

    /// Could not be downloaded; references keep their original value
    Missing,
}

impl AssetStatus {
    /// Returns true if a local file backs this asset
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Stored | Self::Reused)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::Reused => "reused",
            Self::Missing => "missing",
        }
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
