use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated in `trade-pulse`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum PulseError {
    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("empty series: {0} received zero rows")]
    EmptySeries(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("bucket width must be a positive number of milliseconds")]
    InvalidBucketWidth,

    #[error("IO error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serde(String),
}

impl PulseError {
    /// Determine if an error must abort the current pipeline run.
    ///
    /// [`PulseError::EmptySeries`] is always recovered locally by substituting a documented
    /// default, everything else stops the run before any partial state is persisted.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_fatal(&self) -> bool {
        match self {
            PulseError::EmptySeries(_) => false,
            _ => true,
        }
    }
}

impl From<std::io::Error> for PulseError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for PulseError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value.to_string())
    }
}

impl From<csv::Error> for PulseError {
    fn from(value: csv::Error) -> Self {
        Self::Serde(value.to_string())
    }
}
