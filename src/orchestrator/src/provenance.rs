use serde::{Deserialize, Serialize};

/// Descriptive metadata carried alongside a produced artifact: which
/// subcommand produced it, the parameters it was invoked with, and when. Never
/// consulted by matching logic; purely for reproducing a run later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub subcommand: String,
    pub parameters: String,
    pub timestamp: String,
    pub version: String,
}

impl Provenance {
    #[must_use]
    pub fn new(subcommand: impl Into<String>, parameters: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            subcommand: subcommand.into(),
            parameters: parameters.into(),
            timestamp: timestamp.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
