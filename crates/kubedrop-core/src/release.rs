//! Release identifiers

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Characters used in generated identifiers (valid in label values)
const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated identifiers
pub const RELEASE_ID_LEN: usize = 10;

/// Token generated once per provisioning invocation
///
/// Stamped on the workload, its pod template and the service so that waiters
/// can tell this run's generation apart from a previous run with the same
/// name. Never persisted: a restarted process gets a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseId(String);

impl ReleaseId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let id = (0..RELEASE_ID_LEN)
            .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ReleaseId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ReleaseId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
