use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Open reservations older than this count as abandoned and are
    /// dropped by the next expiry sweep
    pub reservation_ttl_secs: i64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            reservation_ttl_secs: 300,
        }
    }
}
