use serde::{Deserialize, Serialize};

/// Fan-out settings for operations that run across many servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// Upper bound on servers handled concurrently. `1` runs sequentially.
    #[serde(default = "d_workers")]
    pub workers: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            workers: d_workers(),
        }
    }
}

fn d_workers() -> usize {
    4
}
