use serde::{Deserialize, Serialize};

/// Periodic resource sample written by the sampler, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStatSample {
    /// Wall clock time of the sample, in milliseconds since the unix epoch
    pub timestamp: u64,
    /// Event loop delay accumulated since the previous sample, in milliseconds
    pub delay: f64,
    /// CPU usage since the previous sample, where 1.0 is one fully busy core
    pub cpu: f64,
    pub memory: MemoryUsage,
    #[serde(default)]
    pub handles: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub rss: u64,
    pub heap_total: u64,
    pub heap_used: u64,
    #[serde(default)]
    pub external: u64,
}
