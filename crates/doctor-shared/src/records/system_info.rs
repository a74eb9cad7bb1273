use serde::{Deserialize, Serialize};

/// Point-in-time description of the machine the capture ran on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub pid: u32,
    pub host: String,
    pub os: String,
    pub os_version: String,
    pub arch: String,
    pub cpu_cores: usize,
    pub total_memory_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,
}
