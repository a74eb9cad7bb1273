use serde::{Deserialize, Serialize};

/// One entry of the runtime trace log, in the trace event format.
///
/// Timestamps and durations are in microseconds on the runtime's monotonic clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub name: String,
    #[serde(default)]
    pub cat: String,
    pub ph: String,
    pub ts: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dur: Option<u64>,
    #[serde(default)]
    pub pid: u32,
    #[serde(default)]
    pub tid: u32,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub args: serde_json::Value,
}

impl TraceEvent {
    /// Garbage collection phases are reported by the runtime under the `v8` category.
    pub fn is_gc(&self) -> bool {
        self.cat.split(',').any(|cat| cat == "v8") && self.name.contains("GC")
    }

    /// Duration of a complete (`X`) event, in microseconds.
    pub fn duration_us(&self) -> u64 {
        match self.ph.as_str() {
            "X" => self.dur.unwrap_or_default(),
            _ => 0,
        }
    }
}
