use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCategory {
    Gc,
    EventLoop,
    Io,
    Memory,
    Cpu,
}

impl IssueCategory {
    pub const ALL: [IssueCategory; 5] = [
        IssueCategory::Gc,
        IssueCategory::EventLoop,
        IssueCategory::Io,
        IssueCategory::Memory,
        IssueCategory::Cpu,
    ];

    /// Same as the serialized name.
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::Gc => "gc",
            IssueCategory::EventLoop => "event-loop",
            IssueCategory::Io => "io",
            IssueCategory::Memory => "memory",
            IssueCategory::Cpu => "cpu",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Warning,
    Critical,
}

/// One diagnosed condition. The report treats it as an opaque serializable unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub category: IssueCategory,
    pub severity: Severity,
    pub summary: String,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl AnalysisResult {
    pub fn is_issue(&self) -> bool {
        self.severity != Severity::None
    }
}
