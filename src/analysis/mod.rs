//! Default bottleneck analysis.
//!
//! Stands in for an external analysis collaborator: the report only needs a lazy stream of
//! [`AnalysisResult`]s and treats each one as opaque.

mod summary;

use crate::decode::RecordStream;
use doctor_shared::records::{
    AnalysisResult, IssueCategory, ProcessStatSample, Severity, SystemInfo, TraceEvent,
};
use futures::{StreamExt, TryStreamExt, stream};
use std::collections::BTreeMap;

pub use summary::{GcSummary, LoadSummary};

pub trait Analysis {
    fn analyze(
        &self,
        trace_events: RecordStream<TraceEvent>,
        process_stats: RecordStream<ProcessStatSample>,
    ) -> RecordStream<AnalysisResult>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    /// Share of the traced time spent collecting garbage
    pub gc_warning: f64,
    pub gc_critical: f64,
    /// Worst event loop delay of a single sample, in milliseconds
    pub delay_warning_ms: f64,
    pub delay_critical_ms: f64,
    /// Average cores used; below this while the loop is responsive the process waits on I/O
    pub idle_cpu: f64,
    /// Average share of the available cores used
    pub cpu_warning: f64,
    /// Ratio between the last and first heap usage
    pub heap_growth_warning: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            gc_warning: 0.1,
            gc_critical: 0.25,
            delay_warning_ms: 100.0,
            delay_critical_ms: 500.0,
            idle_cpu: 0.1,
            cpu_warning: 0.9,
            heap_growth_warning: 2.0,
        }
    }
}

/// Flags a category once a summary statistic crosses a fixed threshold.
pub struct ThresholdAnalysis {
    thresholds: Thresholds,
    cpu_cores: usize,
}

impl ThresholdAnalysis {
    pub fn new(system_info: &SystemInfo) -> Self {
        Self {
            thresholds: Thresholds::default(),
            cpu_cores: system_info.cpu_cores.max(1),
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

fn result(
    category: IssueCategory,
    severity: Severity,
    summary: impl Into<String>,
    metrics: impl IntoIterator<Item = (&'static str, f64)>,
) -> AnalysisResult {
    AnalysisResult {
        category,
        severity,
        summary: summary.into(),
        metrics: metrics
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect::<BTreeMap<_, _>>(),
    }
}

/// One result per category, in [`IssueCategory::ALL`] order.
pub fn diagnose(
    gc: &GcSummary,
    load: &LoadSummary,
    thresholds: &Thresholds,
    cpu_cores: usize,
) -> Vec<AnalysisResult> {
    let gc_share = gc.share();
    let gc_severity = if gc_share >= thresholds.gc_critical {
        Severity::Critical
    } else if gc_share >= thresholds.gc_warning {
        Severity::Warning
    } else {
        Severity::None
    };

    let delay_severity = if load.max_delay_ms >= thresholds.delay_critical_ms {
        Severity::Critical
    } else if load.max_delay_ms >= thresholds.delay_warning_ms {
        Severity::Warning
    } else {
        Severity::None
    };

    let mean_cpu = load.mean_cpu();
    let io_severity = if load.samples > 0
        && mean_cpu < thresholds.idle_cpu
        && delay_severity == Severity::None
    {
        Severity::Warning
    } else {
        Severity::None
    };

    let cpu_share = mean_cpu / cpu_cores as f64;
    let cpu_severity = if cpu_share >= thresholds.cpu_warning {
        Severity::Warning
    } else {
        Severity::None
    };

    let heap_growth = load.heap_growth();
    let memory_severity = if heap_growth >= thresholds.heap_growth_warning {
        Severity::Warning
    } else {
        Severity::None
    };

    IssueCategory::ALL
        .into_iter()
        .map(|category| match category {
            IssueCategory::Gc => result(
                category,
                gc_severity,
                format!("{:.1}% of the traced time was spent in garbage collection", gc_share * 100.0),
                [("gcShare", gc_share), ("gcEvents", gc.events as f64)],
            ),
            IssueCategory::EventLoop => result(
                category,
                delay_severity,
                format!("The event loop was blocked for up to {:.0} ms", load.max_delay_ms),
                [("maxDelayMs", load.max_delay_ms), ("meanDelayMs", load.mean_delay())],
            ),
            IssueCategory::Io => result(
                category,
                io_severity,
                if io_severity == Severity::None {
                    "The process kept the CPU busy".to_string()
                } else {
                    "The process was mostly idle, it is likely waiting on I/O".to_string()
                },
                [("meanCpu", mean_cpu)],
            ),
            IssueCategory::Memory => result(
                category,
                memory_severity,
                format!("The heap grew {heap_growth:.1}x over the capture"),
                [("heapGrowth", heap_growth), ("maxRssBytes", load.max_rss as f64)],
            ),
            IssueCategory::Cpu => result(
                category,
                cpu_severity,
                format!("{:.0}% of the available CPU was used on average", cpu_share * 100.0),
                [("cpuShare", cpu_share)],
            ),
        })
        .collect()
}

impl Analysis for ThresholdAnalysis {
    fn analyze(
        &self,
        trace_events: RecordStream<TraceEvent>,
        process_stats: RecordStream<ProcessStatSample>,
    ) -> RecordStream<AnalysisResult> {
        let thresholds = self.thresholds.clone();
        let cpu_cores = self.cpu_cores;

        stream::once(async move {
            let (gc, load) = futures::try_join!(
                GcSummary::from_stream(trace_events),
                LoadSummary::from_stream(process_stats)
            )?;
            let results = diagnose(&gc, &load, &thresholds, cpu_cores);
            Ok::<_, anyhow::Error>(stream::iter(results).map(Ok))
        })
        .try_flatten()
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use doctor_shared::records::MemoryUsage;

    fn sample(timestamp: u64, delay: f64, cpu: f64, heap_used: u64) -> ProcessStatSample {
        ProcessStatSample {
            timestamp,
            delay,
            cpu,
            memory: MemoryUsage {
                rss: heap_used * 2,
                heap_total: heap_used,
                heap_used,
                external: 0,
            },
            handles: 0,
        }
    }

    fn gc_event(ts: u64, dur: u64) -> TraceEvent {
        TraceEvent {
            name: "V8.GCMarkCompactor".into(),
            cat: "v8".into(),
            ph: "X".into(),
            ts,
            dur: Some(dur),
            pid: 1,
            tid: 1,
            args: serde_json::Value::Null,
        }
    }

    fn system_info(cpu_cores: usize) -> SystemInfo {
        SystemInfo {
            pid: 1,
            host: "host".into(),
            os: "ubuntu".into(),
            os_version: "24.04".into(),
            arch: "x86_64".into(),
            cpu_cores,
            total_memory_bytes: 0,
            runtime_version: None,
        }
    }

    async fn analyze(
        trace: Vec<TraceEvent>,
        stats: Vec<ProcessStatSample>,
    ) -> BTreeMap<IssueCategory, Severity> {
        ThresholdAnalysis::new(&system_info(1))
            .analyze(
                stream::iter(trace).map(Ok).boxed(),
                stream::iter(stats).map(Ok).boxed(),
            )
            .map_ok(|result| (result.category, result.severity))
            .try_collect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_healthy_process() {
        let severities = analyze(
            vec![gc_event(0, 10), gc_event(10_000, 10)],
            vec![sample(0, 1.0, 0.5, 100), sample(10, 2.0, 0.5, 120)],
        )
        .await;

        assert_eq!(severities.len(), IssueCategory::ALL.len());
        assert!(severities.values().all(|severity| *severity == Severity::None));
    }

    #[tokio::test]
    async fn test_gc_and_event_loop_issues() {
        let severities = analyze(
            vec![gc_event(0, 3_000), gc_event(7_000, 3_000)],
            vec![sample(0, 50.0, 0.95, 100), sample(10, 700.0, 0.95, 300)],
        )
        .await;

        assert_eq!(severities[&IssueCategory::Gc], Severity::Critical);
        assert_eq!(severities[&IssueCategory::EventLoop], Severity::Critical);
        assert_eq!(severities[&IssueCategory::Memory], Severity::Warning);
        assert_eq!(severities[&IssueCategory::Cpu], Severity::Warning);
        assert_eq!(severities[&IssueCategory::Io], Severity::None);
    }

    #[tokio::test]
    async fn test_idle_process_is_io_bound() {
        let severities = analyze(vec![], vec![sample(0, 1.0, 0.01, 100), sample(10, 1.0, 0.02, 100)]).await;
        assert_eq!(severities[&IssueCategory::Io], Severity::Warning);
    }

    #[tokio::test]
    async fn test_decode_error_is_forwarded() {
        let results: Vec<Result<AnalysisResult>> = ThresholdAnalysis::new(&system_info(2))
            .analyze(
                stream::iter(vec![Err(anyhow::anyhow!("broken trace"))]).boxed(),
                stream::empty().boxed(),
            )
            .collect()
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap_err().to_string(), "broken trace");
    }
}
