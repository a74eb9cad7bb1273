use crate::decode::RecordStream;
use crate::prelude::*;
use doctor_shared::records::{ProcessStatSample, TraceEvent};
use futures::TryStreamExt;

/// Garbage collection totals, folded from the trace events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GcSummary {
    pub events: u64,
    pub gc_time_us: u64,
    /// Earliest timestamp and latest end seen across all events
    span: Option<(u64, u64)>,
}

impl GcSummary {
    pub fn add(mut self, event: &TraceEvent) -> Self {
        let end = event.ts + event.duration_us();
        self.span = Some(match self.span {
            Some((start, last_end)) => (start.min(event.ts), last_end.max(end)),
            None => (event.ts, end),
        });
        if event.is_gc() {
            self.events += 1;
            self.gc_time_us += event.duration_us();
        }
        self
    }

    pub fn traced_time_us(&self) -> u64 {
        self.span.map(|(start, end)| end - start).unwrap_or(0)
    }

    /// Share of the traced time spent in garbage collection, between 0 and 1.
    pub fn share(&self) -> f64 {
        match self.traced_time_us() {
            0 => 0.0,
            traced => (self.gc_time_us as f64 / traced as f64).min(1.0),
        }
    }

    pub async fn from_stream(events: RecordStream<TraceEvent>) -> Result<Self> {
        events
            .try_fold(Self::default(), |summary, event| async move {
                Ok(summary.add(&event))
            })
            .await
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadSummary {
    pub samples: u64,
    pub max_delay_ms: f64,
    pub max_rss: u64,
    delay_sum: f64,
    cpu_sum: f64,
    first_heap_used: Option<u64>,
    last_heap_used: u64,
}

impl LoadSummary {
    pub fn add(mut self, sample: &ProcessStatSample) -> Self {
        self.samples += 1;
        self.delay_sum += sample.delay;
        self.max_delay_ms = self.max_delay_ms.max(sample.delay);
        self.cpu_sum += sample.cpu;
        self.max_rss = self.max_rss.max(sample.memory.rss);
        self.first_heap_used.get_or_insert(sample.memory.heap_used);
        self.last_heap_used = sample.memory.heap_used;
        self
    }

    pub fn mean_delay(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        self.delay_sum / self.samples as f64
    }

    pub fn mean_cpu(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        self.cpu_sum / self.samples as f64
    }

    /// Ratio between the last and the first heap usage, 1.0 without enough samples.
    pub fn heap_growth(&self) -> f64 {
        match self.first_heap_used {
            Some(first) if first > 0 => self.last_heap_used as f64 / first as f64,
            _ => 1.0,
        }
    }

    pub async fn from_stream(samples: RecordStream<ProcessStatSample>) -> Result<Self> {
        samples
            .try_fold(Self::default(), |summary, sample| async move {
                Ok(summary.add(&sample))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str, ph: &str, ts: u64, dur: Option<u64>) -> TraceEvent {
        TraceEvent {
            name: name.into(),
            cat: "v8".into(),
            ph: ph.into(),
            ts,
            dur,
            pid: 1,
            tid: 1,
            args: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_gc_share_spans_all_events() {
        let summary = [
            event("V8.GCScavenger", "X", 1_000, Some(100)),
            event("V8.Execute", "X", 1_050, Some(500)),
            event("mark", "i", 2_000, None),
        ]
        .iter()
        .fold(GcSummary::default(), GcSummary::add);

        assert_eq!(summary.events, 1);
        assert_eq!(summary.traced_time_us(), 1_000);
        assert!((summary.share() - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_summaries() {
        assert_eq!(GcSummary::default().share(), 0.0);
        let load = LoadSummary::default();
        assert_eq!(load.mean_cpu(), 0.0);
        assert_eq!(load.heap_growth(), 1.0);
    }
}
