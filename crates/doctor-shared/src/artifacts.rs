//! WARNING: Has to be in sync with the injected sampler, which derives the same names from its
//! own pid.

/// Suffix of the directory holding every artifact of one capture.
pub const ROOT_SUFFIX: &str = "perf-doctor";

pub const TRACE_EVENT_SUFFIX: &str = "perf-doctor-traceevent";
pub const SYSTEM_INFO_SUFFIX: &str = "perf-doctor-systeminfo";
pub const PROCESS_STAT_SUFFIX: &str = "perf-doctor-processstat";

/// Name of the trace log the instrumented runtime writes in its working directory.
pub const RAW_TRACE_FILE_NAME: &str = "node_trace.1.log";

/// Environment variable read by the sampler to pick its sampling cadence, in milliseconds.
pub const SAMPLE_INTERVAL_ENV: &str = "PERF_DOCTOR_SAMPLE_INTERVAL";
