mod env;
mod exit_status;
mod finalize;
mod signal_relay;
mod supervisor;

use crate::config::DoctorConfig;
use crate::local_logger::clean_logger;
use crate::logging_paths::LoggingPaths;
use crate::prelude::*;
use doctor_shared::artifacts::RAW_TRACE_FILE_NAME;
use std::path::PathBuf;

pub use env::{EnvOverlay, OverlayMode, injected_flags, instrumentation_overlays, merge_env};
pub use exit_status::{TerminationOutcome, classify, classify_status, signal_name};
pub use finalize::{ensure_process_stat, ensure_system_info, relocate_trace_file};
pub use signal_relay::{InterruptHandle, Interrupts, SignalRelay};
pub use supervisor::SupervisedProcess;

pub const SUPERVISOR_TARGET: &str = "supervisor";

#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub instrumentation: DoctorConfig,
    /// Working directory of the child, which is also where the runtime drops its trace log
    pub working_directory: PathBuf,
}

impl CollectOptions {
    pub fn new(instrumentation: DoctorConfig) -> Result<Self> {
        Ok(Self {
            instrumentation,
            working_directory: std::env::current_dir()
                .context("Failed to get the current directory")?,
        })
    }

    fn capture_base(&self) -> PathBuf {
        match &self.instrumentation.output_dir {
            Some(output_dir) if output_dir.is_absolute() => output_dir.clone(),
            Some(output_dir) => self.working_directory.join(output_dir),
            None => self.working_directory.clone(),
        }
    }
}

/// The result of one supervised run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub paths: LoggingPaths,
    pub outcome: TerminationOutcome,
}

/// Runs `command` under instrumentation until it exits, then moves its artifacts in place.
///
/// Failing outcomes are returned as [`crate::error::DoctorError::AbnormalTermination`] errors
/// and leave the raw trace file untouched. An interrupt relayed to the child is not a failure.
pub async fn collect(
    command: &[String],
    options: &CollectOptions,
    interrupts: &mut Interrupts,
) -> Result<Capture> {
    let overlays = instrumentation_overlays(&options.instrumentation);

    // The child shares our terminal
    clean_logger();
    let process =
        SupervisedProcess::spawn(command, &overlays, Some(options.working_directory.as_path()))?;
    let pid = process.pid;
    let paths = LoggingPaths::for_identifier(&options.capture_base(), pid);

    let outcome = process.wait(interrupts).await?.into_result()?;
    if let TerminationOutcome::InterruptedBySignal(signal) = &outcome {
        info!("Process {pid} was interrupted by {signal}, keeping what was captured");
    }

    let raw_trace_file = options.working_directory.join(RAW_TRACE_FILE_NAME);
    relocate_trace_file(&raw_trace_file, &paths).await?;
    ensure_system_info(pid, &paths).await?;
    ensure_process_stat(&paths).await?;

    Ok(Capture { paths, outcome })
}
