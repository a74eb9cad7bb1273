use nix::sys::signal::Signal;
use std::fmt::{self, Display};
use std::process::ExitStatus;

use crate::error::DoctorError;

/// How a supervised process ended. Produced once, after the process has been reaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationOutcome {
    Success,
    InterruptedBySignal(String),
    FailedWithExitCode(i32),
    FailedWithSignal(String),
}

impl TerminationOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TerminationOutcome::FailedWithExitCode(_) | TerminationOutcome::FailedWithSignal(_)
        )
    }

    /// Turns failing outcomes into an [`DoctorError::AbnormalTermination`] error.
    pub fn into_result(self) -> Result<Self, DoctorError> {
        if self.is_failure() {
            Err(DoctorError::AbnormalTermination(self))
        } else {
            Ok(self)
        }
    }
}

impl Display for TerminationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationOutcome::Success => write!(f, "process exited successfully"),
            TerminationOutcome::InterruptedBySignal(signal) => {
                write!(f, "process was interrupted by {signal}")
            }
            TerminationOutcome::FailedWithExitCode(code) => {
                write!(f, "process exited with exit code {code}")
            }
            TerminationOutcome::FailedWithSignal(signal) => {
                write!(f, "process exited with exit signal {signal}")
            }
        }
    }
}

pub fn signal_name(signal: i32) -> String {
    Signal::try_from(signal)
        .map(|signal| signal.as_str().to_owned())
        .unwrap_or_else(|_| format!("SIG{signal}"))
}

/// Classifies a terminated process.
///
/// The checks are ordered: a zero exit code wins, then the signal we relayed ourselves, then any
/// other signal, and only then a numeric exit code. A process killed by a signal has no exit
/// code, so it must never be reported as a plain non-zero exit.
pub fn classify(
    code: Option<i32>,
    signal: Option<i32>,
    relayed: Option<Signal>,
) -> TerminationOutcome {
    match (code, signal) {
        (Some(0), _) => TerminationOutcome::Success,
        (_, Some(signal)) if relayed.is_some_and(|relayed| relayed as i32 == signal) => {
            TerminationOutcome::InterruptedBySignal(signal_name(signal))
        }
        (_, Some(signal)) => TerminationOutcome::FailedWithSignal(signal_name(signal)),
        (Some(code), None) => TerminationOutcome::FailedWithExitCode(code),
        // Neither a code nor a signal: the platform hid the reason, keep it a failure.
        (None, None) => TerminationOutcome::FailedWithExitCode(-1),
    }
}

pub fn classify_status(status: ExitStatus, relayed: Option<Signal>) -> TerminationOutcome {
    use std::os::unix::process::ExitStatusExt;

    classify(status.code(), status.signal(), relayed)
}
