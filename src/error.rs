use crate::collect::TerminationOutcome;
use std::path::PathBuf;

/// Failure kinds surfaced by capture and report assembly.
///
/// Errors travel as [`anyhow::Error`]; callers that need to branch on the kind downcast to
/// this type, see [`error_kind`].
#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("failed to spawn `{command}`: {source}")]
    ProcessSpawnFailure {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    AbnormalTermination(TerminationOutcome),

    #[error("failed to move the trace file {} to {}: {source}", from.display(), to.display())]
    CaptureRelocationFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{} is already being written by another report assembly", .0.display())]
    ResourceBusy(PathBuf),

    #[error("report assembly failed: {0:#}")]
    StreamFailure(anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ProcessSpawnFailure,
    AbnormalTermination,
    CaptureRelocationFailure,
    InvalidArgument,
    ResourceBusy,
    StreamFailure,
}

impl DoctorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DoctorError::ProcessSpawnFailure { .. } => ErrorKind::ProcessSpawnFailure,
            DoctorError::AbnormalTermination(_) => ErrorKind::AbnormalTermination,
            DoctorError::CaptureRelocationFailure { .. } => ErrorKind::CaptureRelocationFailure,
            DoctorError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            DoctorError::ResourceBusy(_) => ErrorKind::ResourceBusy,
            DoctorError::StreamFailure(_) => ErrorKind::StreamFailure,
        }
    }
}

/// Returns the kind of the outermost [`DoctorError`] in the chain, if any.
pub fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<DoctorError>())
        .map(DoctorError::kind)
}
