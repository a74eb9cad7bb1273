use crate::error::DoctorError;
use doctor_shared::artifacts::{
    PROCESS_STAT_SUFFIX, ROOT_SUFFIX, SYSTEM_INFO_SUFFIX, TRACE_EVENT_SUFFIX,
};
use std::path::{Path, PathBuf};

/// Location of every artifact belonging to one capture.
///
/// Derived from nothing but a process id or an existing capture directory, so the sampler
/// running inside the child, the supervisor and a later `visualize` all agree on the same
/// layout without talking to each other:
///
/// ```text
/// <base>/<id>.perf-doctor/
///     <id>.perf-doctor-traceevent
///     <id>.perf-doctor-systeminfo
///     <id>.perf-doctor-processstat
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoggingPaths {
    pub root: PathBuf,
    pub trace_event: PathBuf,
    pub system_info: PathBuf,
    pub process_stat: PathBuf,
}

impl LoggingPaths {
    /// Resolves the paths from exactly one of `identifier` or `directory`.
    pub fn resolve(
        identifier: Option<u32>,
        directory: Option<&Path>,
    ) -> Result<Self, DoctorError> {
        match (identifier, directory) {
            (Some(identifier), None) => Ok(Self::for_identifier(Path::new(""), identifier)),
            (None, Some(directory)) => Self::for_directory(directory),
            (Some(_), Some(_)) => Err(DoctorError::InvalidArgument(
                "logging paths take either an identifier or a directory, not both".into(),
            )),
            (None, None) => Err(DoctorError::InvalidArgument(
                "logging paths need an identifier or a directory".into(),
            )),
        }
    }

    /// Paths of the capture of process `identifier`, rooted under `base`.
    pub fn for_identifier(base: &Path, identifier: u32) -> Self {
        Self::from_parts(base.join(format!("{identifier}.{ROOT_SUFFIX}")), &identifier.to_string())
    }

    /// Paths of an existing capture directory.
    ///
    /// The artifact prefix is the directory name without its `.perf-doctor` suffix, so a
    /// directory produced by [`LoggingPaths::for_identifier`] resolves back to the same paths.
    pub fn for_directory(directory: &Path) -> Result<Self, DoctorError> {
        let name = directory
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                DoctorError::InvalidArgument(format!(
                    "{} is not a valid capture directory",
                    directory.display()
                ))
            })?;
        let prefix = name
            .strip_suffix(&format!(".{ROOT_SUFFIX}"))
            .unwrap_or(name)
            .to_owned();

        Ok(Self::from_parts(directory.to_path_buf(), &prefix))
    }

    fn from_parts(root: PathBuf, prefix: &str) -> Self {
        Self {
            trace_event: root.join(format!("{prefix}.{TRACE_EVENT_SUFFIX}")),
            system_info: root.join(format!("{prefix}.{SYSTEM_INFO_SUFFIX}")),
            process_stat: root.join(format!("{prefix}.{PROCESS_STAT_SUFFIX}")),
            root,
        }
    }
}
