use crate::error::DoctorError;
use crate::logging_paths::LoggingPaths;
use crate::prelude::*;
use doctor_shared::records::SystemInfo;
use std::path::Path;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

use super::SUPERVISOR_TARGET;

/// Moves the runtime's trace log into the capture directory.
///
/// The file is renamed, never copied: once moved it belongs to the capture.
pub async fn relocate_trace_file(raw_trace_file: &Path, paths: &LoggingPaths) -> Result<()> {
    tokio::fs::create_dir_all(&paths.root)
        .await
        .with_context(|| format!("Failed to create {}", paths.root.display()))?;

    tokio::fs::rename(raw_trace_file, &paths.trace_event)
        .await
        .map_err(|source| DoctorError::CaptureRelocationFailure {
            from: raw_trace_file.to_path_buf(),
            to: paths.trace_event.clone(),
            source,
        })?;
    debug!(
        target: SUPERVISOR_TARGET,
        "Moved {} to {}",
        raw_trace_file.display(),
        paths.trace_event.display()
    );
    Ok(())
}

fn snapshot_system_info(pid: u32) -> SystemInfo {
    let system = System::new_with_specifics(
        RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::everything()),
    );

    SystemInfo {
        pid,
        host: System::host_name().unwrap_or_default(),
        os: System::distribution_id(),
        os_version: System::os_version().unwrap_or_default(),
        arch: System::cpu_arch(),
        cpu_cores: system.cpus().len(),
        total_memory_bytes: system.total_memory(),
        runtime_version: None,
    }
}

/// Writes a system snapshot unless the sampler already produced one.
pub async fn ensure_system_info(pid: u32, paths: &LoggingPaths) -> Result<()> {
    if tokio::fs::try_exists(&paths.system_info).await? {
        return Ok(());
    }

    debug!(
        target: SUPERVISOR_TARGET,
        "No system info written by the sampler, taking a snapshot"
    );
    let system_info = snapshot_system_info(pid);
    tokio::fs::create_dir_all(&paths.root).await?;
    tokio::fs::write(&paths.system_info, serde_json::to_vec(&system_info)?)
        .await
        .with_context(|| format!("Failed to write {}", paths.system_info.display()))?;
    Ok(())
}

/// Leaves an empty process-stat artifact when no sampler wrote one, so the capture can still
/// be reported.
pub async fn ensure_process_stat(paths: &LoggingPaths) -> Result<()> {
    if tokio::fs::try_exists(&paths.process_stat).await? {
        return Ok(());
    }

    warn!(
        "No resource samples were recorded, configure a sampler to get the process statistics"
    );
    tokio::fs::create_dir_all(&paths.root).await?;
    tokio::fs::write(&paths.process_stat, b"")
        .await
        .with_context(|| format!("Failed to write {}", paths.process_stat.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, error_kind};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_relocate_moves_the_trace_file() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("node_trace.1.log");
        std::fs::write(&raw, "{\"traceEvents\":[\n]}").unwrap();
        let paths = LoggingPaths::for_identifier(dir.path(), 12);

        relocate_trace_file(&raw, &paths).await.unwrap();

        assert!(!raw.exists());
        assert_eq!(
            std::fs::read_to_string(&paths.trace_event).unwrap(),
            "{\"traceEvents\":[\n]}"
        );
    }

    #[tokio::test]
    async fn test_relocate_missing_trace_file() {
        let dir = TempDir::new().unwrap();
        let paths = LoggingPaths::for_identifier(dir.path(), 12);

        let err = relocate_trace_file(&dir.path().join("missing.log"), &paths)
            .await
            .unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::CaptureRelocationFailure));
    }

    #[tokio::test]
    async fn test_system_info_is_kept_when_present() {
        let dir = TempDir::new().unwrap();
        let paths = LoggingPaths::for_identifier(dir.path(), 12);
        std::fs::create_dir_all(&paths.root).unwrap();
        std::fs::write(&paths.system_info, "from sampler").unwrap();

        ensure_system_info(12, &paths).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(&paths.system_info).unwrap(),
            "from sampler"
        );
    }

    #[tokio::test]
    async fn test_system_info_snapshot() {
        let dir = TempDir::new().unwrap();
        let paths = LoggingPaths::for_identifier(dir.path(), 12);

        ensure_system_info(12, &paths).await.unwrap();
        let info: SystemInfo =
            serde_json::from_slice(&std::fs::read(&paths.system_info).unwrap()).unwrap();
        assert_eq!(info.pid, 12);
    }

    #[tokio::test]
    async fn test_process_stat_is_kept_when_present() {
        let dir = TempDir::new().unwrap();
        let paths = LoggingPaths::for_identifier(dir.path(), 12);
        std::fs::create_dir_all(&paths.root).unwrap();
        std::fs::write(&paths.process_stat, "{}\n").unwrap();

        ensure_process_stat(&paths).await.unwrap();
        assert_eq!(std::fs::read_to_string(&paths.process_stat).unwrap(), "{}\n");
    }

    #[tokio::test]
    async fn test_missing_process_stat_is_left_empty() {
        let dir = TempDir::new().unwrap();
        let paths = LoggingPaths::for_identifier(dir.path(), 12);

        ensure_process_stat(&paths).await.unwrap();
        assert_eq!(std::fs::read(&paths.process_stat).unwrap(), b"");
    }
}
