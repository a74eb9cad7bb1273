use super::ByteStream;
use crate::error::DoctorError;
use crate::prelude::*;
use futures::TryStreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

const PARTIAL_EXTENSION: &str = "partial";

/// Where a document is written until it is complete.
pub fn partial_path(path: &Path) -> Result<PathBuf, DoctorError> {
    let file_name = path.file_name().ok_or_else(|| {
        DoctorError::InvalidArgument(format!("{} is not a file path", path.display()))
    })?;
    let mut partial = file_name.to_os_string();
    partial.push(".");
    partial.push(PARTIAL_EXTENSION);
    Ok(path.with_file_name(partial))
}

/// Streams `document` to `path`, which only appears once every byte is on disk.
///
/// Bytes go to `<path>.partial`, created exclusively: if it already exists another assembly
/// owns the destination and this one fails with [`DoctorError::ResourceBusy`] without
/// touching it. Once the stream ends the file is synced, closed and renamed over `path`.
/// Any error removes the partial file and is returned as a single
/// [`DoctorError::StreamFailure`].
pub async fn write_document(document: ByteStream, path: &Path) -> Result<(), DoctorError> {
    let partial = partial_path(path)?;

    let file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&partial)
        .await
    {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            return Err(DoctorError::ResourceBusy(path.to_path_buf()));
        }
        Err(err) => {
            return Err(DoctorError::StreamFailure(
                Error::new(err).context(format!("Failed to create {}", partial.display())),
            ));
        }
    };

    match drain(document, file, &partial, path).await {
        Ok(written) => {
            debug!("Wrote {written} bytes to {}", path.display());
            Ok(())
        }
        Err(err) => {
            if let Err(remove_err) = tokio::fs::remove_file(&partial).await {
                warn!("Failed to remove {}: {remove_err}", partial.display());
            }
            Err(DoctorError::StreamFailure(err))
        }
    }
}

async fn drain(mut document: ByteStream, file: File, partial: &Path, path: &Path) -> Result<u64> {
    let mut writer = BufWriter::new(file);
    let mut written = 0;

    while let Some(chunk) = document.try_next().await? {
        writer
            .write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write to {}", partial.display()))?;
        written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .with_context(|| format!("Failed to write to {}", partial.display()))?;
    let file = writer.into_inner();
    file.sync_all()
        .await
        .with_context(|| format!("Failed to sync {}", partial.display()))?;
    drop(file);

    tokio::fs::rename(partial, path)
        .await
        .with_context(|| format!("Failed to move {} to {}", partial.display(), path.display()))?;
    Ok(written)
}
