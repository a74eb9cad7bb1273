use super::ByteStream;
use crate::prelude::*;
use bytes::Bytes;
use doctor_shared::records::IssueCategory;
use futures::{StreamExt, TryStreamExt, stream};
use std::path::{Path, PathBuf};
use tokio_util::io::ReaderStream;

const CHUNK_SIZE: usize = 16 * 1024;

pub const REPORT_TEMPLATE: &str = include_str!("../../assets/report.html");
pub const DATA_TEMPLATE: &str = include_str!("../../assets/data.json");

const STYLE: &str = include_str!("../../assets/style.css");
const LOGO: &[u8] = include_bytes!("../../assets/logo.svg");
const SCRIPT: &str = include_str!("../../assets/doctor.js");
pub const SCRIPT_FILE_NAME: &str = "doctor.js";

fn recommendation_text(category: IssueCategory) -> &'static str {
    match category {
        IssueCategory::Gc => include_str!("../../assets/recommendations/gc.html"),
        IssueCategory::EventLoop => include_str!("../../assets/recommendations/event-loop.html"),
        IssueCategory::Io => include_str!("../../assets/recommendations/io.html"),
        IssueCategory::Memory => include_str!("../../assets/recommendations/memory.html"),
        IssueCategory::Cpu => include_str!("../../assets/recommendations/cpu.html"),
    }
}

/// Embedded content, streamed in fixed size chunks.
pub fn static_bytes(content: &'static [u8]) -> ByteStream {
    stream::iter(content.chunks(CHUNK_SIZE))
        .map(|chunk| Ok(Bytes::from_static(chunk)))
        .boxed()
}

pub fn style() -> ByteStream {
    static_bytes(STYLE.as_bytes())
}

pub fn logo() -> ByteStream {
    static_bytes(LOGO)
}

/// Streams a file from disk, opened on first poll.
pub fn file_bytes(path: PathBuf) -> ByteStream {
    stream::once(async move {
        tokio::fs::File::open(&path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))
            .map(|file| {
                ReaderStream::with_capacity(file, CHUNK_SIZE)
                    .map_err(move |err| anyhow!(err).context(format!("Failed to read {}", path.display())))
            })
    })
    .try_flatten()
    .boxed()
}

/// The client script, taken from `assets_dir` when one is configured.
pub fn script(assets_dir: Option<&Path>) -> ByteStream {
    match assets_dir {
        Some(assets_dir) => {
            let path = assets_dir.join(SCRIPT_FILE_NAME);
            debug!("Using the client script at {}", path.display());
            file_bytes(path)
        }
        None => static_bytes(SCRIPT.as_bytes()),
    }
}

/// Recommendation text for every category, one `<template>` each.
///
/// The client script shows those matching the categories flagged by the analysis.
pub fn recommendations() -> ByteStream {
    stream::iter(IssueCategory::ALL)
        .map(|category| {
            Ok(Bytes::from(format!(
                "<template data-category=\"{}\">\n{}</template>\n",
                category.as_str(),
                recommendation_text(category)
            )))
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Template;
    use tempfile::TempDir;

    async fn collect(stream: ByteStream) -> Result<Vec<u8>> {
        let chunks: Vec<Bytes> = stream.try_collect().await?;
        Ok(chunks.concat())
    }

    #[test]
    fn test_templates_parse() {
        let report = Template::parse(REPORT_TEMPLATE).unwrap();
        assert_eq!(
            report.placeholders().collect::<Vec<_>>(),
            ["style", "logo", "recommendations", "data", "script"]
        );
        let data = Template::parse(DATA_TEMPLATE).unwrap();
        assert_eq!(
            data.placeholders().collect::<Vec<_>>(),
            ["system-info", "trace-events", "process-stat", "analysis"]
        );
    }

    #[tokio::test]
    async fn test_static_bytes_are_chunked() {
        let content: &'static [u8] = Box::leak(vec![b'x'; CHUNK_SIZE * 2 + 1].into_boxed_slice());
        let chunks: Vec<Bytes> = static_bytes(content).try_collect().await.unwrap();
        assert_eq!(
            chunks.iter().map(Bytes::len).collect::<Vec<_>>(),
            [CHUNK_SIZE, CHUNK_SIZE, 1]
        );
    }

    #[tokio::test]
    async fn test_script_override() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SCRIPT_FILE_NAME), "console.log(1)").unwrap();

        assert_eq!(collect(script(Some(dir.path()))).await.unwrap(), b"console.log(1)");
        assert_eq!(collect(script(None)).await.unwrap(), SCRIPT.as_bytes());
    }

    #[tokio::test]
    async fn test_missing_script_override_fails_when_read() {
        let dir = TempDir::new().unwrap();
        let err = collect(script(Some(dir.path()))).await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to open"), "{err}");
    }

    #[tokio::test]
    async fn test_recommendations_cover_every_category() {
        let html = String::from_utf8(collect(recommendations()).await.unwrap()).unwrap();
        for category in IssueCategory::ALL {
            assert!(html.contains(&format!("data-category=\"{}\"", category.as_str())));
        }
    }
}
