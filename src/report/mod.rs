//! Streaming report assembly.
//!
//! A report is two documents built by the same [`Pipeline`]: a JSON data document made of the
//! decoded captures and the analysis, and the HTML presentation document it is embedded in.
//! Both are produced lazily and written straight to disk, whatever the size of the capture.

mod assets;
mod pipeline;
mod serialize;
mod sink;
mod template;

use crate::analysis::{Analysis, ThresholdAnalysis};
use crate::decode::{process_stats, read_system_info, trace_events};
use crate::error::DoctorError;
use crate::logging_paths::LoggingPaths;
use crate::prelude::*;
use futures::{StreamExt, future, stream};
use std::path::{Path, PathBuf};

pub use assets::{DATA_TEMPLATE, REPORT_TEMPLATE, SCRIPT_FILE_NAME};
pub use pipeline::{ByteStream, Pipeline};
pub use serialize::{json_array, serialize_record};
pub use sink::{partial_path, write_document};
pub use template::{Segment, Template};

#[derive(Debug, Clone, Default)]
pub struct VisualizeOptions {
    /// Directory holding a `doctor.js` that replaces the bundled client script
    pub assets_dir: Option<PathBuf>,
}

/// Default report location for a capture: `<root>.html`, next to the capture directory.
pub fn default_output(capture_dir: &Path) -> PathBuf {
    let mut name = capture_dir
        .file_name()
        .unwrap_or(capture_dir.as_os_str())
        .to_os_string();
    name.push(".html");
    capture_dir.with_file_name(name)
}

/// The data document of a capture, with each decoder opened once for the document itself
/// and once more for the analysis.
pub fn data_document(
    paths: &LoggingPaths,
    analysis: &dyn Analysis,
    system_info: ByteStream,
) -> Result<ByteStream, DoctorError> {
    let template = Template::parse(DATA_TEMPLATE)?;
    let results = analysis.analyze(
        trace_events(paths.trace_event.clone()),
        process_stats(paths.process_stat.clone()),
    );

    Pipeline::new()
        .source("system-info", system_info)
        .records("trace-events", trace_events(paths.trace_event.clone()))
        .records("process-stat", process_stats(paths.process_stat.clone()))
        .records("analysis", results)
        .assemble(&template)
}

/// The self-contained HTML report, embedding `data`.
pub fn presentation_document(
    data: ByteStream,
    options: &VisualizeOptions,
) -> Result<ByteStream, DoctorError> {
    let template = Template::parse(REPORT_TEMPLATE)?;

    Pipeline::new()
        .source("style", assets::style())
        .source("logo", assets::logo())
        .source("recommendations", assets::recommendations())
        .source("data", data)
        .source("script", assets::script(options.assets_dir.as_deref()))
        .assemble(&template)
}

/// Builds the report of the capture in `capture_dir` and writes it to `output`.
///
/// Resolves only once the report is complete on disk. A read failure on any capture file
/// fails the whole call with a single [`DoctorError::StreamFailure`] and leaves no file at
/// `output`.
pub async fn visualize(capture_dir: &Path, output: &Path, options: &VisualizeOptions) -> Result<()> {
    let paths = LoggingPaths::for_directory(capture_dir)?;
    debug!("Reading the capture in {}", paths.root.display());

    let system_info = read_system_info(&paths.system_info)
        .await
        .map_err(DoctorError::StreamFailure)?;
    let analysis = ThresholdAnalysis::new(&system_info);
    let system_info = serialize_record(&system_info, false).map_err(DoctorError::StreamFailure)?;
    let system_info = stream::once(future::ready(Ok(system_info))).boxed();

    let data = data_document(&paths, &analysis, system_info)?;
    let document = presentation_document(data, options)?;

    write_document(document, output).await?;
    info!("Report written to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output() {
        assert_eq!(
            default_output(Path::new("/tmp/42.perf-doctor")),
            PathBuf::from("/tmp/42.perf-doctor.html")
        );
        assert_eq!(
            default_output(Path::new("captures/42.perf-doctor/")),
            PathBuf::from("captures/42.perf-doctor.html")
        );
    }
}
