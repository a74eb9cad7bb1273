use crate::prelude::*;
use futures::StreamExt;
use futures::stream;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

use super::RecordStream;

struct LineDecoder<F> {
    path: PathBuf,
    lines: Option<Lines<BufReader<File>>>,
    line_no: usize,
    decode: F,
}

impl<F> LineDecoder<F> {
    async fn next_record<T>(mut self) -> Result<Option<(T, Self)>>
    where
        F: FnMut(&str) -> Result<Option<T>>,
    {
        let mut lines = match self.lines.take() {
            Some(lines) => lines,
            None => {
                let file = File::open(&self.path)
                    .await
                    .with_context(|| format!("Failed to open {}", self.path.display()))?;
                BufReader::new(file).lines()
            }
        };

        loop {
            let Some(line) = lines
                .next_line()
                .await
                .with_context(|| format!("Failed to read {}", self.path.display()))?
            else {
                return Ok(None);
            };
            self.line_no += 1;

            let line_no = self.line_no;
            let record = (self.decode)(&line)
                .with_context(|| format!("{}:{line_no}: invalid record", self.path.display()))?;
            if let Some(record) = record {
                self.lines = Some(lines);
                return Ok(Some((record, self)));
            }
        }
    }
}

/// Decodes `path` one line at a time. `decode` returns `Ok(None)` for lines carrying no record.
pub fn decode_lines<T, F>(path: PathBuf, decode: F) -> RecordStream<T>
where
    T: Send + 'static,
    F: FnMut(&str) -> Result<Option<T>> + Send + 'static,
{
    let decoder = LineDecoder {
        path,
        lines: None,
        line_no: 0,
        decode,
    };

    stream::try_unfold(decoder, LineDecoder::next_record).boxed()
}
