use crate::prelude::*;
use bytes::BytesMut;
use doctor_shared::records::TraceEvent;
use futures::StreamExt;
use futures::stream;
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use super::RecordStream;

const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Splits a trace log into the raw bytes of each event object, without parsing the envelope.
///
/// Accepts both `{"traceEvents":[{..},{..}]}` and a bare `[{..},{..}]`, whatever the line
/// layout. In the envelope, only the objects of the `traceEvents` array are events. Only the
/// event currently being read is buffered.
#[derive(Default)]
pub struct TraceEventSplitter {
    /// Currently open brackets
    stack: Vec<u8>,
    /// Nesting depth at which event objects open, known once the first bracket is seen
    event_depth: Option<usize>,
    in_string: bool,
    escaped: bool,
    /// Last string read directly inside the envelope object
    key: Vec<u8>,
    /// Whether the envelope array being read is `traceEvents`
    in_events: bool,
    current: Vec<u8>,
}

impl TraceEventSplitter {
    fn capturing(&self) -> bool {
        !self.current.is_empty()
    }

    fn in_envelope(&self) -> bool {
        self.stack == [b'{']
    }

    /// Feeds one byte, returns the bytes of an event once its closing brace is read.
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8>> {
        if self.in_string {
            if self.capturing() {
                self.current.push(byte);
            }
            let closes = !self.escaped && byte == b'"';
            if !closes && self.in_envelope() {
                self.key.push(byte);
            }
            if self.escaped {
                self.escaped = false;
            } else if byte == b'\\' {
                self.escaped = true;
            } else if byte == b'"' {
                self.in_string = false;
            }
            return None;
        }

        match byte {
            b'{' | b'[' => {
                let event_depth = *self
                    .event_depth
                    .get_or_insert(if byte == b'{' { 2 } else { 1 });
                if byte == b'[' && self.in_envelope() {
                    self.in_events = self.key == b"traceEvents";
                }
                let opens_event = byte == b'{'
                    && self.stack.len() == event_depth
                    && self.stack.last() == Some(&b'[')
                    && (event_depth == 1 || self.in_events);
                if self.capturing() || opens_event {
                    self.current.push(byte);
                }
                self.stack.push(byte);
                None
            }
            b'}' | b']' => {
                self.stack.pop();
                if !self.capturing() {
                    return None;
                }
                self.current.push(byte);
                (Some(self.stack.len()) == self.event_depth)
                    .then(|| std::mem::take(&mut self.current))
            }
            _ => {
                if byte == b'"' {
                    self.in_string = true;
                    if self.in_envelope() {
                        self.key.clear();
                    }
                }
                if self.capturing() {
                    self.current.push(byte);
                }
                None
            }
        }
    }

    /// Whether the input ended in the middle of an event.
    pub fn is_truncated(&self) -> bool {
        self.capturing()
    }
}

struct TraceEventReader {
    path: PathBuf,
    file: Option<File>,
    splitter: TraceEventSplitter,
    pending: VecDeque<Vec<u8>>,
    buffer: BytesMut,
    index: usize,
    done: bool,
}

impl TraceEventReader {
    fn decode(&mut self, raw: &[u8]) -> Result<TraceEvent> {
        self.index += 1;
        serde_json::from_slice(raw).with_context(|| {
            format!(
                "{}: invalid trace event #{}",
                self.path.display(),
                self.index
            )
        })
    }

    async fn next_event(mut self) -> Result<Option<(TraceEvent, Self)>> {
        loop {
            if let Some(raw) = self.pending.pop_front() {
                let event = self.decode(&raw)?;
                return Ok(Some((event, self)));
            }
            if self.done {
                return Ok(None);
            }

            let mut file = match self.file.take() {
                Some(file) => file,
                None => File::open(&self.path)
                    .await
                    .with_context(|| format!("Failed to open {}", self.path.display()))?,
            };

            self.buffer.clear();
            self.buffer.reserve(READ_CHUNK_SIZE);
            let read = file
                .read_buf(&mut self.buffer)
                .await
                .with_context(|| format!("Failed to read {}", self.path.display()))?;
            self.file = Some(file);
            if read == 0 {
                self.done = true;
                if self.splitter.is_truncated() {
                    bail!("{}: truncated trace event", self.path.display());
                }
                continue;
            }

            for &byte in self.buffer.iter() {
                if let Some(raw) = self.splitter.push(byte) {
                    self.pending.push_back(raw);
                }
            }
        }
    }
}

/// Trace events of a captured trace log, in file order.
pub fn trace_events(path: PathBuf) -> RecordStream<TraceEvent> {
    let reader = TraceEventReader {
        path,
        file: None,
        splitter: TraceEventSplitter::default(),
        pending: VecDeque::new(),
        buffer: BytesMut::with_capacity(READ_CHUNK_SIZE),
        index: 0,
        done: false,
    };

    stream::try_unfold(reader, TraceEventReader::next_event).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use rstest::rstest;
    use tempfile::TempDir;

    fn split(input: &str) -> Vec<String> {
        let mut splitter = TraceEventSplitter::default();
        input
            .bytes()
            .filter_map(|byte| splitter.push(byte))
            .map(|raw| String::from_utf8(raw).unwrap())
            .collect()
    }

    #[rstest]
    #[case::envelope_one_line(r#"{"traceEvents":[{"a":1},{"b":2}]}"#)]
    #[case::envelope_per_line("{\"traceEvents\":[\n{\"a\":1},\n{\"b\":2}\n]}\n")]
    #[case::bare_array("[ {\"a\":1} , {\"b\":2} ]")]
    fn test_split_layouts(#[case] input: &str) {
        assert_eq!(split(input), vec![r#"{"a":1}"#, r#"{"b":2}"#]);
    }

    #[test]
    fn test_split_ignores_brackets_in_strings_and_nested_values() {
        let input = r#"{"traceEvents":[{"name":"}{[\"]","args":{"x":[1,{"y":2}]}}],"metadata":{"z":{}}}"#;
        assert_eq!(
            split(input),
            vec![r#"{"name":"}{[\"]","args":{"x":[1,{"y":2}]}}"#]
        );
    }

    #[test]
    fn test_split_only_reads_the_trace_events_array() {
        let input = r#"{"meta":[{"m":0}],"traceEvents":[{"a":1},{"b":2}],"other":[{"c":3}]}"#;
        assert_eq!(split(input), vec![r#"{"a":1}"#, r#"{"b":2}"#]);
    }

    #[tokio::test]
    async fn test_trace_events_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("1.perf-doctor-traceevent");
        std::fs::write(
            &path,
            "{\"traceEvents\":[\n\
             {\"pid\":1,\"tid\":1,\"ts\":100,\"ph\":\"X\",\"cat\":\"v8\",\"name\":\"V8.GCScavenger\",\"dur\":40},\n\
             {\"pid\":1,\"tid\":1,\"ts\":200,\"ph\":\"i\",\"cat\":\"node\",\"name\":\"mark\"}\n\
             ]}",
        )
        .unwrap();

        let events: Vec<_> = trace_events(path).try_collect().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].ts, 100);
        assert!(events[0].is_gc());
        assert_eq!(events[1].name, "mark");
    }

    #[tokio::test]
    async fn test_truncated_trace_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("1.perf-doctor-traceevent");
        std::fs::write(&path, r#"{"traceEvents":[{"name":"a","ph":"i","ts":1},{"name":"#).unwrap();

        let mut events = trace_events(path);
        assert_eq!(events.try_next().await.unwrap().unwrap().name, "a");
        let err = events.try_next().await.unwrap_err();
        assert!(format!("{err}").ends_with("truncated trace event"), "{err}");
    }
}
