use super::serialize::json_array;
use super::template::{Segment, Template};
use crate::decode::RecordStream;
use crate::error::DoctorError;
use crate::prelude::*;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, future, stream};
use serde::Serialize;
use std::collections::HashMap;

/// A lazy byte stream, the unit every pipeline stage consumes and produces.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Named sources substituted into a [`Template`] to produce a single byte stream.
///
/// The assembled stream is pull based: a chunk is only read from a source when the consumer
/// asks for the next one, so a slow destination slows every source down and nothing is
/// buffered beyond the chunk in flight. Sources are read one after the other, in template
/// order, and the stream ends right after the first error.
#[derive(Default)]
pub struct Pipeline {
    sources: Vec<(String, ByteStream)>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source whose bytes are substituted verbatim.
    pub fn source(mut self, name: impl Into<String>, stream: ByteStream) -> Self {
        self.sources.push((name.into(), stream));
        self
    }

    /// Adds a record source, serialized as a JSON array.
    pub fn records<T>(self, name: impl Into<String>, records: RecordStream<T>) -> Self
    where
        T: Serialize + Send + 'static,
    {
        self.source(name, json_array(records))
    }

    pub fn assemble(self, template: &Template) -> Result<ByteStream, DoctorError> {
        let mut sources = HashMap::with_capacity(self.sources.len());
        for (name, stream) in self.sources {
            if sources.insert(name.clone(), stream).is_some() {
                return Err(DoctorError::InvalidArgument(format!(
                    "source `{name}` is defined more than once"
                )));
            }
        }

        let mut parts: Vec<ByteStream> = Vec::with_capacity(template.segments().len());
        for segment in template.segments() {
            match segment {
                Segment::Literal(text) => {
                    parts.push(stream::once(future::ready(Ok(text.clone()))).boxed())
                }
                Segment::Placeholder(name) => {
                    let stream = sources.remove(name).ok_or_else(|| {
                        DoctorError::InvalidArgument(format!(
                            "no source for placeholder `{name}`, or it is used more than once"
                        ))
                    })?;
                    parts.push(stream);
                }
            }
        }

        for name in sources.keys() {
            debug!("Source `{name}` is not referenced by the template, dropping it");
        }

        let mut failed = false;
        Ok(stream::iter(parts)
            .flatten()
            .take_while(move |chunk| {
                let forward = !failed;
                failed |= chunk.is_err();
                future::ready(forward)
            })
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use futures::TryStreamExt;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bytes(chunks: &[&'static str]) -> ByteStream {
        stream::iter(chunks.to_vec())
            .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
            .boxed()
    }

    async fn collect(stream: ByteStream) -> Result<String> {
        let chunks: Vec<Bytes> = stream.try_collect().await?;
        Ok(String::from_utf8(chunks.concat())?)
    }

    #[tokio::test]
    async fn test_literal_only_template_ignores_empty_sources() {
        let template = Template::parse("<html>static</html>").unwrap();
        let empty = || stream::empty::<Result<serde_json::Value>>().boxed();
        let document = Pipeline::new()
            .records("trace-events", empty())
            .records("process-stat", empty())
            .records("analysis", empty())
            .assemble(&template)
            .unwrap();

        assert_eq!(collect(document).await.unwrap(), "<html>static</html>");
    }

    #[tokio::test]
    async fn test_sources_fill_their_slots_in_order() {
        let template = Template::parse(r#"{"a":{{a}},"b":{{b}},"s":"{{s}}"}"#).unwrap();
        let document = Pipeline::new()
            .source("s", bytes(&["x", "y", "z"]))
            .records("b", stream::iter([Ok(json!(3)), Ok(json!(4))]).boxed())
            .records("a", stream::iter([Ok(json!(1)), Ok(json!(2))]).boxed())
            .assemble(&template)
            .unwrap();

        insta::assert_snapshot!(collect(document).await.unwrap(), @r#"{"a":[1,2],"b":[3,4],"s":"xyz"}"#);
    }

    #[tokio::test]
    async fn test_nested_documents() {
        let inner = Pipeline::new()
            .source("value", bytes(&["42"]))
            .assemble(&Template::parse(r#"{"v":{{value}}}"#).unwrap())
            .unwrap();
        let outer = Pipeline::new()
            .source("data", inner)
            .assemble(&Template::parse("<script>{{data}}</script>").unwrap())
            .unwrap();

        assert_eq!(collect(outer).await.unwrap(), r#"<script>{"v":42}</script>"#);
    }

    #[test]
    fn test_missing_and_repeated_placeholders() {
        let err = Pipeline::new()
            .assemble(&Template::parse("{{missing}}").unwrap())
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = Pipeline::new()
            .source("twice", bytes(&["x"]))
            .assemble(&Template::parse("{{twice}}{{twice}}").unwrap())
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_sources_are_pulled_on_demand() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let lazy = stream::iter(0..1000)
            .map(move |i| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!(i))
            })
            .boxed();

        let mut document = Pipeline::new()
            .records("numbers", lazy)
            .assemble(&Template::parse("{{numbers}}").unwrap())
            .unwrap();

        // "[" then the first two records
        for _ in 0..3 {
            document.try_next().await.unwrap();
        }
        assert_eq!(pulled.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stream_ends_after_first_error() {
        let failing = stream::iter(vec![
            Ok(Bytes::from_static(b"ok")),
            Err(anyhow!("read failed")),
            Ok(Bytes::from_static(b"never")),
        ])
        .boxed();
        let items: Vec<Result<Bytes>> = Pipeline::new()
            .source("failing", failing)
            .assemble(&Template::parse("<{{failing}}>").unwrap())
            .unwrap()
            .collect()
            .await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[2].as_ref().unwrap_err().to_string(), "read failed");
    }
}
