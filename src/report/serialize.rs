use super::ByteStream;
use crate::decode::RecordStream;
use crate::prelude::*;
use bytes::{BufMut, Bytes, BytesMut};
use futures::{StreamExt, future, stream};
use serde::Serialize;

const ESCAPED_LT: &[u8] = b"\\u003c";

/// Serializes one record as JSON, with a leading comma unless it opens the array.
///
/// `<` only ever appears inside JSON strings, so escaping it keeps the value intact while
/// making the output safe to embed in an HTML `<script>` element.
pub fn serialize_record<T: Serialize>(record: &T, leading_comma: bool) -> Result<Bytes> {
    let json = serde_json::to_vec(record).context("Failed to serialize record")?;

    let mut buffer = BytesMut::with_capacity(json.len() + 1);
    if leading_comma {
        buffer.put_u8(b',');
    }
    for byte in json {
        if byte == b'<' {
            buffer.put_slice(ESCAPED_LT);
        } else {
            buffer.put_u8(byte);
        }
    }
    Ok(buffer.freeze())
}

/// Turns a record stream into the bytes of a JSON array, one record per chunk.
///
/// Each record is serialized as soon as it is pulled, so the array is never held in memory.
pub fn json_array<T>(records: RecordStream<T>) -> ByteStream
where
    T: Serialize + Send + 'static,
{
    let open = stream::once(future::ready(Ok(Bytes::from_static(b"["))));
    let close = stream::once(future::ready(Ok(Bytes::from_static(b"]"))));
    let body = records
        .enumerate()
        .map(|(index, record)| serialize_record(&record?, index > 0));

    open.chain(body).chain(close).boxed()
}
