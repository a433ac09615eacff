//! JSON-RPC 1.0 framing: line-delimited JSON objects with `method`,
//! `params`, `id`, `result`, and `error` fields.
//!
//! JSON-RPC peers may use arbitrary JSON values as request ids while the
//! endpoint works in `u64` sequence numbers. Inbound ids are therefore
//! remapped: `read_header` assigns the next internal seq and parks the
//! original id in a codec-local map; `write_response` restores it. The map
//! is shared between the two codec halves and is invisible to the endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};

use crate::body::{Body, BodyFormat};
use crate::codec::{Codec, CodecRead, CodecWrite, InboundHeader, NOTIFY_SEQ};
use crate::error::{CodecError, WireError};

/// Codec-local translation of inbound wire ids to internal seqs.
#[derive(Debug, Default)]
pub(crate) struct InboundIds {
    seq: u64,
    pending: HashMap<u64, Value>,
}

impl InboundIds {
    /// Assign the next internal seq and park the original wire id.
    pub(crate) fn intern(&mut self, id: Value) -> u64 {
        self.seq += 1;
        self.pending.insert(self.seq, id);
        self.seq
    }

    /// Take back the wire id for a response being written.
    pub(crate) fn release(&mut self, seq: u64) -> Option<Value> {
        self.pending.remove(&seq)
    }
}

/// One decoded wire message; request and response fields combined, exactly
/// as they appear on the wire. JSON `null` and an absent field both decode
/// to `None`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawMessage {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// Read one line and parse it as a message. Blank lines are skipped.
pub(crate) async fn read_message<R>(
    lines: &mut BufReader<R>,
    scratch: &mut String,
) -> Result<RawMessage, CodecError>
where
    R: AsyncRead + Unpin,
{
    loop {
        scratch.clear();
        let n = lines.read_line(scratch).await.map_err(CodecError::Io)?;
        if n == 0 {
            return Err(CodecError::Closed);
        }
        let line = scratch.trim();
        if line.is_empty() {
            continue;
        }
        return serde_json::from_str(line)
            .map_err(|e| CodecError::Malformed(format!("invalid json frame: {e}")));
    }
}

/// Classify a message: a non-empty `method` means request, otherwise an id
/// means response, otherwise the frame is malformed.
pub(crate) enum Classified {
    Request { method: String, params: Option<Value>, id: Option<Value> },
    Response { seq: u64, result: Option<Value>, error: Option<Value> },
}

pub(crate) fn classify(msg: RawMessage) -> Result<Classified, CodecError> {
    match msg.method {
        Some(method) if !method.is_empty() => Ok(Classified::Request {
            method,
            params: msg.params,
            id: msg.id,
        }),
        _ => match msg.id {
            Some(id) => {
                let seq = id.as_u64().ok_or_else(|| {
                    CodecError::Malformed(format!("non-numeric response id: {id}"))
                })?;
                Ok(Classified::Response {
                    seq,
                    result: msg.result,
                    error: msg.error,
                })
            }
            None => Err(CodecError::Malformed(
                "message has neither method nor id".into(),
            )),
        },
    }
}

/// JSON-RPC 1.0 codec over any full-duplex byte stream.
pub struct JsonRpcCodec<S> {
    stream: S,
}

impl<S> JsonRpcCodec<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

impl JsonRpcCodec<tokio::io::DuplexStream> {
    /// An in-process connected pair, for tests and examples.
    pub fn pair() -> (Self, Self) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (Self::new(a), Self::new(b))
    }
}

impl<S> Codec for JsonRpcCodec<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    type Reader = JsonRpcReader<ReadHalf<S>>;
    type Writer = JsonRpcWriter<WriteHalf<S>>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        let (r, w) = tokio::io::split(self.stream);
        let ids = Arc::new(Mutex::new(InboundIds::default()));
        (
            JsonRpcReader {
                lines: BufReader::new(r),
                scratch: String::new(),
                ids: ids.clone(),
                request_params: None,
                response_result: None,
            },
            JsonRpcWriter { writer: w, ids },
        )
    }
}

pub struct JsonRpcReader<R> {
    lines: BufReader<R>,
    scratch: String,
    ids: Arc<Mutex<InboundIds>>,
    request_params: Option<Value>,
    response_result: Option<Value>,
}

impl<R> CodecRead for JsonRpcReader<R>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    async fn read_header(&mut self) -> Result<InboundHeader, CodecError> {
        let msg = read_message(&mut self.lines, &mut self.scratch).await?;
        match classify(msg)? {
            Classified::Request { method, params, id } => {
                let seq = match id {
                    None => NOTIFY_SEQ,
                    Some(id) => self.ids.lock().intern(id),
                };
                self.request_params = params;
                Ok(InboundHeader::Request { method, seq })
            }
            Classified::Response { seq, result, error } => {
                let error = match error {
                    Some(value) => {
                        let text = value.as_str().ok_or_else(|| {
                            CodecError::Malformed(format!("invalid error {value}"))
                        })?;
                        let text = if text.is_empty() {
                            "unspecified error"
                        } else {
                            text
                        };
                        Some(WireError::from_message(text))
                    }
                    None => None,
                };
                self.response_result = result;
                Ok(InboundHeader::Response { seq, error })
            }
        }
    }

    async fn read_request_body(&mut self) -> Result<Body, CodecError> {
        Ok(match self.request_params.take() {
            Some(params) => Body::Json(params),
            None => Body::Empty,
        })
    }

    async fn read_response_body(&mut self) -> Result<Body, CodecError> {
        Ok(match self.response_result.take() {
            Some(result) => Body::Json(result),
            None => Body::Empty,
        })
    }
}

#[derive(Serialize)]
struct OutboundRequest<'a> {
    method: &'a str,
    params: Value,
    /// `None` serializes as `"id": null`, the 1.0 notification form.
    id: Option<u64>,
}

#[derive(Serialize)]
struct OutboundResponse<'a> {
    id: &'a Value,
    result: Option<&'a Value>,
    error: Option<&'a str>,
}

/// Wrap a single argument into the positional `[arg]` form; arrays pass
/// through unchanged.
fn positional_params(body: &Body) -> Result<Value, CodecError> {
    match body {
        Body::Empty => Ok(Value::Array(Vec::new())),
        Body::Json(Value::Array(items)) => Ok(Value::Array(items.clone())),
        Body::Json(value) => Ok(Value::Array(vec![value.clone()])),
        Body::Binary(_) => Err(CodecError::Encode(
            "binary body on a JSON codec".into(),
        )),
    }
}

pub(crate) async fn write_line<W>(writer: &mut W, msg: &impl Serialize) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(msg).map_err(|e| CodecError::Encode(e.to_string()))?;
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(CodecError::Io)?;
    writer.flush().await.map_err(CodecError::Io)
}

pub struct JsonRpcWriter<W> {
    writer: W,
    ids: Arc<Mutex<InboundIds>>,
}

impl<W> CodecWrite for JsonRpcWriter<W>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    async fn write_request(&mut self, seq: u64, method: &str, body: &Body) -> Result<(), CodecError> {
        let msg = OutboundRequest {
            method,
            params: positional_params(body)?,
            id: if seq == NOTIFY_SEQ { None } else { Some(seq) },
        };
        write_line(&mut self.writer, &msg).await
    }

    async fn write_response(
        &mut self,
        seq: u64,
        error: Option<&WireError>,
        body: &Body,
    ) -> Result<(), CodecError> {
        let id = self
            .ids
            .lock()
            .release(seq)
            .ok_or(CodecError::InvalidSeq(seq))?;
        let result = match (error, body) {
            (Some(_), _) | (None, Body::Empty) => None,
            (None, Body::Json(value)) => Some(value),
            (None, Body::Binary(_)) => {
                return Err(CodecError::Encode("binary body on a JSON codec".into()))
            }
        };
        let msg = OutboundResponse {
            id: &id,
            result,
            error: error.map(WireError::wire_message),
        };
        write_line(&mut self.writer, &msg).await
    }

    async fn close(&mut self) -> Result<(), CodecError> {
        self.writer.shutdown().await.map_err(CodecError::Io)
    }

    fn body_format(&self) -> BodyFormat {
        BodyFormat::Json
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    type FarRead = BufReader<ReadHalf<tokio::io::DuplexStream>>;
    type FarWrite = WriteHalf<tokio::io::DuplexStream>;

    /// A codec's two halves plus raw access to the far side of the wire.
    fn wired() -> (
        JsonRpcReader<ReadHalf<tokio::io::DuplexStream>>,
        JsonRpcWriter<WriteHalf<tokio::io::DuplexStream>>,
        FarRead,
        FarWrite,
    ) {
        let (near, far) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = JsonRpcCodec::new(near).split();
        let (far_read, far_write) = tokio::io::split(far);
        (reader, writer, BufReader::new(far_read), far_write)
    }

    async fn send_line(half: &mut FarWrite, line: &str) {
        half.write_all(line.as_bytes()).await.unwrap();
        half.write_all(b"\n").await.unwrap();
    }

    async fn recv_line(lines: &mut FarRead) -> Value {
        let mut line = String::new();
        lines.read_line(&mut line).await.unwrap();
        serde_json::from_str(&line).unwrap()
    }

    #[tokio::test]
    async fn inbound_ids_are_remapped_and_restored() {
        let (mut reader, mut writer, mut far_lines, mut far_write) = wired();

        send_line(
            &mut far_write,
            r#"{"method":"sum","params":[1,2],"id":"abc-42"}"#,
        )
        .await;

        let seq = match reader.read_header().await.unwrap() {
            InboundHeader::Request { ref method, seq } => {
                assert_eq!(method, "sum");
                assert_eq!(seq, 1);
                seq
            }
            other => panic!("expected request, got {other:?}"),
        };
        let args: (i64, i64) = reader.read_request_body().await.unwrap().decode().unwrap();
        assert_eq!(args, (1, 2));

        writer
            .write_response(seq, None, &Body::Json(json!(3)))
            .await
            .unwrap();

        let reply = recv_line(&mut far_lines).await;
        assert_eq!(reply["id"], json!("abc-42"));
        assert_eq!(reply["result"], json!(3));
        assert_eq!(reply["error"], Value::Null);
    }

    #[tokio::test]
    async fn response_to_unknown_seq_is_rejected_by_writer() {
        let (_reader, mut writer, _far_lines, _far_write) = wired();
        let err = writer
            .write_response(99, None, &Body::Json(json!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidSeq(99)));
    }

    #[tokio::test]
    async fn notification_id_is_null() {
        let (_reader, mut writer, mut far_lines, _far_write) = wired();

        writer
            .write_request(NOTIFY_SEQ, "log", &Body::Json(json!({"level": "info"})))
            .await
            .unwrap();

        let msg = recv_line(&mut far_lines).await;
        assert_eq!(msg["id"], Value::Null);
        assert_eq!(msg["params"], json!([{"level": "info"}]));
    }

    #[tokio::test]
    async fn arrays_pass_through_unwrapped() {
        let (_reader, mut writer, mut far_lines, _far_write) = wired();

        writer
            .write_request(5, "sum", &Body::Json(json!([1, 2, 3])))
            .await
            .unwrap();

        let msg = recv_line(&mut far_lines).await;
        assert_eq!(msg["params"], json!([1, 2, 3]));
        assert_eq!(msg["id"], json!(5));
    }

    #[tokio::test]
    async fn null_result_with_null_error_is_a_success() {
        let (mut reader, _writer, _far_lines, mut far_write) = wired();

        send_line(&mut far_write, r#"{"id":7,"result":null,"error":null}"#).await;

        match reader.read_header().await.unwrap() {
            InboundHeader::Response { seq, error } => {
                assert_eq!(seq, 7);
                assert!(error.is_none());
            }
            other => panic!("expected response, got {other:?}"),
        }
        assert!(reader.read_response_body().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_error_string_is_coerced() {
        let (mut reader, _writer, _far_lines, mut far_write) = wired();

        send_line(&mut far_write, r#"{"id":7,"result":null,"error":""}"#).await;

        match reader.read_header().await.unwrap() {
            InboundHeader::Response { error, .. } => {
                assert_eq!(error.unwrap().message, "unspecified error");
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn frame_with_neither_method_nor_id_is_malformed() {
        let (mut reader, _writer, _far_lines, mut far_write) = wired();

        send_line(&mut far_write, r#"{"result":42}"#).await;

        match reader.read_header().await {
            Err(CodecError::Malformed(_)) => {}
            other => panic!("expected Malformed, got {other:?}"),
        }
    }
}
