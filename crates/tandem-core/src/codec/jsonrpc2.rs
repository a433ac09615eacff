//! JSON-RPC 2.0 framing.
//!
//! Same line-delimited shape as the 1.0 codec, with three differences:
//! every message carries `"jsonrpc": "2.0"`, params may be a named object
//! as well as a positional array, and errors are structured
//! `{code, message, data?}` objects instead of bare strings. Notifications
//! omit the id field entirely.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};

use crate::body::{Body, BodyFormat};
use crate::codec::jsonrpc::{classify, read_message, write_line, Classified, InboundIds};
use crate::codec::{Codec, CodecRead, CodecWrite, InboundHeader, NOTIFY_SEQ};
use crate::error::{CodecError, WireError};

const VERSION: &str = "2.0";

/// JSON-RPC 2.0 codec over any full-duplex byte stream.
pub struct JsonRpc2Codec<S> {
    stream: S,
}

impl<S> JsonRpc2Codec<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

impl JsonRpc2Codec<tokio::io::DuplexStream> {
    /// An in-process connected pair, for tests and examples.
    pub fn pair() -> (Self, Self) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (Self::new(a), Self::new(b))
    }
}

impl<S> Codec for JsonRpc2Codec<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    type Reader = JsonRpc2Reader<ReadHalf<S>>;
    type Writer = JsonRpc2Writer<WriteHalf<S>>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        let (r, w) = tokio::io::split(self.stream);
        let ids = Arc::new(Mutex::new(InboundIds::default()));
        (
            JsonRpc2Reader {
                lines: BufReader::new(r),
                scratch: String::new(),
                ids: ids.clone(),
                request_params: None,
                response_result: None,
            },
            JsonRpc2Writer { writer: w, ids },
        )
    }
}

pub struct JsonRpc2Reader<R> {
    lines: BufReader<R>,
    scratch: String,
    ids: Arc<Mutex<InboundIds>>,
    request_params: Option<Value>,
    response_result: Option<Value>,
}

impl<R> CodecRead for JsonRpc2Reader<R>
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
                let error = if let Some(value) = error {
                    let parsed: WireError = serde_json::from_value(value.clone()).map_err(|e| {
                        CodecError::Malformed(format!("invalid error object {value}: {e}"))
                    })?;
                    tracing::debug!(seq, code = parsed.code, message = %parsed.message, "inbound error response");
                    Some(parsed)
                } else if result.is_none() {
                    // Neither outcome present; surface the zero-value error.
                    Some(WireError::new(0, ""))
                } else {
                    None
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
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    /// Omitted entirely for notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
}

#[derive(Serialize)]
struct OutboundResponse<'a> {
    jsonrpc: &'static str,
    id: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a WireError>,
}

/// Positional arrays pass through; everything else is named params,
/// handed over as-is.
fn params_value(body: &Body) -> Result<Value, CodecError> {
    match body {
        Body::Empty => Ok(Value::Null),
        Body::Json(value) => Ok(value.clone()),
        Body::Binary(_) => Err(CodecError::Encode("binary body on a JSON codec".into())),
    }
}

pub struct JsonRpc2Writer<W> {
    writer: W,
    ids: Arc<Mutex<InboundIds>>,
}

impl<W> CodecWrite for JsonRpc2Writer<W>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    async fn write_request(&mut self, seq: u64, method: &str, body: &Body) -> Result<(), CodecError> {
        let msg = OutboundRequest {
            jsonrpc: VERSION,
            method,
            params: params_value(body)?,
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
        let null = Value::Null;
        let result = match (error, body) {
            (Some(_), _) => None,
            (None, Body::Json(value)) => Some(value),
            (None, Body::Empty) => Some(&null),
            (None, Body::Binary(_)) => {
                return Err(CodecError::Encode("binary body on a JSON codec".into()))
            }
        };
        let msg = OutboundResponse {
            jsonrpc: VERSION,
            id: &id,
            result,
            error,
        };
        write_line(&mut self.writer, &msg).await
    }

    async fn close(&mut self) -> Result<(), CodecError> {
        self.writer.shutdown().await.map_err(CodecError::Io)
    }

    fn body_format(&self) -> BodyFormat {
        BodyFormat::Json
    }

    fn is_v2(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::AsyncBufReadExt;

    type FarRead = BufReader<ReadHalf<tokio::io::DuplexStream>>;
    type FarWrite = WriteHalf<tokio::io::DuplexStream>;

    fn wired() -> (
        JsonRpc2Reader<ReadHalf<tokio::io::DuplexStream>>,
        JsonRpc2Writer<WriteHalf<tokio::io::DuplexStream>>,
        FarRead,
        FarWrite,
    ) {
        let (near, far) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = JsonRpc2Codec::new(near).split();
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
    async fn string_id_is_preserved_byte_exact() {
        let (mut reader, mut writer, mut far_lines, mut far_write) = wired();

        send_line(
            &mut far_write,
            r#"{"jsonrpc":"2.0","method":"whoami","id":"abc-42"}"#,
        )
        .await;

        let seq = match reader.read_header().await.unwrap() {
            InboundHeader::Request { seq, .. } => seq,
            other => panic!("expected request, got {other:?}"),
        };
        assert!(reader.read_request_body().await.unwrap().is_empty());

        writer
            .write_response(seq, None, &Body::Json(json!("peer")))
            .await
            .unwrap();

        let reply = recv_line(&mut far_lines).await;
        assert_eq!(reply["id"], json!("abc-42"));
        assert_eq!(reply["jsonrpc"], json!("2.0"));
        assert_eq!(reply["result"], json!("peer"));
        assert!(reply.get("error").is_none());
    }

    #[tokio::test]
    async fn named_params_pass_through() {
        let (_reader, mut writer, mut far_lines, _far_write) = wired();

        writer
            .write_request(3, "move", &Body::Json(json!({"x": 1, "y": 2})))
            .await
            .unwrap();

        let msg = recv_line(&mut far_lines).await;
        assert_eq!(msg["params"], json!({"x": 1, "y": 2}));
        assert_eq!(msg["id"], json!(3));
        assert_eq!(msg["jsonrpc"], json!("2.0"));
    }

    #[tokio::test]
    async fn notification_omits_id() {
        let (_reader, mut writer, mut far_lines, _far_write) = wired();

        writer
            .write_request(NOTIFY_SEQ, "log", &Body::Json(json!(["hello"])))
            .await
            .unwrap();

        let msg = recv_line(&mut far_lines).await;
        assert!(msg.get("id").is_none());
        assert_eq!(msg["params"], json!(["hello"]));
    }

    #[tokio::test]
    async fn structured_errors_roundtrip() {
        let (mut reader, mut writer, mut far_lines, mut far_write) = wired();

        // Inbound request, answered with a structured error.
        send_line(
            &mut far_write,
            r#"{"jsonrpc":"2.0","method":"explode","id":9}"#,
        )
        .await;
        let seq = match reader.read_header().await.unwrap() {
            InboundHeader::Request { seq, .. } => seq,
            other => panic!("expected request, got {other:?}"),
        };
        reader.read_request_body().await.unwrap();

        let err = WireError {
            code: -32001,
            message: "boom".into(),
            data: Some(json!({"detail": "fuse"})),
        };
        writer
            .write_response(seq, Some(&err), &Body::Empty)
            .await
            .unwrap();

        let reply = recv_line(&mut far_lines).await;
        assert_eq!(reply["error"]["code"], json!(-32001));
        assert_eq!(reply["error"]["message"], json!("boom"));
        assert_eq!(reply["error"]["data"]["detail"], json!("fuse"));
        assert!(reply.get("result").is_none());

        // Inbound error response parses back into the structured form.
        send_line(
            &mut far_write,
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"nope"}}"#,
        )
        .await;
        match reader.read_header().await.unwrap() {
            InboundHeader::Response { seq, error } => {
                assert_eq!(seq, 1);
                let error = error.unwrap();
                assert_eq!(error.code, -32601);
                assert_eq!(error.message, "nope");
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_result_and_error_surface_the_zero_error() {
        let (mut reader, _writer, _far_lines, mut far_write) = wired();

        send_line(&mut far_write, r#"{"jsonrpc":"2.0","id":4}"#).await;

        match reader.read_header().await.unwrap() {
            InboundHeader::Response { error, .. } => {
                let error = error.unwrap();
                assert_eq!(error.code, 0);
                assert_eq!(error.message, "");
            }
            other => panic!("expected response, got {other:?}"),
        }
    }
}
