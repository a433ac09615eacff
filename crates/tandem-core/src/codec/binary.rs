//! Self-describing binary framing.
//!
//! Each frame is a CBOR header record `{method, seq, error}` followed by
//! one CBOR body item (CBOR null when there is no payload). An empty
//! `method` marks a response; a non-empty `error` string marks a failed
//! response. CBOR items are prefix-delimited, so no outer length prefix is
//! needed: the read half buffers socket bytes and peels off one complete
//! item at a time.

use bytes::{Buf, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::body::{Body, BodyFormat};
use crate::codec::{Codec, CodecRead, CodecWrite, InboundHeader};
use crate::error::{CodecError, WireError};

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Serialize, Deserialize)]
struct FrameHeader {
    method: String,
    seq: u64,
    error: String,
}

/// Binary codec over any full-duplex byte stream.
pub struct BinaryCodec<S> {
    stream: S,
}

impl<S> BinaryCodec<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

impl BinaryCodec<tokio::io::DuplexStream> {
    /// An in-process connected pair, for tests and examples.
    pub fn pair() -> (Self, Self) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (Self::new(a), Self::new(b))
    }
}

impl<S> Codec for BinaryCodec<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    type Reader = BinaryReader<ReadHalf<S>>;
    type Writer = BinaryWriter<WriteHalf<S>>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        let (r, w) = tokio::io::split(self.stream);
        (
            BinaryReader {
                reader: r,
                buf: BytesMut::with_capacity(READ_CHUNK),
                mid_frame: false,
            },
            BinaryWriter { writer: w },
        )
    }
}

pub struct BinaryReader<R> {
    reader: R,
    buf: BytesMut,
    /// Set between a header and its body item; EOF here is a torn frame.
    mid_frame: bool,
}

/// `std::io::Read` over a slice that remembers how far the decoder got.
struct SliceReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl std::io::Read for SliceReader<'_> {
    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        let n = out.len().min(self.data.len() - self.pos);
        out[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Try to decode one complete CBOR item from the front of `buf`.
///
/// `Ok(None)` means the buffer holds only a prefix of an item and more
/// bytes are needed.
fn try_decode<T: DeserializeOwned>(buf: &[u8]) -> Result<Option<(T, usize)>, CodecError> {
    let mut probe = SliceReader { data: buf, pos: 0 };
    match ciborium::de::from_reader(&mut probe) {
        Ok(value) => Ok(Some((value, probe.pos))),
        Err(ciborium::de::Error::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Ok(None)
        }
        Err(e) => Err(CodecError::Malformed(format!("invalid cbor item: {e}"))),
    }
}

impl<R> BinaryReader<R>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    async fn fill(&mut self) -> Result<(), CodecError> {
        let n = self
            .reader
            .read_buf(&mut self.buf)
            .await
            .map_err(CodecError::Io)?;
        if n == 0 {
            return Err(if self.buf.is_empty() && !self.mid_frame {
                CodecError::Closed
            } else {
                CodecError::Malformed("eof inside frame".into())
            });
        }
        Ok(())
    }

    async fn read_item<T: DeserializeOwned>(&mut self) -> Result<T, CodecError> {
        loop {
            if let Some((value, n)) = try_decode(&self.buf)? {
                self.buf.advance(n);
                return Ok(value);
            }
            self.fill().await?;
        }
    }

    /// Read one item, keeping its raw encoding instead of a parsed value.
    async fn read_raw_item(&mut self) -> Result<Bytes, CodecError> {
        loop {
            if let Some((_, n)) = try_decode::<ciborium::Value>(&self.buf)? {
                return Ok(self.buf.split_to(n).freeze());
            }
            self.fill().await?;
        }
    }

    async fn read_body(&mut self) -> Result<Body, CodecError> {
        let raw = self.read_raw_item().await?;
        self.mid_frame = false;
        // 0xf6 is the CBOR encoding of null.
        if raw.as_ref() == [0xf6] {
            Ok(Body::Empty)
        } else {
            Ok(Body::Binary(raw))
        }
    }
}

impl<R> CodecRead for BinaryReader<R>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    async fn read_header(&mut self) -> Result<InboundHeader, CodecError> {
        let header: FrameHeader = self.read_item().await?;
        self.mid_frame = true;
        if header.method.is_empty() {
            let error = if header.error.is_empty() {
                None
            } else {
                Some(WireError::from_message(header.error))
            };
            Ok(InboundHeader::Response {
                seq: header.seq,
                error,
            })
        } else {
            Ok(InboundHeader::Request {
                method: header.method,
                seq: header.seq,
            })
        }
    }

    async fn read_request_body(&mut self) -> Result<Body, CodecError> {
        self.read_body().await
    }

    async fn read_response_body(&mut self) -> Result<Body, CodecError> {
        self.read_body().await
    }
}

pub struct BinaryWriter<W> {
    writer: W,
}

impl<W> BinaryWriter<W>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    async fn write_frame(&mut self, header: &FrameHeader, body: &Body) -> Result<(), CodecError> {
        let mut out = Vec::with_capacity(64);
        ciborium::ser::into_writer(header, &mut out)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        match body {
            Body::Empty => {
                ciborium::ser::into_writer(&ciborium::Value::Null, &mut out)
                    .map_err(|e| CodecError::Encode(e.to_string()))?;
            }
            Body::Binary(bytes) => out.extend_from_slice(bytes),
            Body::Json(value) => {
                ciborium::ser::into_writer(value, &mut out)
                    .map_err(|e| CodecError::Encode(e.to_string()))?;
            }
        }
        self.writer.write_all(&out).await.map_err(CodecError::Io)?;
        self.writer.flush().await.map_err(CodecError::Io)
    }
}

impl<W> CodecWrite for BinaryWriter<W>
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    async fn write_request(&mut self, seq: u64, method: &str, body: &Body) -> Result<(), CodecError> {
        let header = FrameHeader {
            method: method.to_string(),
            seq,
            error: String::new(),
        };
        self.write_frame(&header, body).await
    }

    async fn write_response(
        &mut self,
        seq: u64,
        error: Option<&WireError>,
        body: &Body,
    ) -> Result<(), CodecError> {
        let header = FrameHeader {
            method: String::new(),
            seq,
            error: error.map(|e| e.wire_message().to_string()).unwrap_or_default(),
        };
        let body = if error.is_some() { &Body::Empty } else { body };
        self.write_frame(&header, body).await
    }

    async fn close(&mut self) -> Result<(), CodecError> {
        self.writer.shutdown().await.map_err(CodecError::Io)
    }

    fn body_format(&self) -> BodyFormat {
        BodyFormat::Binary
    }
}
