//! Codec-neutral frame payloads.
//!
//! A [`Body`] is the opaque value that rides after a frame header. Handlers
//! and callers never see it directly: typed arguments and replies pass
//! through [`Body::encode`] / [`Body::decode`], closed over the concrete
//! type at handler registration or call time. Both wire representations are
//! self-describing, so decoding can happen after routing, on whatever task
//! ends up owning the frame.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::BodyError;

/// The payload representation a codec reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    /// CBOR items (binary codec).
    Binary,
    /// JSON values (JSON-RPC codecs).
    Json,
}

/// An opaque frame payload.
#[derive(Debug, Clone, Default)]
pub enum Body {
    /// No payload was present on the wire.
    #[default]
    Empty,
    /// One encoded CBOR item.
    Binary(Bytes),
    /// A parsed JSON value.
    Json(serde_json::Value),
}

impl Body {
    /// Encode a value into the representation `format` expects.
    pub fn encode<T: Serialize + ?Sized>(format: BodyFormat, value: &T) -> Result<Self, BodyError> {
        match format {
            BodyFormat::Binary => {
                let mut buf = Vec::new();
                ciborium::ser::into_writer(value, &mut buf)
                    .map_err(|e| BodyError::Encode(e.to_string()))?;
                Ok(Body::Binary(buf.into()))
            }
            BodyFormat::Json => serde_json::to_value(value)
                .map(Body::Json)
                .map_err(|e| BodyError::Encode(e.to_string())),
        }
    }

    /// Decode this payload into a concrete type.
    ///
    /// JSON payloads get one extra chance: if the declared type rejects the
    /// value and the value is a one-element array, the single element is
    /// tried instead. That undoes the positional `[arg]` wrapping the
    /// JSON-RPC codecs apply to single arguments, without the codec having
    /// to know the declared type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, BodyError> {
        match self {
            Body::Empty => serde_json::from_value(serde_json::Value::Null)
                .map_err(|_| BodyError::MissingParams),
            Body::Binary(bytes) => ciborium::de::from_reader(bytes.as_ref())
                .map_err(|e| BodyError::Decode(e.to_string())),
            Body::Json(value) => match serde_json::from_value(value.clone()) {
                Ok(v) => Ok(v),
                Err(direct) => {
                    if let serde_json::Value::Array(items) = value {
                        if items.len() == 1 {
                            if let Ok(v) = serde_json::from_value(items[0].clone()) {
                                return Ok(v);
                            }
                        }
                        // An empty positional list is as good as no params.
                        if items.is_empty() {
                            if let Ok(v) = serde_json::from_value(serde_json::Value::Null) {
                                return Ok(v);
                            }
                        }
                    }
                    Err(BodyError::Decode(direct.to_string()))
                }
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }
}
