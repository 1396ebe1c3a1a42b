//! Response reconciliation.
//!
//! A GraphQL response may carry a `data` section, an `errors` section, both,
//! or neither. [`ResponseDecoder`] classifies a buffered response into a
//! [`ResultEnvelope`]:
//!
//! | `errors`   | value at decode path      | outcome                          |
//! |------------|---------------------------|----------------------------------|
//! | non-empty  | present, decodes as `T`   | `Err(PartialResponse(t, errors))`|
//! | non-empty  | absent / null / undecodable | `Err(ErrorResponse(errors))`   |
//! | empty/none | present, decodes as `T`   | `Ok(t)`                          |
//! | empty/none | absent / null             | [`Error::Decode`]                |
//!
//! A buffer with neither top-level key fails with [`Error::MalformedResponse`].

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry of a response's `errors` section.
///
/// Only `message` is typed. `locations`, `path` and `extensions` are kept as
/// the server sent them, whatever their shape, and fields beyond the
/// well-known ones are kept verbatim in `other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl GraphQLError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: None,
            path: None,
            extensions: None,
            other: Map::new(),
        }
    }

    /// Shortcut for the `errorType` extension some services attach.
    pub fn error_type(&self) -> Option<&str> {
        self.extensions.as_ref()?.get("errorType")?.as_str()
    }
}

/// A response that reported server errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphQLResponseError<T> {
    /// No usable data; only errors.
    #[error("GraphQL response returned {} error(s)", .0.len())]
    ErrorResponse(Vec<GraphQLError>),

    /// Usable data alongside errors.
    #[error("GraphQL response returned partial data with {} error(s)", .1.len())]
    PartialResponse(T, Vec<GraphQLError>),
}

impl<T> GraphQLResponseError<T> {
    /// The server errors, regardless of variant.
    pub fn errors(&self) -> &[GraphQLError] {
        match self {
            Self::ErrorResponse(errors) | Self::PartialResponse(_, errors) => errors,
        }
    }

    /// The partial data, if any.
    pub fn partial_data(&self) -> Option<&T> {
        match self {
            Self::ErrorResponse(_) => None,
            Self::PartialResponse(data, _) => Some(data),
        }
    }
}

/// Outcome of decoding one response.
pub type ResultEnvelope<T> = std::result::Result<T, GraphQLResponseError<T>>;

/// Buffers one response and decodes it once.
///
/// Chunks are appended as the transport delivers them; [`ResponseDecoder::decode`]
/// consumes the decoder, so each response needs a fresh one.
#[derive(Debug, Clone, Default)]
pub struct ResponseDecoder {
    decode_path: String,
    buffer: Vec<u8>,
}

impl ResponseDecoder {
    /// Create a decoder locating the target value at `decode_path` inside `data`.
    ///
    /// The path is a dot-separated key sequence; an empty path selects `data` itself.
    pub fn new(decode_path: impl Into<String>) -> Self {
        Self {
            decode_path: decode_path.into(),
            buffer: Vec::new(),
        }
    }

    pub fn decode_path(&self) -> &str {
        &self.decode_path
    }

    /// Append a chunk of the response body.
    pub fn append_response(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Number of bytes buffered so far.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Classify the buffered response and decode the target value as `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<ResultEnvelope<T>> {
        let root: Value = serde_json::from_slice(&self.buffer)
            .map_err(|e| Error::MalformedResponse(format!("invalid JSON: {}", e)))?;
        decode_value(root, &self.decode_path)
    }
}

/// Classify an already parsed response tree.
pub fn decode_value<T: DeserializeOwned>(root: Value, decode_path: &str) -> Result<ResultEnvelope<T>> {
    let Value::Object(mut root) = root else {
        return Err(Error::MalformedResponse(
            "response is not a JSON object".into(),
        ));
    };

    let data = root.remove("data");
    let errors = root.remove("errors");

    if data.is_none() && errors.is_none() {
        return Err(Error::MalformedResponse(
            "response has neither 'data' nor 'errors'".into(),
        ));
    }

    let errors = match errors {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => parse_errors(value)?,
    };

    if errors.is_empty() && data.is_none() {
        return Err(Error::MalformedResponse(
            "response has an empty 'errors' section and no 'data'".into(),
        ));
    }

    let target = data.and_then(|data| take_path(data, decode_path));

    if !errors.is_empty() {
        let partial = target.and_then(|value| serde_json::from_value::<T>(value).ok());
        return Ok(match partial {
            Some(data) => Err(GraphQLResponseError::PartialResponse(data, errors)),
            None => Err(GraphQLResponseError::ErrorResponse(errors)),
        });
    }

    let value = target.ok_or_else(|| Error::Decode {
        path: decode_path.to_string(),
        reason: "value is missing or null".into(),
    })?;

    serde_json::from_value(value)
        .map(Ok)
        .map_err(|e| Error::Decode {
            path: decode_path.to_string(),
            reason: e.to_string(),
        })
}

fn parse_errors(value: Value) -> Result<Vec<GraphQLError>> {
    serde_json::from_value(value)
        .map_err(|e| Error::MalformedResponse(format!("unrecognized 'errors' section: {}", e)))
}

/// Walk a dot-separated path into `data`, returning the non-null value found.
fn take_path(data: Value, path: &str) -> Option<Value> {
    let mut current = data;
    for key in path.split('.').filter(|k| !k.is_empty()) {
        current = match current {
            Value::Object(mut map) => map.remove(key)?,
            _ => return None,
        };
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}
