//! The `{code, message, data}` wrapper around every CanvasCloud reply.
//!
//! `code == 0` is the only success signal. HTTP status alone never decides
//! success: a 200 can carry a domain failure, and a non-2xx reply that still
//! carries an envelope is classified by its code like any other.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, Result};

/// Code the backend uses for success.
pub const SUCCESS_CODE: i64 = 0;

/// Uniform response envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    pub code: i64,
    /// Older handlers send `msg`, newer ones `message`.
    #[serde(default, alias = "msg")]
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// Split into success data or a domain error.
    ///
    /// On failure `data` is dropped unread.
    pub fn classify(self) -> Result<Option<T>> {
        if self.is_success() {
            Ok(self.data)
        } else {
            Err(ClientError::Domain {
                code: self.code,
                message: self.message,
            })
        }
    }

    /// Like [`classify`](Self::classify), but a missing `data` is an error.
    pub fn into_data(self) -> Result<T> {
        self.classify()?
            .ok_or_else(|| ClientError::InvalidResponse("Response envelope missing data".into()))
    }

    /// Like [`classify`](Self::classify), with a missing `data` read as
    /// `T::default()` (`false` for boolean endpoints).
    pub fn into_data_or_default(self) -> Result<T>
    where
        T: Default,
    {
        Ok(self.classify()?.unwrap_or_default())
    }
}

/// Interpret a raw HTTP reply as an envelope carrying `T`.
///
/// - body is an envelope with `code != 0`: [`ClientError::Domain`];
/// - body is an envelope with `code == 0`: `data` is decoded into `T`;
/// - body is not an envelope: [`ClientError::Transport`], carrying the
///   status when it was not 2xx.
pub fn parse_envelope<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<Envelope<T>> {
    let raw: Envelope<Value> = match serde_json::from_slice(body) {
        Ok(env) => env,
        Err(e) => {
            let text = String::from_utf8_lossy(body);
            if !(200..300).contains(&status) {
                return Err(ClientError::http(status, truncate(&text, 200)));
            }
            return Err(ClientError::Transport {
                context: format!("Response is not a JSON envelope ({}): {}", e, truncate(&text, 200)),
                status: None,
                source: None,
            });
        }
    };

    if !raw.is_success() {
        return Ok(Envelope {
            code: raw.code,
            message: raw.message,
            data: None,
        });
    }

    let data = match raw.data {
        None | Some(Value::Null) => None,
        Some(v) => Some(serde_json::from_value(v).map_err(|e| {
            ClientError::InvalidResponse(format!("Unexpected envelope data shape: {}", e))
        })?),
    };

    Ok(Envelope {
        code: raw.code,
        message: raw.message,
        data,
    })
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
