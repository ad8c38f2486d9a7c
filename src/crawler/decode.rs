//! Response envelope decoding
//!
//! JSON endpoints wrap their payload as `{"ok": <code>, "data": ..., "msg": ...}`.
//!
//! | `ok` | Meaning |
//! |------|---------|
//! | 1 | Success, `data` is the payload |
//! | 0 | Soft failure (nothing to show, rate-limited listing); treated as empty |
//! | anything else | Hard failure, retried |

use serde_json::{Map, Value};

/// Classified provider answer
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome {
    Success(Value),
    SoftEmpty { message: String },
    HardFailure { reason: String },
}

impl ProviderOutcome {
    /// Collapses a soft failure into an empty payload
    pub fn into_data(self) -> Result<Value, String> {
        match self {
            Self::Success(data) => Ok(data),
            Self::SoftEmpty { .. } => Ok(Value::Object(Map::new())),
            Self::HardFailure { reason } => Err(reason),
        }
    }
}

/// Decodes a response body into a `ProviderOutcome`
///
/// # Returns
///
/// * `Ok(ProviderOutcome)` - The body was a JSON envelope
/// * `Err(serde_json::Error)` - The body was not JSON at all (login page, captcha)
pub fn decode_envelope(body: &str) -> Result<ProviderOutcome, serde_json::Error> {
    let envelope: Value = serde_json::from_str(body)?;

    let code = envelope.get("ok").and_then(|ok| match ok {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    });
    let message = envelope
        .get("msg")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(match code {
        Some(1) => ProviderOutcome::Success(
            envelope
                .get("data")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new())),
        ),
        Some(0) => ProviderOutcome::SoftEmpty { message },
        other => ProviderOutcome::HardFailure {
            reason: if message.is_empty() {
                format!("unexpected status {:?}", other)
            } else {
                message
            },
        },
    })
}

/// Reads an integer field that may arrive as a number or a numeric string
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
