//! Judge reply parsing.
//!
//! Extracts a [`JudgeVerdict`] from the judge's reply. Pure text handling,
//! no I/O. The judge is asked for a bare JSON object, but replies wrapped in a
//! fenced code block or surrounded by prose are accepted too.
//!
//! | Field | Accepted | Missing |
//! |-------|----------|---------|
//! | `score` | integer, float (rounded), numeric string; clamped to 0-100 | error |
//! | `critique` | string | empty |
//! | `synthesis` | string | empty |
//! | `stop` / `shouldStop` | bool, or number (non-zero = true) | `false` |

use super::value_objects::JudgeVerdict;
use serde_json::{Map, Value};
use thiserror::Error;

/// Why a judge reply could not be turned into a verdict
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerdictParseError {
    #[error("no JSON object found in judge reply")]
    NoJsonObject,

    #[error("invalid JSON in judge reply: {0}")]
    InvalidJson(String),

    #[error("judge reply has no numeric score")]
    MissingScore,
}

/// Parse the judge's reply into a verdict.
pub fn parse_judge_verdict(reply: &str) -> Result<JudgeVerdict, VerdictParseError> {
    let candidate = extract_json_object(reply).ok_or(VerdictParseError::NoJsonObject)?;

    let value: Value = serde_json::from_str(candidate)
        .map_err(|e| VerdictParseError::InvalidJson(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(VerdictParseError::NoJsonObject);
    };

    let score = read_score(&map).ok_or(VerdictParseError::MissingScore)?;
    let stop = read_stop(&map, "stop")
        .or_else(|| read_stop(&map, "shouldStop"))
        .unwrap_or(false);

    Ok(JudgeVerdict::new(
        score,
        read_text(&map, "critique"),
        read_text(&map, "synthesis"),
        stop,
    ))
}

/// Locate the JSON object inside a reply.
///
/// Tries, in order: the whole trimmed reply, the body of a fenced code block,
/// and the span from the first `{` to the last `}`.
fn extract_json_object(reply: &str) -> Option<&str> {
    let trimmed = reply.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        // skip an optional language tag such as `json`
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        if let Some(end) = body.find("```") {
            let inner = body[..end].trim();
            if inner.starts_with('{') && inner.ends_with('}') {
                return Some(inner);
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

fn read_score(map: &Map<String, Value>) -> Option<u8> {
    let raw = match map.get("score")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().clamp(0.0, 100.0) as u8)
}

fn read_stop(map: &Map<String, Value>, key: &str) -> Option<bool> {
    match map.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        _ => None,
    }
}

fn read_text(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
