//! Maps a raw service reply onto a single `ExecutionResult`.
//!
//! Field precedence for failures is `detail`, then `error`, then
//! [`FALLBACK_FAILURE_MESSAGE`]. A failure is any non-2xx status, or any body
//! carrying a non-empty `detail`/`error` field regardless of status.

use serde_json::Value;

use super::{ExecutionError, ExecutionResult, RawResponse};

pub const FALLBACK_FAILURE_MESSAGE: &str = "Failed to execute code";

pub fn normalize_response(raw: &RawResponse) -> ExecutionResult {
    match interpret(raw) {
        Ok(output) => ExecutionResult::Success { output },
        Err(err) => err.into(),
    }
}

fn interpret(raw: &RawResponse) -> Result<String, ExecutionError> {
    let success_status = (200..300).contains(&raw.status);

    let body: Value = serde_json::from_slice(&raw.body).map_err(|e| {
        ExecutionError::Transport(format!(
            "could not decode response (HTTP {}): {e}",
            raw.status
        ))
    })?;

    if let Some(message) = failure_message(&body) {
        return Err(ExecutionError::Remote {
            status: raw.status,
            message,
        });
    }

    if !success_status {
        return Err(ExecutionError::Remote {
            status: raw.status,
            message: FALLBACK_FAILURE_MESSAGE.to_string(),
        });
    }

    match body.get("output") {
        Some(Value::String(output)) => Ok(output.clone()),
        Some(other) => Err(ExecutionError::Transport(format!(
            "unexpected `output` value in response: {other}"
        ))),
        None => Err(ExecutionError::Transport(
            "response did not contain an `output` field".into(),
        )),
    }
}

fn failure_message(body: &Value) -> Option<String> {
    ["detail", "error"]
        .iter()
        .filter_map(|key| body.get(*key))
        .filter_map(describe)
        .find(|s| !s.trim().is_empty())
}

/// Text for an indicator field. Lists (FastAPI validation errors) are joined by
/// each entry's `msg`.
fn describe(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item.get("msg").and_then(Value::as_str) {
                    Some(msg) => msg.to_string(),
                    None => match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    },
                })
                .collect();
            Some(parts.join("\n"))
        }
        other => Some(other.to_string()),
    }
}
