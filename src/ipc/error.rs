use serde_json::json;

use crate::engine::EngineError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Maps engine errors onto the wire error vocabulary.
pub fn engine_err(id: &str, e: EngineError) -> serde_json::Value {
    let code = match &e {
        EngineError::NotFound { .. } => "not_found",
        EngineError::NotRepeatable => "not_repeatable",
        EngineError::MaxAttemptsReached { .. } => "max_attempts_reached",
        EngineError::AlreadyCompleted => "already_completed",
        EngineError::Db(_) => "db_query_failed",
    };
    err(id, code, e.to_string(), None)
}
