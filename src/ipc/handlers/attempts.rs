use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_attempts_start(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(engine) = state.engine.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let quiz_id = match req.params.get("quizId").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing quizId", None),
    };
    let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing studentId", None),
    };

    match engine.start_attempt(quiz_id, student_id) {
        Ok(attempt) => ok(
            &req.id,
            serde_json::to_value(&attempt).unwrap_or_else(|_| json!({})),
        ),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_attempts_complete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(engine) = state.engine.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let attempt_id = match req.params.get("attemptId").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing attemptId", None),
    };
    // Absent or null score is allowed and records as 0.
    let score = req.params.get("score").and_then(|v| v.as_f64());
    let answers = req.params.get("answers").filter(|v| !v.is_null());

    match engine.complete_attempt(attempt_id, score, answers) {
        Ok(completed) => ok(
            &req.id,
            serde_json::to_value(&completed).unwrap_or_else(|_| json!({})),
        ),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_attempts_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(engine) = state.engine.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let quiz_id = match req.params.get("quizId").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing quizId", None),
    };
    let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing studentId", None),
    };

    match engine.list_attempts(quiz_id, student_id) {
        Ok(attempts) => ok(
            &req.id,
            json!({ "attempts": serde_json::to_value(&attempts).unwrap_or_else(|_| json!([])) }),
        ),
        Err(e) => engine_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attempts.start" => Some(handle_attempts_start(state, req)),
        "attempts.complete" => Some(handle_attempts_complete(state, req)),
        "attempts.list" => Some(handle_attempts_list(state, req)),
        _ => None,
    }
}
