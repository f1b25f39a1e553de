use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 500;

fn parse_limit(req: &Request) -> Result<i64, serde_json::Value> {
    match req.params.get("limit") {
        None => Ok(DEFAULT_LIMIT),
        Some(v) => match v.as_i64() {
            Some(n) if n >= 1 && n <= MAX_LIMIT => Ok(n),
            _ => Err(err(
                &req.id,
                "bad_params",
                "limit must be between 1 and 500",
                Some(json!({ "limit": v })),
            )),
        },
    }
}

fn handle_leaderboard_quiz(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(engine) = state.engine.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let quiz_id = match req.params.get("quizId").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing quizId", None),
    };
    let limit = match parse_limit(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match engine.quiz_leaderboard(quiz_id, limit) {
        Ok(entries) => ok(
            &req.id,
            json!({ "entries": serde_json::to_value(&entries).unwrap_or_else(|_| json!([])) }),
        ),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_leaderboard_classroom(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(engine) = state.engine.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let classroom_id = match req.params.get("classroomId").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing classroomId", None),
    };
    let limit = match parse_limit(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match engine.classroom_leaderboard(classroom_id, limit) {
        Ok(entries) => ok(
            &req.id,
            json!({ "entries": serde_json::to_value(&entries).unwrap_or_else(|_| json!([])) }),
        ),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_leaderboard_participation(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(engine) = state.engine.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let classroom_id = match req.params.get("classroomId").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing classroomId", None),
    };
    let limit = match parse_limit(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match engine.participation_leaderboard(classroom_id, limit) {
        Ok(entries) => ok(
            &req.id,
            json!({ "entries": serde_json::to_value(&entries).unwrap_or_else(|_| json!([])) }),
        ),
        Err(e) => engine_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "leaderboard.quiz" => Some(handle_leaderboard_quiz(state, req)),
        "leaderboard.classroom" => Some(handle_leaderboard_classroom(state, req)),
        "leaderboard.participation" => Some(handle_leaderboard_participation(state, req)),
        _ => None,
    }
}
