use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_performance_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(engine) = state.engine.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing studentId", None),
    };
    let classroom_id = match req.params.get("classroomId").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing classroomId", None),
    };

    match engine.student_performance(student_id, classroom_id) {
        Ok(summary) => ok(
            &req.id,
            serde_json::to_value(&summary).unwrap_or_else(|_| json!({})),
        ),
        Err(e) => engine_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "performance.get" => Some(handle_performance_get(state, req)),
        _ => None,
    }
}
