use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_classrooms_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(engine) = state.engine.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => return err(&req.id, "bad_params", "missing name", None),
    };

    let classroom_id = Uuid::new_v4().to_string();
    let conn = engine.db();
    if let Err(e) = conn.execute(
        "INSERT INTO classrooms(id, name) VALUES(?, ?)",
        (&classroom_id, &name),
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "classroomId": classroom_id }))
}

fn handle_classrooms_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(engine) = state.engine.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let conn = engine.db();
    let mut stmt = match conn.prepare("SELECT id, name FROM classrooms ORDER BY name") {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |r| {
            Ok(json!({ "id": r.get::<_, String>(0)?, "name": r.get::<_, String>(1)? }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(classrooms) => ok(&req.id, json!({ "classrooms": classrooms })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(engine) = state.engine.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => return err(&req.id, "bad_params", "missing name", None),
    };

    let student_id = Uuid::new_v4().to_string();
    let conn = engine.db();
    if let Err(e) = conn.execute(
        "INSERT INTO students(id, name) VALUES(?, ?)",
        (&student_id, &name),
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "studentId": student_id }))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(engine) = state.engine.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let conn = engine.db();
    let mut stmt = match conn.prepare("SELECT id, name FROM students ORDER BY name") {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |r| {
            Ok(json!({ "id": r.get::<_, String>(0)?, "name": r.get::<_, String>(1)? }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_lessons_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(engine) = state.engine.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let classroom_id = match req.params.get("classroomId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing classroomId", None),
    };
    let title = match req.params.get("title").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => return err(&req.id, "bad_params", "missing title", None),
    };

    let lesson_id = Uuid::new_v4().to_string();
    let conn = engine.db();
    if let Err(e) = conn.execute(
        "INSERT INTO lessons(id, classroom_id, title) VALUES(?, ?, ?)",
        (&lesson_id, &classroom_id, &title),
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "lessonId": lesson_id }))
}

fn handle_lessons_progress(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(engine) = state.engine.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let lesson_id = match req.params.get("lessonId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing lessonId", None),
    };

    let conn = engine.db();
    let mut stmt = match conn.prepare(
        "SELECT student_id, quiz_score, completed_at FROM lesson_progress
         WHERE lesson_id = ? ORDER BY student_id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([&lesson_id], |r| {
            Ok(json!({
                "studentId": r.get::<_, String>(0)?,
                "quizScore": r.get::<_, f64>(1)?,
                "completedAt": r.get::<_, String>(2)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(progress) => ok(&req.id, json!({ "progress": progress })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_quizzes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(engine) = state.engine.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let classroom_id = match req.params.get("classroomId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing classroomId", None),
    };
    let title = match req.params.get("title").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => return err(&req.id, "bad_params", "missing title", None),
    };
    let lesson_id = req
        .params
        .get("lessonId")
        .and_then(|v| v.as_str())
        .map(|v| v.to_string());
    let passing_score = req
        .params
        .get("passingScore")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    let repeatable = req
        .params
        .get("repeatable")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let max_attempts = req.params.get("maxAttempts").and_then(|v| v.as_i64());
    if let Some(max) = max_attempts {
        if max < 1 {
            return err(
                &req.id,
                "bad_params",
                "maxAttempts must be >= 1",
                Some(json!({ "maxAttempts": max })),
            );
        }
    }

    let quiz_id = Uuid::new_v4().to_string();
    let conn = engine.db();
    if let Err(e) = conn.execute(
        "INSERT INTO quizzes(id, classroom_id, lesson_id, title, passing_score, repeatable, max_attempts)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &quiz_id,
            &classroom_id,
            lesson_id.as_deref(),
            &title,
            passing_score,
            repeatable,
            max_attempts,
        ),
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "quizId": quiz_id }))
}

fn handle_quizzes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(engine) = state.engine.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let classroom_id = match req.params.get("classroomId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing classroomId", None),
    };

    let conn = engine.db();
    let mut stmt = match conn.prepare(
        "SELECT id, lesson_id, title, passing_score, repeatable, max_attempts
         FROM quizzes WHERE classroom_id = ? ORDER BY title",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([&classroom_id], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "lessonId": r.get::<_, Option<String>>(1)?,
                "title": r.get::<_, String>(2)?,
                "passingScore": r.get::<_, f64>(3)?,
                "repeatable": r.get::<_, i64>(4)? != 0,
                "maxAttempts": r.get::<_, Option<i64>>(5)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(quizzes) => ok(&req.id, json!({ "quizzes": quizzes })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classrooms.create" => Some(handle_classrooms_create(state, req)),
        "classrooms.list" => Some(handle_classrooms_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "lessons.create" => Some(handle_lessons_create(state, req)),
        "lessons.progress" => Some(handle_lessons_progress(state, req)),
        "quizzes.create" => Some(handle_quizzes_create(state, req)),
        "quizzes.list" => Some(handle_quizzes_list(state, req)),
        _ => None,
    }
}
