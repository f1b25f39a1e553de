use rusqlite::{Connection, OptionalExtension};

use super::{Engine, EngineError, RollupRow};

fn ensure_classroom(conn: &Connection, classroom_id: &str) -> Result<(), EngineError> {
    let found: Option<String> = conn
        .query_row(
            "SELECT id FROM classrooms WHERE id = ?",
            [classroom_id],
            |r| r.get(0),
        )
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(EngineError::NotFound {
            what: "classroom",
            id: classroom_id.to_string(),
        }),
    }
}

/// Read-time aggregation over the classroom's leaderboard entries. Nothing
/// is persisted, so there is no staleness to manage; the result reflects the
/// entries as of this query. Total-score ties keep a student-id order to
/// make repeated reads deterministic.
fn rollup(
    conn: &Connection,
    classroom_id: &str,
    order_by: &str,
    limit: i64,
) -> Result<Vec<RollupRow>, EngineError> {
    let sql = format!(
        "SELECT e.student_id, s.name, SUM(e.highest_score), MIN(e.fastest_time_seconds), COUNT(*)
         FROM leaderboard_entries e
         JOIN quizzes q ON q.id = e.quiz_id
         JOIN students s ON s.id = e.student_id
         WHERE q.classroom_id = ?
         GROUP BY e.student_id, s.name
         ORDER BY {} DESC, e.student_id
         LIMIT ?",
        order_by
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((classroom_id, limit), |r| {
            Ok(RollupRow {
                student_id: r.get(0)?,
                student_name: r.get(1)?,
                total_score: r.get(2)?,
                best_time_seconds: r.get(3)?,
                quizzes_completed: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl Engine {
    /// Per-student totals across every quiz of the classroom, best total
    /// score first.
    pub fn classroom_leaderboard(
        &self,
        classroom_id: &str,
        limit: i64,
    ) -> Result<Vec<RollupRow>, EngineError> {
        let conn = self.db();
        ensure_classroom(&conn, classroom_id)?;
        rollup(&conn, classroom_id, "SUM(e.highest_score)", limit)
    }

    /// Same aggregation ordered by distinct quizzes completed.
    pub fn participation_leaderboard(
        &self,
        classroom_id: &str,
        limit: i64,
    ) -> Result<Vec<RollupRow>, EngineError> {
        let conn = self.db();
        ensure_classroom(&conn, classroom_id)?;
        rollup(&conn, classroom_id, "COUNT(*)", limit)
    }
}
