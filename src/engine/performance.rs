use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use super::{Attempt, Engine, EngineError, PerformanceSummary, QuizInfo};
use crate::scoring::running_average;

/// Fold one completed attempt into the (student, classroom) summary.
///
/// Averages are true running averages: updated from the previous average and
/// count only, never recomputed from history. That keeps the update O(1) and
/// means attempt deletion or correction is unsupported here.
pub(crate) fn record_attempt(
    conn: &Connection,
    attempt: &Attempt,
    quiz: &QuizInfo,
) -> Result<(), EngineError> {
    let score = attempt.score.unwrap_or(0.0);
    let passed = attempt.passed.unwrap_or(false);
    let time = attempt.time_spent_seconds.unwrap_or(0) as f64;

    let existing: Option<(String, i64, i64, i64, f64, f64, f64)> = conn
        .query_row(
            "SELECT id, total_taken, total_passed, total_failed,
                    average_score, average_completion_time, total_points
             FROM performance_summaries WHERE student_id = ? AND classroom_id = ?",
            (&attempt.student_id, &quiz.classroom_id),
            |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                    r.get(5)?,
                    r.get(6)?,
                ))
            },
        )
        .optional()?;

    match existing {
        None => {
            conn.execute(
                "INSERT INTO performance_summaries(
                    id, student_id, classroom_id, total_taken, total_passed, total_failed,
                    average_score, average_completion_time, total_points)
                 VALUES(?, ?, ?, 1, ?, ?, ?, ?, ?)",
                (
                    Uuid::new_v4().to_string(),
                    &attempt.student_id,
                    &quiz.classroom_id,
                    passed as i64,
                    (!passed) as i64,
                    score,
                    time,
                    score,
                ),
            )?;
        }
        Some((id, taken, passed_count, failed_count, avg_score, avg_time, points)) => {
            let n = taken + 1;
            conn.execute(
                "UPDATE performance_summaries
                 SET total_taken = ?, total_passed = ?, total_failed = ?,
                     average_score = ?, average_completion_time = ?, total_points = ?
                 WHERE id = ?",
                (
                    n,
                    passed_count + passed as i64,
                    failed_count + (!passed) as i64,
                    running_average(avg_score, n, score),
                    running_average(avg_time, n, time),
                    points + score,
                    &id,
                ),
            )?;
        }
    }
    Ok(())
}

impl Engine {
    pub fn student_performance(
        &self,
        student_id: &str,
        classroom_id: &str,
    ) -> Result<PerformanceSummary, EngineError> {
        let conn = self.db();
        conn.query_row(
            "SELECT student_id, classroom_id, total_taken, total_passed, total_failed,
                    average_score, average_completion_time, total_points
             FROM performance_summaries WHERE student_id = ? AND classroom_id = ?",
            (student_id, classroom_id),
            |r| {
                Ok(PerformanceSummary {
                    student_id: r.get(0)?,
                    classroom_id: r.get(1)?,
                    total_taken: r.get(2)?,
                    total_passed: r.get(3)?,
                    total_failed: r.get(4)?,
                    average_score: r.get(5)?,
                    average_completion_time: r.get(6)?,
                    total_points: r.get(7)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| EngineError::NotFound {
            what: "performance summary",
            id: format!("{}/{}", student_id, classroom_id),
        })
    }
}
