use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use uuid::Uuid;

use super::{Attempt, Engine, EngineError, LeaderboardRow};
use crate::scoring::{assign_dense_ranks, RankKey};

/// Entry update followed by a whole-quiz re-rank, in one transaction.
/// Callers must hold the quiz's rank lock.
pub(crate) fn apply_completion(
    conn: &mut Connection,
    attempt: &Attempt,
) -> Result<(), EngineError> {
    let tx = conn.transaction()?;
    update_entry(&tx, attempt)?;
    re_rank(&tx, &attempt.quiz_id)?;
    tx.commit()?;
    Ok(())
}

/// Find-or-create the (student, quiz) entry and fold one completed attempt
/// into it. Score and time improve independently: a faster-but-lower-scoring
/// attempt still lowers the recorded fastest time.
pub(crate) fn update_entry(conn: &Connection, attempt: &Attempt) -> Result<(), EngineError> {
    let score = attempt.score.unwrap_or(0.0);
    let time = attempt.time_spent_seconds;

    let existing: Option<(String, f64, Option<i64>, Option<i64>, i64)> = conn
        .query_row(
            "SELECT id, highest_score, fastest_time_seconds, best_attempt_number, total_completed
             FROM leaderboard_entries WHERE quiz_id = ? AND student_id = ?",
            (&attempt.quiz_id, &attempt.student_id),
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
        )
        .optional()?;

    match existing {
        None => {
            conn.execute(
                "INSERT INTO leaderboard_entries(
                    id, quiz_id, student_id, highest_score, fastest_time_seconds,
                    best_attempt_number, total_completed, rank)
                 VALUES(?, ?, ?, ?, ?, ?, 1, NULL)",
                (
                    Uuid::new_v4().to_string(),
                    &attempt.quiz_id,
                    &attempt.student_id,
                    score,
                    time,
                    attempt.attempt_number,
                ),
            )?;
        }
        Some((id, highest, fastest, best_attempt, total)) => {
            // Strict improvement only: a tie does not move bestAttemptNumber.
            let (highest, best_attempt) = if score > highest {
                (score, Some(attempt.attempt_number))
            } else {
                (highest, best_attempt)
            };
            let fastest = match (time, fastest) {
                (Some(t), Some(f)) if t < f => Some(t),
                (Some(t), None) => Some(t),
                (_, f) => f,
            };
            conn.execute(
                "UPDATE leaderboard_entries
                 SET highest_score = ?, fastest_time_seconds = ?, best_attempt_number = ?,
                     total_completed = ?
                 WHERE id = ?",
                (highest, fastest, best_attempt, total + 1, &id),
            )?;
        }
    }
    Ok(())
}

/// Recomputes dense 1-based ranks for every entry of one quiz and persists
/// the ones that moved. Whole-quiz O(n log n) per completion; n is
/// classroom-sized.
pub(crate) fn re_rank(conn: &Connection, quiz_id: &str) -> Result<(), EngineError> {
    let mut stmt = conn.prepare(
        "SELECT id, highest_score, fastest_time_seconds, best_attempt_number, rank
         FROM leaderboard_entries WHERE quiz_id = ?",
    )?;
    let mut old_ranks: HashMap<String, Option<i64>> = HashMap::new();
    let mut entries: Vec<(String, RankKey)> = Vec::new();
    let rows = stmt.query_map([quiz_id], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, f64>(1)?,
            r.get::<_, Option<i64>>(2)?,
            r.get::<_, Option<i64>>(3)?,
            r.get::<_, Option<i64>>(4)?,
        ))
    })?;
    for row in rows {
        let (id, highest_score, fastest_time_seconds, best_attempt_number, rank) = row?;
        old_ranks.insert(id.clone(), rank);
        entries.push((
            id,
            RankKey {
                highest_score,
                fastest_time_seconds,
                best_attempt_number,
            },
        ));
    }
    drop(stmt);

    for (id, rank) in assign_dense_ranks(&mut entries) {
        if old_ranks.get(&id) != Some(&Some(rank)) {
            conn.execute(
                "UPDATE leaderboard_entries SET rank = ? WHERE id = ?",
                (rank, &id),
            )?;
        }
    }
    Ok(())
}

impl Engine {
    /// Re-rank one quiz, serialized against concurrent completions.
    pub fn re_rank_quiz(&self, quiz_id: &str) -> Result<(), EngineError> {
        let lock = self.rank_lock(quiz_id);
        let _serialized = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut conn = self.db();
        let tx = conn.transaction()?;
        re_rank(&tx, quiz_id)?;
        tx.commit()?;
        Ok(())
    }

    /// Top entries of one quiz by stored rank; unranked entries sort last.
    pub fn quiz_leaderboard(
        &self,
        quiz_id: &str,
        limit: i64,
    ) -> Result<Vec<LeaderboardRow>, EngineError> {
        let conn = self.db();
        super::attempts::load_quiz(&conn, quiz_id)?;
        let mut stmt = conn.prepare(
            "SELECT e.student_id, s.name, e.highest_score, e.fastest_time_seconds,
                    e.best_attempt_number, e.total_completed, e.rank
             FROM leaderboard_entries e
             JOIN students s ON s.id = e.student_id
             WHERE e.quiz_id = ?
             ORDER BY e.rank IS NULL, e.rank
             LIMIT ?",
        )?;
        let rows = stmt
            .query_map((quiz_id, limit), |r| {
                Ok(LeaderboardRow {
                    student_id: r.get(0)?,
                    student_name: r.get(1)?,
                    highest_score: r.get(2)?,
                    fastest_time_seconds: r.get(3)?,
                    best_attempt_number: r.get(4)?,
                    total_completed: r.get(5)?,
                    rank: r.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
