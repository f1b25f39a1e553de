use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use super::{leaderboard, performance, Attempt, CompletedAttempt, Engine, EngineError, QuizInfo};

pub(crate) fn load_quiz(conn: &Connection, quiz_id: &str) -> Result<QuizInfo, EngineError> {
    conn.query_row(
        "SELECT id, classroom_id, lesson_id, passing_score, repeatable, max_attempts
         FROM quizzes WHERE id = ?",
        [quiz_id],
        |r| {
            Ok(QuizInfo {
                id: r.get(0)?,
                classroom_id: r.get(1)?,
                lesson_id: r.get(2)?,
                passing_score: r.get(3)?,
                repeatable: r.get::<_, i64>(4)? != 0,
                max_attempts: r.get(5)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| EngineError::NotFound {
        what: "quiz",
        id: quiz_id.to_string(),
    })
}

fn ensure_student(conn: &Connection, student_id: &str) -> Result<(), EngineError> {
    let found: Option<String> = conn
        .query_row("SELECT id FROM students WHERE id = ?", [student_id], |r| {
            r.get(0)
        })
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(EngineError::NotFound {
            what: "student",
            id: student_id.to_string(),
        }),
    }
}

fn load_attempt(conn: &Connection, attempt_id: &str) -> Result<Attempt, EngineError> {
    conn.query_row(
        "SELECT id, quiz_id, student_id, attempt_number, score, passed,
                time_spent_seconds, started_at, completed_at
         FROM quiz_attempts WHERE id = ?",
        [attempt_id],
        |r| {
            Ok(Attempt {
                id: r.get(0)?,
                quiz_id: r.get(1)?,
                student_id: r.get(2)?,
                attempt_number: r.get(3)?,
                score: r.get(4)?,
                passed: r.get::<_, Option<i64>>(5)?.map(|v| v != 0),
                time_spent_seconds: r.get(6)?,
                started_at: r.get(7)?,
                completed_at: r.get(8)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| EngineError::NotFound {
        what: "attempt",
        id: attempt_id.to_string(),
    })
}

impl Engine {
    pub fn start_attempt(&self, quiz_id: &str, student_id: &str) -> Result<Attempt, EngineError> {
        self.start_attempt_at(quiz_id, student_id, Utc::now())
    }

    /// Clock-injected variant of [`Engine::start_attempt`].
    pub fn start_attempt_at(
        &self,
        quiz_id: &str,
        student_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Attempt, EngineError> {
        let conn = self.db();
        let quiz = load_quiz(&conn, quiz_id)?;
        ensure_student(&conn, student_id)?;

        let existing: i64 = conn.query_row(
            "SELECT COUNT(*) FROM quiz_attempts WHERE quiz_id = ? AND student_id = ?",
            (quiz_id, student_id),
            |r| r.get(0),
        )?;

        if !quiz.repeatable && existing >= 1 {
            return Err(EngineError::NotRepeatable);
        }
        if quiz.repeatable {
            if let Some(max) = quiz.max_attempts {
                if existing >= max {
                    return Err(EngineError::MaxAttemptsReached { max });
                }
            }
        }

        let attempt = Attempt {
            id: Uuid::new_v4().to_string(),
            quiz_id: quiz_id.to_string(),
            student_id: student_id.to_string(),
            attempt_number: existing + 1,
            score: None,
            passed: None,
            time_spent_seconds: None,
            started_at: now.to_rfc3339(),
            completed_at: None,
        };
        conn.execute(
            "INSERT INTO quiz_attempts(id, quiz_id, student_id, attempt_number, started_at)
             VALUES(?, ?, ?, ?, ?)",
            (
                &attempt.id,
                &attempt.quiz_id,
                &attempt.student_id,
                attempt.attempt_number,
                &attempt.started_at,
            ),
        )?;
        Ok(attempt)
    }

    pub fn complete_attempt(
        &self,
        attempt_id: &str,
        score: Option<f64>,
        answers: Option<&serde_json::Value>,
    ) -> Result<CompletedAttempt, EngineError> {
        self.complete_attempt_at(attempt_id, score, answers, Utc::now())
    }

    /// Clock-injected variant of [`Engine::complete_attempt`].
    ///
    /// The completed attempt is the system-of-record fact: it commits first,
    /// and the leaderboard/performance/lesson side effects that follow are
    /// each best-effort. A failure there is logged and never rolls the
    /// completion back.
    pub fn complete_attempt_at(
        &self,
        attempt_id: &str,
        score: Option<f64>,
        answers: Option<&serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Result<CompletedAttempt, EngineError> {
        let (attempt, quiz) = {
            let conn = self.db();
            let mut attempt = load_attempt(&conn, attempt_id)?;
            if attempt.completed_at.is_some() {
                return Err(EngineError::AlreadyCompleted);
            }
            let quiz = load_quiz(&conn, &attempt.quiz_id)?;

            // A missing score counts as 0; a client timeout must never block
            // the record.
            let score = score.unwrap_or(0.0);
            let passed = score >= quiz.passing_score;
            let time_spent = elapsed_seconds(&attempt.started_at, now);

            attempt.score = Some(score);
            attempt.passed = Some(passed);
            attempt.time_spent_seconds = Some(time_spent);
            attempt.completed_at = Some(now.to_rfc3339());

            conn.execute(
                "UPDATE quiz_attempts
                 SET score = ?, passed = ?, time_spent_seconds = ?, answers = ?, completed_at = ?
                 WHERE id = ?",
                (
                    score,
                    passed,
                    time_spent,
                    answers.map(|v| v.to_string()),
                    attempt.completed_at.as_deref(),
                    &attempt.id,
                ),
            )?;
            (attempt, quiz)
        };

        {
            let lock = self.rank_lock(&attempt.quiz_id);
            let _serialized = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let mut conn = self.db();
            if let Err(e) = leaderboard::apply_completion(&mut conn, &attempt) {
                tracing::warn!(
                    quiz_id = %attempt.quiz_id,
                    attempt_id = %attempt.id,
                    error = %e,
                    "leaderboard update failed; attempt remains committed"
                );
            }
        }

        {
            let conn = self.db();
            if let Err(e) = performance::record_attempt(&conn, &attempt, &quiz) {
                tracing::warn!(
                    classroom_id = %quiz.classroom_id,
                    student_id = %attempt.student_id,
                    error = %e,
                    "performance update failed; attempt remains committed"
                );
            }

            if let Some(lesson_id) = &quiz.lesson_id {
                if let Err(e) = notify_lesson_completed(&conn, lesson_id, &attempt) {
                    tracing::warn!(
                        lesson_id = %lesson_id,
                        student_id = %attempt.student_id,
                        error = %e,
                        "lesson completion notification failed"
                    );
                }
            }
        }

        let rank = self.entry_rank(&attempt.quiz_id, &attempt.student_id);
        Ok(CompletedAttempt { attempt, rank })
    }

    /// All attempts for a (quiz, student) pair, oldest first.
    pub fn list_attempts(
        &self,
        quiz_id: &str,
        student_id: &str,
    ) -> Result<Vec<Attempt>, EngineError> {
        let conn = self.db();
        load_quiz(&conn, quiz_id)?;
        let mut stmt = conn.prepare(
            "SELECT id, quiz_id, student_id, attempt_number, score, passed,
                    time_spent_seconds, started_at, completed_at
             FROM quiz_attempts
             WHERE quiz_id = ? AND student_id = ?
             ORDER BY attempt_number",
        )?;
        let rows = stmt
            .query_map((quiz_id, student_id), |r| {
                Ok(Attempt {
                    id: r.get(0)?,
                    quiz_id: r.get(1)?,
                    student_id: r.get(2)?,
                    attempt_number: r.get(3)?,
                    score: r.get(4)?,
                    passed: r.get::<_, Option<i64>>(5)?.map(|v| v != 0),
                    time_spent_seconds: r.get(6)?,
                    started_at: r.get(7)?,
                    completed_at: r.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn entry_rank(&self, quiz_id: &str, student_id: &str) -> Option<i64> {
        let conn = self.db();
        conn.query_row(
            "SELECT rank FROM leaderboard_entries WHERE quiz_id = ? AND student_id = ?",
            (quiz_id, student_id),
            |r| r.get::<_, Option<i64>>(0),
        )
        .optional()
        .ok()
        .flatten()
        .flatten()
    }
}

/// Whole seconds from the recorded start to `now`, clamped at zero so a
/// skewed clock can never produce a negative duration.
fn elapsed_seconds(started_at: &str, now: DateTime<Utc>) -> i64 {
    match DateTime::parse_from_rfc3339(started_at) {
        Ok(started) => (now - started.with_timezone(&Utc)).num_seconds().max(0),
        Err(_) => 0,
    }
}

fn notify_lesson_completed(
    conn: &Connection,
    lesson_id: &str,
    attempt: &Attempt,
) -> Result<(), EngineError> {
    conn.execute(
        "INSERT INTO lesson_progress(lesson_id, student_id, quiz_score, completed_at)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(lesson_id, student_id) DO UPDATE SET
           quiz_score = excluded.quiz_score,
           completed_at = excluded.completed_at",
        (
            lesson_id,
            &attempt.student_id,
            attempt.score.unwrap_or(0.0),
            attempt.completed_at.as_deref().unwrap_or(""),
        ),
    )?;
    Ok(())
}
