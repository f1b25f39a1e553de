pub mod attempts;
pub mod leaderboard;
pub mod performance;
pub mod rollup;

use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::db;

/// Domain errors for the attempt/leaderboard engine.
#[derive(Debug)]
pub enum EngineError {
    /// A referenced quiz/student/attempt does not exist.
    NotFound { what: &'static str, id: String },

    /// The quiz is not repeatable and the student already attempted it.
    NotRepeatable,

    /// The quiz's configured attempt limit is exhausted.
    MaxAttemptsReached { max: i64 },

    /// The attempt was already completed; completion is one-way.
    AlreadyCompleted,

    Db(rusqlite::Error),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotFound { what, id } => write!(f, "{} not found: {}", what, id),
            EngineError::NotRepeatable => write!(f, "quiz cannot be retaken"),
            EngineError::MaxAttemptsReached { max } => {
                write!(f, "maximum attempts reached ({})", max)
            }
            EngineError::AlreadyCompleted => write!(f, "attempt already completed"),
            EngineError::Db(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::Db(e)
    }
}

/// One attempt by one student at one quiz.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: String,
    pub quiz_id: String,
    pub student_id: String,
    pub attempt_number: i64,
    pub score: Option<f64>,
    pub passed: Option<bool>,
    pub time_spent_seconds: Option<i64>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

/// A completed attempt plus its freshly computed leaderboard rank, when a
/// leaderboard entry exists for the pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedAttempt {
    #[serde(flatten)]
    pub attempt: Attempt,
    pub rank: Option<i64>,
}

/// Quiz metadata the engine needs: scoring policy and linkage.
#[derive(Debug, Clone)]
pub struct QuizInfo {
    pub id: String,
    pub classroom_id: String,
    pub lesson_id: Option<String>,
    pub passing_score: f64,
    pub repeatable: bool,
    pub max_attempts: Option<i64>,
}

/// Best-ever summary row for one (student, quiz) pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub student_id: String,
    pub student_name: String,
    pub highest_score: f64,
    pub fastest_time_seconds: Option<i64>,
    pub best_attempt_number: Option<i64>,
    pub total_completed: i64,
    pub rank: Option<i64>,
}

/// Read-time classroom aggregate over a student's leaderboard entries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupRow {
    pub student_id: String,
    pub student_name: String,
    pub total_score: f64,
    pub best_time_seconds: Option<i64>,
    pub quizzes_completed: i64,
}

/// Running per-(student, classroom) statistics. Append-only.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub student_id: String,
    pub classroom_id: String,
    pub total_taken: i64,
    pub total_passed: i64,
    pub total_failed: i64,
    pub average_score: f64,
    pub average_completion_time: f64,
    pub total_points: f64,
}

/// Thread-safe scoring/ranking engine over one workspace database.
///
/// The connection is shared behind a mutex; re-ranking a quiz additionally
/// holds that quiz's keyed lock so concurrent completions on the same quiz
/// serialize their read-then-write rank pass (different quizzes proceed in
/// parallel up to the connection).
pub struct Engine {
    conn: Mutex<Connection>,
    rank_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Engine {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            rank_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(db::open_db(workspace)?))
    }

    /// Borrow the shared connection. Poisoning is ignored: a panicked holder
    /// leaves the database itself consistent (statements are transactional).
    pub fn db(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The serialization point for `re_rank` on one quiz.
    pub(crate) fn rank_lock(&self, quiz_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .rank_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(quiz_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
