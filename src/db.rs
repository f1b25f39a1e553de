use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("quizd.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    // One writer at a time behind the engine mutex; keep SQLite patient anyway.
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classrooms(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lessons(
            id TEXT PRIMARY KEY,
            classroom_id TEXT NOT NULL,
            title TEXT NOT NULL,
            FOREIGN KEY(classroom_id) REFERENCES classrooms(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lessons_classroom ON lessons(classroom_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS quizzes(
            id TEXT PRIMARY KEY,
            classroom_id TEXT NOT NULL,
            lesson_id TEXT,
            title TEXT NOT NULL,
            passing_score REAL NOT NULL DEFAULT 0,
            repeatable INTEGER NOT NULL DEFAULT 0,
            max_attempts INTEGER,
            FOREIGN KEY(classroom_id) REFERENCES classrooms(id),
            FOREIGN KEY(lesson_id) REFERENCES lessons(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_quizzes_classroom ON quizzes(classroom_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_quizzes_lesson ON quizzes(lesson_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS quiz_attempts(
            id TEXT PRIMARY KEY,
            quiz_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            attempt_number INTEGER NOT NULL,
            score REAL,
            passed INTEGER,
            time_spent_seconds INTEGER,
            answers TEXT,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            FOREIGN KEY(quiz_id) REFERENCES quizzes(id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            UNIQUE(quiz_id, student_id, attempt_number)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_quiz_attempts_quiz ON quiz_attempts(quiz_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_quiz_attempts_student ON quiz_attempts(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_quiz_attempts_pair ON quiz_attempts(quiz_id, student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS leaderboard_entries(
            id TEXT PRIMARY KEY,
            quiz_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            highest_score REAL NOT NULL,
            fastest_time_seconds INTEGER,
            best_attempt_number INTEGER,
            total_completed INTEGER NOT NULL,
            rank INTEGER,
            FOREIGN KEY(quiz_id) REFERENCES quizzes(id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            UNIQUE(quiz_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_leaderboard_entries_quiz ON leaderboard_entries(quiz_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_leaderboard_entries_student ON leaderboard_entries(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS performance_summaries(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            classroom_id TEXT NOT NULL,
            total_taken INTEGER NOT NULL DEFAULT 0,
            total_passed INTEGER NOT NULL DEFAULT 0,
            total_failed INTEGER NOT NULL DEFAULT 0,
            average_score REAL NOT NULL DEFAULT 0,
            average_completion_time REAL NOT NULL DEFAULT 0,
            total_points REAL NOT NULL DEFAULT 0,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(classroom_id) REFERENCES classrooms(id),
            UNIQUE(student_id, classroom_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_performance_summaries_classroom
         ON performance_summaries(classroom_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lesson_progress(
            lesson_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            quiz_score REAL NOT NULL,
            completed_at TEXT NOT NULL,
            PRIMARY KEY(lesson_id, student_id),
            FOREIGN KEY(lesson_id) REFERENCES lessons(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lesson_progress_student ON lesson_progress(student_id)",
        [],
    )?;

    Ok(conn)
}
