use chrono::{Duration, TimeZone, Utc};
use quizd::engine::Engine;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

fn temp_workspace(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn seed_classroom(engine: &Engine) -> String {
    let id = Uuid::new_v4().to_string();
    engine
        .db()
        .execute(
            "INSERT INTO classrooms(id, name) VALUES(?, ?)",
            (&id, "Grade 6A"),
        )
        .expect("insert classroom");
    id
}

fn seed_student(engine: &Engine, name: &str) -> String {
    let id = Uuid::new_v4().to_string();
    engine
        .db()
        .execute("INSERT INTO students(id, name) VALUES(?, ?)", (&id, name))
        .expect("insert student");
    id
}

fn seed_quiz(engine: &Engine, classroom_id: &str) -> String {
    let id = Uuid::new_v4().to_string();
    engine
        .db()
        .execute(
            "INSERT INTO quizzes(id, classroom_id, title, passing_score, repeatable, max_attempts)
             VALUES(?, ?, ?, 50.0, 1, NULL)",
            (&id, classroom_id, "Decimals"),
        )
        .expect("insert quiz");
    id
}

fn take_quiz(engine: &Engine, quiz: &str, student: &str, score: f64, seconds: i64) -> Option<i64> {
    let t0 = Utc.with_ymd_and_hms(2026, 3, 9, 10, 0, 0).unwrap();
    let attempt = engine.start_attempt_at(quiz, student, t0).expect("start");
    let completed = engine
        .complete_attempt_at(
            &attempt.id,
            Some(score),
            None,
            t0 + Duration::seconds(seconds),
        )
        .expect("complete");
    completed.rank
}

#[test]
fn same_score_faster_time_ranks_first() {
    let ws = temp_workspace("quizd-tie-time");
    let engine = Engine::open(&ws).expect("open engine");
    let classroom = seed_classroom(&engine);
    let quiz = seed_quiz(&engine, &classroom);
    let a = seed_student(&engine, "Student A");
    let b = seed_student(&engine, "Student B");

    take_quiz(&engine, &quiz, &a, 80.0, 120);
    take_quiz(&engine, &quiz, &b, 80.0, 90);

    let board = engine.quiz_leaderboard(&quiz, 10).expect("leaderboard");
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].student_id, b);
    assert_eq!(board[0].rank, Some(1));
    assert_eq!(board[1].student_id, a);
    assert_eq!(board[1].rank, Some(2));

    let _ = std::fs::remove_dir_all(ws);
}

#[test]
fn highest_score_is_monotone_and_ties_keep_best_attempt() {
    let ws = temp_workspace("quizd-monotone");
    let engine = Engine::open(&ws).expect("open engine");
    let classroom = seed_classroom(&engine);
    let quiz = seed_quiz(&engine, &classroom);
    let a = seed_student(&engine, "Student A");

    take_quiz(&engine, &quiz, &a, 90.0, 100);
    take_quiz(&engine, &quiz, &a, 85.0, 80);
    // An equal score later must not move bestAttemptNumber either.
    take_quiz(&engine, &quiz, &a, 90.0, 70);

    let board = engine.quiz_leaderboard(&quiz, 10).expect("leaderboard");
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].highest_score, 90.0);
    assert_eq!(board[0].best_attempt_number, Some(1));
    assert_eq!(board[0].total_completed, 3);

    let _ = std::fs::remove_dir_all(ws);
}

#[test]
fn fastest_time_updates_independently_of_score() {
    let ws = temp_workspace("quizd-decoupled");
    let engine = Engine::open(&ws).expect("open engine");
    let classroom = seed_classroom(&engine);
    let quiz = seed_quiz(&engine, &classroom);
    let a = seed_student(&engine, "Student A");

    take_quiz(&engine, &quiz, &a, 90.0, 100);
    // Lower score, but faster: the recorded fastest time still drops.
    take_quiz(&engine, &quiz, &a, 70.0, 50);

    let board = engine.quiz_leaderboard(&quiz, 10).expect("leaderboard");
    assert_eq!(board[0].highest_score, 90.0);
    assert_eq!(board[0].fastest_time_seconds, Some(50));
    assert_eq!(board[0].best_attempt_number, Some(1));

    let _ = std::fs::remove_dir_all(ws);
}

#[test]
fn ranks_stay_dense_across_many_completions() {
    let ws = temp_workspace("quizd-dense");
    let engine = Engine::open(&ws).expect("open engine");
    let classroom = seed_classroom(&engine);
    let quiz = seed_quiz(&engine, &classroom);

    let scores = [55.0, 95.0, 80.0, 80.0, 60.0, 100.0];
    let times = [200, 140, 120, 90, 300, 60];
    for (i, (score, seconds)) in scores.iter().zip(times.iter()).enumerate() {
        let s = seed_student(&engine, &format!("Student {}", i));
        take_quiz(&engine, &quiz, &s, *score, *seconds);
    }

    let board = engine.quiz_leaderboard(&quiz, 10).expect("leaderboard");
    assert_eq!(board.len(), scores.len());

    let ranks: Vec<i64> = board.iter().map(|e| e.rank.expect("ranked")).collect();
    assert_eq!(ranks, (1..=scores.len() as i64).collect::<Vec<_>>());

    // Stored order respects the comparator: score desc, then time asc.
    for pair in board.windows(2) {
        let (hi, lo) = (&pair[0], &pair[1]);
        assert!(hi.highest_score >= lo.highest_score);
        if hi.highest_score == lo.highest_score {
            assert!(hi.fastest_time_seconds <= lo.fastest_time_seconds);
        }
    }

    let _ = std::fs::remove_dir_all(ws);
}

#[test]
fn completion_response_carries_the_fresh_rank() {
    let ws = temp_workspace("quizd-fresh-rank");
    let engine = Engine::open(&ws).expect("open engine");
    let classroom = seed_classroom(&engine);
    let quiz = seed_quiz(&engine, &classroom);
    let a = seed_student(&engine, "Student A");
    let b = seed_student(&engine, "Student B");

    let first_rank = take_quiz(&engine, &quiz, &a, 60.0, 100);
    assert_eq!(first_rank, Some(1));

    // A better second student takes over rank 1 immediately.
    let second_rank = take_quiz(&engine, &quiz, &b, 90.0, 100);
    assert_eq!(second_rank, Some(1));

    let board = engine.quiz_leaderboard(&quiz, 10).expect("leaderboard");
    assert_eq!(board[0].student_id, b);
    assert_eq!(board[1].rank, Some(2));

    let _ = std::fs::remove_dir_all(ws);
}

#[test]
fn leaderboard_limit_truncates() {
    let ws = temp_workspace("quizd-limit");
    let engine = Engine::open(&ws).expect("open engine");
    let classroom = seed_classroom(&engine);
    let quiz = seed_quiz(&engine, &classroom);

    for i in 0..5 {
        let s = seed_student(&engine, &format!("Student {}", i));
        take_quiz(&engine, &quiz, &s, 50.0 + i as f64, 100);
    }

    let top3 = engine.quiz_leaderboard(&quiz, 3).expect("leaderboard");
    assert_eq!(top3.len(), 3);
    assert_eq!(top3[0].rank, Some(1));
    assert_eq!(top3[2].rank, Some(3));

    let _ = std::fs::remove_dir_all(ws);
}
