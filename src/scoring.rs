use std::cmp::Ordering;

/// The fields of a leaderboard entry that participate in ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankKey {
    pub highest_score: f64,
    pub fastest_time_seconds: Option<i64>,
    pub best_attempt_number: Option<i64>,
}

/// Leaderboard ordering, best first:
/// 1. highest score descending
/// 2. fastest time ascending, no recorded time sorts last
/// 3. best attempt number ascending, none sorts last
pub fn compare_rank_keys(a: &RankKey, b: &RankKey) -> Ordering {
    b.highest_score
        .total_cmp(&a.highest_score)
        .then_with(|| cmp_option_asc(a.fastest_time_seconds, b.fastest_time_seconds))
        .then_with(|| cmp_option_asc(a.best_attempt_number, b.best_attempt_number))
}

fn cmp_option_asc(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sorts `(id, key)` pairs with the leaderboard comparator and assigns dense
/// 1-based ranks by position. Fully tied keys fall back to id order so the
/// assignment is deterministic; ranks are positional either way, so no two
/// entries ever share one.
pub fn assign_dense_ranks(entries: &mut [(String, RankKey)]) -> Vec<(String, i64)> {
    entries.sort_by(|(id_a, key_a), (id_b, key_b)| {
        compare_rank_keys(key_a, key_b).then_with(|| id_a.cmp(id_b))
    });
    entries
        .iter()
        .enumerate()
        .map(|(i, (id, _))| (id.clone(), (i as i64) + 1))
        .collect()
}

/// One step of the incremental running average: `n` is the count after the
/// new value was admitted. There is no inverse step; corrections require a
/// full recompute, which this system does not provide.
pub fn running_average(old_avg: f64, n: i64, new_value: f64) -> f64 {
    if n <= 0 {
        return 0.0;
    }
    (old_avg * ((n - 1) as f64) + new_value) / (n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(score: f64, time: Option<i64>, attempt: Option<i64>) -> RankKey {
        RankKey {
            highest_score: score,
            fastest_time_seconds: time,
            best_attempt_number: attempt,
        }
    }

    #[test]
    fn higher_score_wins() {
        let a = key(90.0, Some(300), Some(5));
        let b = key(80.0, Some(10), Some(1));
        assert_eq!(compare_rank_keys(&a, &b), Ordering::Less);
    }

    #[test]
    fn same_score_faster_time_wins() {
        let a = key(80.0, Some(120), Some(1));
        let b = key(80.0, Some(90), Some(1));
        assert_eq!(compare_rank_keys(&b, &a), Ordering::Less);
    }

    #[test]
    fn missing_time_sorts_last() {
        let timed = key(80.0, Some(1000), Some(3));
        let untimed = key(80.0, None, Some(1));
        assert_eq!(compare_rank_keys(&timed, &untimed), Ordering::Less);
    }

    #[test]
    fn same_score_and_time_fewer_attempts_wins() {
        let early = key(80.0, Some(90), Some(1));
        let late = key(80.0, Some(90), Some(4));
        assert_eq!(compare_rank_keys(&early, &late), Ordering::Less);
    }

    #[test]
    fn dense_ranks_are_gapless_and_ordered() {
        let mut entries = vec![
            ("c".to_string(), key(70.0, Some(60), Some(2))),
            ("a".to_string(), key(80.0, Some(120), Some(1))),
            ("b".to_string(), key(80.0, Some(90), Some(1))),
        ];
        let ranked = assign_dense_ranks(&mut entries);
        assert_eq!(
            ranked,
            vec![
                ("b".to_string(), 1),
                ("a".to_string(), 2),
                ("c".to_string(), 3),
            ]
        );
    }

    #[test]
    fn fully_tied_keys_rank_deterministically() {
        let mut entries = vec![
            ("y".to_string(), key(50.0, None, None)),
            ("x".to_string(), key(50.0, None, None)),
        ];
        let ranked = assign_dense_ranks(&mut entries);
        assert_eq!(
            ranked,
            vec![("x".to_string(), 1), ("y".to_string(), 2)]
        );
    }

    #[test]
    fn running_average_matches_arithmetic_mean() {
        let values = [80.0, 60.0, 100.0, 30.0, 45.0];
        let mut avg = 0.0;
        for (i, v) in values.iter().enumerate() {
            avg = running_average(avg, (i as i64) + 1, *v);
        }
        let mean: f64 = values.iter().sum::<f64>() / values.len() as f64;
        assert!((avg - mean).abs() < 1e-9);
    }
}
