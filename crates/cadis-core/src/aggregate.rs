//! Rolling progress math over stored attempts.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::config::AggregatorConfig;
use crate::types::{Attempt, Category, CategoryScores, Principle, PrincipleAdherence, Progress};

/// Arithmetic mean; `None` for an empty input.
pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .fold((0.0_f64, 0_u64), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

pub fn window_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(days))
}

/// Difference between the mean score of the last `recent_days` and the
/// `recent_days` before that. Zero if either side has no attempts.
pub fn recent_improvement(attempts: &[Attempt], recent_days: u32, now: DateTime<Utc>) -> i32 {
    let recent_from = window_start(now, recent_days);
    let prior_from = window_start(recent_from, recent_days);
    let recent = mean(
        attempts
            .iter()
            .filter(|a| a.completed_at >= recent_from && a.completed_at <= now)
            .map(|a| f64::from(a.score)),
    );
    let prior = mean(
        attempts
            .iter()
            .filter(|a| a.completed_at >= prior_from && a.completed_at < recent_from)
            .map(|a| f64::from(a.score)),
    );
    match (recent, prior) {
        (Some(r), Some(p)) => (r - p).round() as i32,
        _ => 0,
    }
}

/// Build a progress snapshot from attempts. `category_of` maps a scenario id to
/// its category; attempts whose scenario is unknown still count toward the
/// overall and principle averages.
pub fn summarize<F>(
    attempts: &[Attempt],
    category_of: F,
    cfg: &AggregatorConfig,
    now: DateTime<Utc>,
) -> Progress
where
    F: Fn(&str) -> Option<Category>,
{
    let from = window_start(now, cfg.window_days);
    let in_window: Vec<&Attempt> = attempts
        .iter()
        .filter(|a| a.completed_at >= from && a.completed_at <= now)
        .collect();

    let overall = mean(in_window.iter().map(|a| f64::from(a.score))).unwrap_or(0.0);

    let mut principle_scores = PrincipleAdherence::default();
    for principle in Principle::ALL {
        let avg = mean(in_window.iter().map(|a| a.principle_adherence.get(principle)));
        principle_scores.set(principle, avg.unwrap_or(0.0).round());
    }

    let mut by_category: HashMap<Category, Vec<f64>> = HashMap::new();
    for a in &in_window {
        if let Some(category) = category_of(&a.scenario_id) {
            by_category
                .entry(category)
                .or_default()
                .push(f64::from(a.score));
        }
    }
    let mut category_scores = CategoryScores::default();
    for category in Category::ALL {
        let avg = by_category
            .get(&category)
            .and_then(|v| mean(v.iter().copied()))
            .unwrap_or(0.0);
        category_scores.set(category, avg.round());
    }

    Progress {
        overall_score: overall.round().clamp(0.0, 100.0) as u8,
        principle_scores,
        category_scores,
        total_attempts: in_window.len() as u64,
        recent_improvement: recent_improvement(attempts, cfg.recent_days, now),
        window_days: cfg.window_days,
        last_updated: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(scenario_id: &str, score: u8, age_days: i64, now: DateTime<Utc>) -> Attempt {
        Attempt {
            id: format!("{scenario_id}-{score}-{age_days}"),
            scenario_id: scenario_id.into(),
            score,
            principle_adherence: PrincipleAdherence::uniform(f64::from(score)),
            solution: String::new(),
            feedback: String::new(),
            improvement_areas: vec![],
            completed_at: now - Duration::days(age_days),
        }
    }

    fn category_of(id: &str) -> Option<Category> {
        match id {
            "a" => Some(Category::Algorithms),
            "t" => Some(Category::Testing),
            _ => None,
        }
    }

    #[test]
    fn three_attempts_average_to_eighty() {
        let now = Utc::now();
        let attempts = vec![
            attempt("a", 90, 1, now),
            attempt("a", 80, 2, now),
            attempt("t", 70, 3, now),
        ];
        let p = summarize(&attempts, category_of, &AggregatorConfig::default(), now);
        assert_eq!(p.overall_score, 80);
        assert_eq!(p.total_attempts, 3);
        assert_eq!(p.category_scores.algorithms, 85.0);
        assert_eq!(p.category_scores.testing, 70.0);
        assert_eq!(p.category_scores.debugging, 0.0);
        assert_eq!(p.principle_scores.security, 80.0);
    }

    #[test]
    fn attempts_outside_window_are_ignored() {
        let now = Utc::now();
        let attempts = vec![attempt("a", 90, 1, now), attempt("a", 10, 45, now)];
        let p = summarize(&attempts, category_of, &AggregatorConfig::default(), now);
        assert_eq!(p.overall_score, 90);
        assert_eq!(p.total_attempts, 1);
    }

    #[test]
    fn empty_window_reports_zeroes() {
        let now = Utc::now();
        let p = summarize(&[], category_of, &AggregatorConfig::default(), now);
        assert_eq!(p.overall_score, 0);
        assert_eq!(p.total_attempts, 0);
        assert_eq!(p.recent_improvement, 0);
        assert_eq!(p.principle_scores, PrincipleAdherence::default());
    }

    #[test]
    fn recent_improvement_compares_adjacent_windows() {
        let now = Utc::now();
        let attempts = vec![
            attempt("a", 90, 1, now),
            attempt("a", 80, 2, now),
            attempt("a", 70, 9, now),
            attempt("a", 60, 10, now),
        ];
        assert_eq!(recent_improvement(&attempts, 7, now), 20);
        assert_eq!(recent_improvement(&attempts[..2], 7, now), 0);
    }

    #[test]
    fn overall_rounds_half_up() {
        let now = Utc::now();
        let attempts = vec![attempt("a", 80, 0, now), attempt("a", 81, 0, now)];
        let p = summarize(&attempts, category_of, &AggregatorConfig::default(), now);
        assert_eq!(p.overall_score, 81);
    }
}
