//! Mastery and points derivation.
//!
//! These are the pieces of the scheduler that dashboards and reward logic
//! need on their own, without re-running a full update.

use chrono::{DateTime, Utc};

use crate::types::{ProgressRecord, RewardParams, SchedulerParams};

/// Percentage of correct answers, 0 when nothing was attempted.
pub fn success_rate(total_correct: u32, total_attempts: u32) -> f64 {
    if total_attempts == 0 {
        return 0.0;
    }
    total_correct as f64 / total_attempts as f64 * 100.0
}

/// A word is learned at level 4+ with at least 80% success.
pub fn is_learned(level: u32, success_rate: f64, params: &SchedulerParams) -> bool {
    level >= params.learned_min_level && success_rate >= params.learned_min_success_rate
}

/// Whether the record is due for review at `now`.
pub fn is_due(record: &ProgressRecord, now: DateTime<Utc>) -> bool {
    record.next_review <= now
}

/// Inputs of the points rule for one answer.
#[derive(Clone, Debug)]
pub struct PointsContext {
    pub is_correct: bool,
    pub consecutive_correct: u32,
    pub response_time_seconds: Option<f64>,
    pub new_level: u32,
    pub became_learned: bool,
}

/// Points earned for one answer. Incorrect answers always earn 0.
pub fn points_for_answer(ctx: &PointsContext, rewards: &RewardParams) -> u32 {
    if !ctx.is_correct {
        return 0;
    }

    let mut points = rewards.base_points;

    if ctx.consecutive_correct >= rewards.streak_threshold {
        points += rewards.streak_bonus;
    }

    if ctx
        .response_time_seconds
        .is_some_and(|secs| secs < rewards.quick_response_secs)
    {
        points += rewards.quick_bonus;
    }

    // Just started (or restarted) learning this word
    if ctx.new_level == 1 {
        points += rewards.new_word_bonus;
    }

    if ctx.became_learned {
        points += rewards.mastery_bonus;
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(is_correct: bool) -> PointsContext {
        PointsContext {
            is_correct,
            consecutive_correct: 1,
            response_time_seconds: None,
            new_level: 2,
            became_learned: false,
        }
    }

    #[test]
    fn test_success_rate() {
        assert_eq!(success_rate(0, 0), 0.0);
        assert_eq!(success_rate(3, 4), 75.0);
        assert_eq!(success_rate(5, 5), 100.0);
    }

    #[test]
    fn test_is_learned_threshold() {
        let params = SchedulerParams::default();
        assert!(is_learned(4, 80.0, &params));
        assert!(!is_learned(3, 100.0, &params));
        assert!(!is_learned(6, 79.9, &params));
    }

    #[test]
    fn test_base_points_only() {
        assert_eq!(points_for_answer(&ctx(true), &RewardParams::default()), 10);
    }

    #[test]
    fn test_incorrect_earns_nothing() {
        let mut c = ctx(false);
        c.consecutive_correct = 9;
        c.response_time_seconds = Some(1.0);
        c.new_level = 1;
        c.became_learned = true;
        assert_eq!(points_for_answer(&c, &RewardParams::default()), 0);
    }

    #[test]
    fn test_all_bonuses_stack() {
        let c = PointsContext {
            is_correct: true,
            consecutive_correct: 5,
            response_time_seconds: Some(4.9),
            new_level: 1,
            became_learned: true,
        };
        assert_eq!(points_for_answer(&c, &RewardParams::default()), 10 + 5 + 5 + 10 + 25);
    }

    #[test]
    fn test_quick_bonus_boundary() {
        let rewards = RewardParams::default();
        let mut c = ctx(true);
        c.response_time_seconds = Some(5.0);
        assert_eq!(points_for_answer(&c, &rewards), 10);
        c.response_time_seconds = Some(4.99);
        assert_eq!(points_for_answer(&c, &rewards), 15);
    }
}
