//! Common Types and Constants
//!
//! Shared data structures used by the scheduler and the mastery helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==================== Constants ====================

/// Lower bound of the ease factor
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Upper bound of the ease factor
pub const MAX_EASE_FACTOR: f64 = 3.0;

/// Ease factor assigned to a word on its first answer
pub const INITIAL_EASE_FACTOR: f64 = 2.5;

/// Longest review interval (30 days)
pub const MAX_INTERVAL_HOURS: u32 = 720;

/// Shortest review interval
pub const MIN_INTERVAL_HOURS: u32 = 1;

/// Share of the adult SM-2 interval a child gets
pub const CHILD_COMPRESSION: f64 = 0.65;

// ==================== Parameters ====================

/// Tunable constants of the child-tuned SM-2 variant.
///
/// `Default` reproduces the production schedule; tests and simulations may
/// override individual fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerParams {
    pub initial_ease: f64,
    pub min_ease: f64,
    pub max_ease: f64,
    /// Correct answers faster than this raise the ease factor
    pub fast_response_secs: f64,
    /// Correct answers slower than this lower the ease factor
    pub slow_response_secs: f64,
    pub fast_ease_bonus: f64,
    pub slow_ease_penalty: f64,
    pub lapse_ease_penalty: f64,
    pub first_interval_hours: u32,
    pub level_one_interval_hours: u32,
    pub level_two_interval_hours: u32,
    pub lapse_interval_hours: u32,
    pub compression: f64,
    pub max_interval_hours: u32,
    pub learned_min_level: u32,
    pub learned_min_success_rate: f64,
}

impl Default for SchedulerParams {
    fn default() -> Self {
        Self {
            initial_ease: INITIAL_EASE_FACTOR,
            min_ease: MIN_EASE_FACTOR,
            max_ease: MAX_EASE_FACTOR,
            fast_response_secs: 3.0,
            slow_response_secs: 10.0,
            fast_ease_bonus: 0.1,
            slow_ease_penalty: 0.1,
            lapse_ease_penalty: 0.2,
            first_interval_hours: 1,
            level_one_interval_hours: 6,
            level_two_interval_hours: 24,
            lapse_interval_hours: 1,
            compression: CHILD_COMPRESSION,
            max_interval_hours: MAX_INTERVAL_HOURS,
            learned_min_level: 4,
            learned_min_success_rate: 80.0,
        }
    }
}

/// Point values handed to the gamification subsystem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardParams {
    pub base_points: u32,
    pub streak_threshold: u32,
    pub streak_bonus: u32,
    /// Correct answers faster than this earn the quick bonus
    pub quick_response_secs: f64,
    pub quick_bonus: u32,
    pub new_word_bonus: u32,
    pub mastery_bonus: u32,
}

impl Default for RewardParams {
    fn default() -> Self {
        Self {
            base_points: 10,
            streak_threshold: 5,
            streak_bonus: 5,
            quick_response_secs: 5.0,
            quick_bonus: 5,
            new_word_bonus: 10,
            mastery_bonus: 25,
        }
    }
}

// ==================== Records ====================

/// Scheduling state of one learner for one word.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub learner_id: String,
    pub word_id: String,
    pub current_level: u32,
    pub ease_factor: f64,
    pub interval_hours: u32,
    pub last_reviewed: DateTime<Utc>,
    pub next_review: DateTime<Utc>,
    pub consecutive_correct: u32,
    pub total_attempts: u32,
    pub total_correct: u32,
    /// Percentage in [0, 100], derived from the two counters
    pub success_rate: f64,
    pub first_learned: DateTime<Utc>,
    pub is_learned: bool,
    /// Optimistic concurrency counter, 1 after the first answer
    pub version: i64,
}

/// A single answer as seen by the scheduler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInput {
    pub learner_id: String,
    pub word_id: String,
    pub is_correct: bool,
    /// `None` means no latency signal
    pub response_time_seconds: Option<f64>,
}

/// Result of applying one answer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    pub record: ProgressRecord,
    pub points_earned: u32,
    /// `is_learned` flipped from false (or no record) to true
    pub became_learned: bool,
}
