//! Child-tuned SM-2 scheduler.
//!
//! Intervals are measured in hours and compressed to roughly 65% of the
//! adult SM-2 schedule, so young learners see words again sooner:
//!
//! | new level | interval |
//! |-----------|----------|
//! | first answer | 1 h |
//! | 1 | 6 h |
//! | 2 | 24 h |
//! | 3+ | `prior × ease × 0.65`, capped at 720 h |
//!
//! An incorrect answer drops one level, costs 0.2 ease and retries after 1 h.

use chrono::{DateTime, Duration, Utc};

use crate::mastery::{self, PointsContext};
use crate::sanitize::{clamp_ease_factor, clamp_interval_hours, response_time_signal};
use crate::types::{AnswerInput, AnswerOutcome, ProgressRecord, RewardParams, SchedulerParams};

/// Apply one answer with the default schedule and rewards.
pub fn apply_answer(
    prior: Option<&ProgressRecord>,
    answer: &AnswerInput,
    now: DateTime<Utc>,
) -> AnswerOutcome {
    apply_answer_with(
        prior,
        answer,
        now,
        &SchedulerParams::default(),
        &RewardParams::default(),
    )
}

/// Compute the next progress state and the points earned.
///
/// Pure: the result depends only on the arguments. `prior` is `None` when the
/// learner has never answered this word.
pub fn apply_answer_with(
    prior: Option<&ProgressRecord>,
    answer: &AnswerInput,
    now: DateTime<Utc>,
    params: &SchedulerParams,
    rewards: &RewardParams,
) -> AnswerOutcome {
    let response_time = response_time_signal(answer.response_time_seconds);

    let (total_attempts, total_correct, consecutive_correct, first_learned) = match prior {
        Some(p) => (
            p.total_attempts.saturating_add(1),
            p.total_correct.saturating_add(u32::from(answer.is_correct)),
            if answer.is_correct {
                p.consecutive_correct.saturating_add(1)
            } else {
                0
            },
            p.first_learned,
        ),
        None => (1, u32::from(answer.is_correct), u32::from(answer.is_correct), now),
    };

    let step = if answer.is_correct {
        correct_step(prior, response_time, params)
    } else {
        lapse_step(prior, params)
    };

    let success_rate = mastery::success_rate(total_correct, total_attempts);
    let is_learned = mastery::is_learned(step.level, success_rate, params);
    let was_learned = prior.is_some_and(|p| p.is_learned);
    let became_learned = is_learned && !was_learned;

    debug_assert!((params.min_ease..=params.max_ease).contains(&step.ease));
    debug_assert!(step.interval_hours >= 1);
    debug_assert!(total_attempts >= total_correct);

    let points_earned = mastery::points_for_answer(
        &PointsContext {
            is_correct: answer.is_correct,
            consecutive_correct,
            response_time_seconds: response_time,
            new_level: step.level,
            became_learned,
        },
        rewards,
    );

    let record = ProgressRecord {
        learner_id: answer.learner_id.clone(),
        word_id: answer.word_id.clone(),
        current_level: step.level,
        ease_factor: step.ease,
        interval_hours: step.interval_hours,
        last_reviewed: now,
        next_review: now + Duration::hours(i64::from(step.interval_hours)),
        consecutive_correct,
        total_attempts,
        total_correct,
        success_rate,
        first_learned,
        is_learned,
        version: prior.map_or(1, |p| p.version + 1),
    };

    AnswerOutcome {
        record,
        points_earned,
        became_learned,
    }
}

struct Step {
    level: u32,
    ease: f64,
    interval_hours: u32,
}

fn correct_step(
    prior: Option<&ProgressRecord>,
    response_time: Option<f64>,
    params: &SchedulerParams,
) -> Step {
    let Some(prior) = prior else {
        return Step {
            level: 1,
            ease: params.initial_ease,
            interval_hours: params.first_interval_hours.max(1),
        };
    };

    let level = prior.current_level.saturating_add(1);
    let ease = clamp_ease_factor(
        prior.ease_factor + ease_delta(response_time, params),
        params,
    );

    let interval_hours = match level {
        1 => params.level_one_interval_hours,
        2 => params.level_two_interval_hours,
        _ => clamp_interval_hours(
            prior.interval_hours as f64 * ease * params.compression,
            params,
        ),
    }
    .max(1);

    Step {
        level,
        ease,
        interval_hours,
    }
}

fn lapse_step(prior: Option<&ProgressRecord>, params: &SchedulerParams) -> Step {
    let (level, ease) = match prior {
        Some(p) => (p.current_level.saturating_sub(1), p.ease_factor),
        None => (0, params.initial_ease),
    };

    Step {
        level,
        ease: clamp_ease_factor(ease - params.lapse_ease_penalty, params),
        interval_hours: params.lapse_interval_hours.max(1),
    }
}

fn ease_delta(response_time: Option<f64>, params: &SchedulerParams) -> f64 {
    match response_time {
        Some(secs) if secs < params.fast_response_secs => params.fast_ease_bonus,
        Some(secs) if secs > params.slow_response_secs => -params.slow_ease_penalty,
        _ => 0.0,
    }
}
