//! Data Sanitization
//!
//! Numerical guards for scheduler inputs and outputs.
//!
//! Functions:
//! - Response time validation
//! - Ease factor and interval clamping

use crate::types::SchedulerParams;

/// A usable latency is finite and strictly positive.
pub fn is_valid_response_time(seconds: f64) -> bool {
    seconds.is_finite() && seconds > 0.0
}

/// Drops latencies that carry no usable signal (NaN, infinite, zero, negative).
pub fn response_time_signal(seconds: Option<f64>) -> Option<f64> {
    seconds.filter(|&s| is_valid_response_time(s))
}

/// Clamp an ease factor into the configured range.
///
/// NaN collapses to the lower bound so a corrupted row can never widen intervals.
pub fn clamp_ease_factor(ease: f64, params: &SchedulerParams) -> f64 {
    if ease.is_nan() {
        return params.min_ease;
    }
    ease.clamp(params.min_ease, params.max_ease)
}

/// Round a fractional interval to whole hours within `[1, max_interval_hours]`.
pub fn clamp_interval_hours(hours: f64, params: &SchedulerParams) -> u32 {
    let max = params.max_interval_hours.max(1);
    if !hours.is_finite() {
        return if hours > 0.0 { max } else { 1 };
    }
    let rounded = hours.round();
    if rounded < 1.0 {
        1
    } else if rounded >= max as f64 {
        max
    } else {
        rounded as u32
    }
}
