//! # wordsprout-algo - spaced-repetition core for young learners
//!
//! Pure Rust scheduling logic with no I/O:
//!
//! - [`scheduler`] - child-tuned SM-2 state transition (`apply_answer`)
//! - [`mastery`] - success rate, learned flag, due check and points
//! - [`sanitize`] - numerical guards for latencies, ease and intervals
//! - [`types`] - records, parameters and constants
//!
//! ## Example
//!
//! ```rust
//! use chrono::Utc;
//! use wordsprout_algo::{apply_answer, AnswerInput};
//!
//! let answer = AnswerInput {
//!     learner_id: "learner-1".to_string(),
//!     word_id: "word-1".to_string(),
//!     is_correct: true,
//!     response_time_seconds: Some(2.4),
//! };
//! let outcome = apply_answer(None, &answer, Utc::now());
//! assert_eq!(outcome.record.current_level, 1);
//! assert_eq!(outcome.record.interval_hours, 1);
//! ```

pub mod mastery;
pub mod sanitize;
pub mod scheduler;
pub mod types;

pub use types::*;

pub use mastery::{is_due, is_learned, points_for_answer, success_rate, PointsContext};

pub use scheduler::{apply_answer, apply_answer_with};
