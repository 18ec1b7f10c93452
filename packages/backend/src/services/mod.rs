pub mod activity;
pub mod progress;
pub mod review;
pub mod words;
