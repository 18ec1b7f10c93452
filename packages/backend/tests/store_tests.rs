use chrono::{Duration, NaiveDate};

use wordsprout_backend::db::config::DbConfig;
use wordsprout_backend::db::ProgressStore;
use wordsprout_backend::services::activity;
use wordsprout_backend::services::progress::{
    self, AnswerEvent, LearningMode, ProgressError,
};
use wordsprout_backend::services::review;
use wordsprout_backend::services::words::{self, WordEntry};

mod common;

use common::{base_time, create_test_store};

fn entry(id: &str, word: &str) -> WordEntry {
    WordEntry {
        id: Some(id.to_string()),
        word: Some(word.to_string()),
    }
}

// ============================================================================
// Answer pipeline
// ============================================================================

#[tokio::test]
async fn test_first_answer_creates_record() {
    let env = create_test_store().await;
    let now = base_time();

    let event = AnswerEvent::new("kid-1", "apple", true).with_response_time(2.0);
    let recorded = progress::record_answer(&env.store, &event, now)
        .await
        .expect("record answer");

    assert_eq!(recorded.progress.current_level, 1);
    assert_eq!(recorded.progress.ease_factor, 2.5);
    assert_eq!(recorded.progress.interval_hours, 1);
    assert_eq!(recorded.progress.next_review, now + Duration::hours(1));
    assert_eq!(recorded.progress.version, 1);
    // 10 base + 5 quick + 10 new word
    assert_eq!(recorded.points_earned, 25);

    let stored = progress::get_progress(&env.store, "kid-1", "apple")
        .await
        .expect("get progress")
        .expect("record exists");
    assert_eq!(stored, recorded.progress);
}

#[tokio::test]
async fn test_answer_sequence_persists_schedule() {
    let env = create_test_store().await;
    let mut now = base_time();
    let mut intervals = Vec::new();

    for _ in 0..3 {
        let event = AnswerEvent::new("kid-1", "apple", true).with_response_time(2.0);
        let recorded = progress::record_answer(&env.store, &event, now)
            .await
            .expect("record answer");
        intervals.push(recorded.progress.interval_hours);
        now = recorded.progress.next_review;
    }

    assert_eq!(intervals, vec![1, 24, 42]);

    let stored = progress::get_progress(&env.store, "kid-1", "apple")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.current_level, 3);
    assert!((stored.ease_factor - 2.7).abs() < 1e-9);
    assert_eq!(stored.total_attempts, 3);
    assert_eq!(stored.version, 3);
}

#[tokio::test]
async fn test_incorrect_answer_resets_interval() {
    let env = create_test_store().await;
    let now = base_time();

    for _ in 0..2 {
        let event = AnswerEvent::new("kid-1", "apple", true);
        progress::record_answer(&env.store, &event, now).await.unwrap();
    }

    let miss = AnswerEvent::new("kid-1", "apple", false);
    let recorded = progress::record_answer(&env.store, &miss, now + Duration::hours(6))
        .await
        .unwrap();

    assert_eq!(recorded.points_earned, 0);
    assert_eq!(recorded.progress.current_level, 1);
    assert_eq!(recorded.progress.interval_hours, 1);
    assert_eq!(recorded.progress.consecutive_correct, 0);
    assert!((recorded.progress.ease_factor - 2.3).abs() < 1e-9);
    assert_eq!(recorded.progress.total_attempts, 3);
    assert_eq!(recorded.progress.total_correct, 2);
}

#[tokio::test]
async fn test_learners_are_isolated() {
    let env = create_test_store().await;
    let now = base_time();

    progress::record_answer(&env.store, &AnswerEvent::new("kid-1", "apple", true), now)
        .await
        .unwrap();

    let other = progress::get_progress(&env.store, "kid-2", "apple")
        .await
        .unwrap();
    assert!(other.is_none());
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn test_stale_expected_version_is_rejected() {
    let env = create_test_store().await;
    let now = base_time();

    let first = AnswerEvent::new("kid-1", "apple", true).with_expected_version(0);
    progress::record_answer(&env.store, &first, now).await.unwrap();

    // Duplicate submit still carrying the version it read before the first write
    let duplicate = AnswerEvent::new("kid-1", "apple", true).with_expected_version(0);
    let err = progress::record_answer(&env.store, &duplicate, now)
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressError::Conflict(_)));
    assert!(err.is_retryable());

    let stored = progress::get_progress(&env.store, "kid-1", "apple")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.total_attempts, 1);
    assert_eq!(stored.version, 1);

    let stats = activity::daily_stats(&env.store, "kid-1", now.date_naive())
        .await
        .unwrap();
    assert_eq!(stats.attempts, 1);
}

#[tokio::test]
async fn test_concurrent_duplicates_apply_at_most_once_each() {
    let env = create_test_store().await;
    let now = base_time();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = env.store.clone();
        handles.push(tokio::spawn(async move {
            let event = AnswerEvent::new("kid-1", "apple", true).with_expected_version(0);
            progress::record_answer(&store, &event, now).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => successes += 1,
            Err(err) => assert!(err.is_retryable(), "unexpected error: {err}"),
        }
    }
    assert_eq!(successes, 1);

    let stored = progress::get_progress(&env.store, "kid-1", "apple")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.total_attempts, 1);
    assert_eq!(stored.current_level, 1);
}

#[tokio::test]
async fn test_different_words_proceed_independently() {
    let env = create_test_store().await;
    let now = base_time();

    let mut handles = Vec::new();
    for word in ["apple", "banana", "cherry", "date"] {
        let store = env.store.clone();
        handles.push(tokio::spawn(async move {
            let event = AnswerEvent::new("kid-1", word, true);
            let mut attempt = 0;
            loop {
                match progress::record_answer(&store, &event, now).await {
                    Ok(recorded) => return recorded,
                    Err(err) if err.is_retryable() && attempt < 5 => attempt += 1,
                    Err(err) => panic!("answer failed: {err}"),
                }
            }
        }));
    }

    for handle in handles {
        let recorded = handle.await.unwrap();
        assert_eq!(recorded.progress.version, 1);
    }

    let summary = review::mastery_summary(&env.store, "kid-1", now).await.unwrap();
    assert_eq!(summary.tracked_words, 4);
}

#[tokio::test]
async fn test_store_timeout_rolls_back_answer() {
    let env = create_test_store().await;
    let now = base_time();

    let config = DbConfig {
        store_timeout: std::time::Duration::from_millis(200),
        ..DbConfig::for_path(env.dir.path().join("progress.db"))
    };
    let impatient = ProgressStore::connect(config).await.expect("second handle");

    // Hold the write lock from another connection
    let mut writer = env.store.pool().acquire().await.expect("acquire");
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut *writer)
        .await
        .expect("take write lock");

    let event = AnswerEvent::new("kid-1", "apple", true);
    let err = progress::record_answer(&impatient, &event, now)
        .await
        .unwrap_err();
    assert!(
        matches!(err, ProgressError::Timeout(_) | ProgressError::Conflict(_)),
        "unexpected error: {err}"
    );
    assert!(err.is_retryable());

    sqlx::query("ROLLBACK")
        .execute(&mut *writer)
        .await
        .expect("release write lock");
    drop(writer);

    let stored = progress::get_progress(&env.store, "kid-1", "apple")
        .await
        .unwrap();
    assert!(stored.is_none());

    let logged: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "activity_log""#)
        .fetch_one(env.store.pool())
        .await
        .unwrap();
    assert_eq!(logged, 0);

    // The same answer goes through once the lock is gone
    let recorded = progress::record_answer(&impatient, &event, now).await.unwrap();
    assert_eq!(recorded.progress.version, 1);
}

// ============================================================================
// Review selection
// ============================================================================

#[tokio::test]
async fn test_selector_returns_new_and_overdue_but_not_future() {
    let env = create_test_store().await;
    let now = base_time();

    words::register_words(
        &env.store,
        &[entry("A", "ant"), entry("B", "bee"), entry("C", "cat")],
        now,
    )
    .await
    .unwrap();

    // B: reviewed two hours ago with a 1h interval, so due an hour ago
    let b = AnswerEvent::new("kid-1", "B", true);
    progress::record_answer(&env.store, &b, now - Duration::hours(2))
        .await
        .unwrap();

    // C: reviewed now, next review an hour from now
    let c = AnswerEvent::new("kid-1", "C", true);
    progress::record_answer(&env.store, &c, now).await.unwrap();

    let due = review::select_due_words(&env.store, "kid-1", 10, now)
        .await
        .unwrap();
    let ids: Vec<&str> = due.iter().map(|w| w.word_id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);

    assert!(due[0].is_new);
    assert_eq!(due[0].next_review, None);
    assert_eq!(due[0].word.as_deref(), Some("ant"));
    assert!(!due[1].is_new);
    assert_eq!(due[1].next_review, Some(now - Duration::hours(1)));
    assert_eq!(due[0].current_level, None);
    assert_eq!(due[1].current_level, Some(1));
}

#[tokio::test]
async fn test_selector_orders_and_limits() {
    let env = create_test_store().await;
    let now = base_time();

    words::register_words(&env.store, &[entry("n2", "new two"), entry("n1", "new one")], now)
        .await
        .unwrap();

    for (word, hours_ago) in [("w-late", 2), ("w-early", 10), ("w-tie-b", 5), ("w-tie-a", 5)] {
        let event = AnswerEvent::new("kid-1", word, false);
        progress::record_answer(&env.store, &event, now - Duration::hours(hours_ago))
            .await
            .unwrap();
    }

    let due = review::select_due_words(&env.store, "kid-1", 20, now)
        .await
        .unwrap();
    let ids: Vec<&str> = due.iter().map(|w| w.word_id.as_str()).collect();
    assert_eq!(ids, vec!["n1", "n2", "w-early", "w-tie-a", "w-tie-b", "w-late"]);

    let limited = review::select_due_words(&env.store, "kid-1", 3, now)
        .await
        .unwrap();
    assert_eq!(limited.len(), 3);
    assert_eq!(limited[2].word_id, "w-early");

    // Words answered for without a catalog entry are still selectable
    assert!(due.iter().all(|w| w.word_id.starts_with('n') || w.word.is_none()));
}

#[tokio::test]
async fn test_selector_is_read_only_and_exact_boundary_is_due() {
    let env = create_test_store().await;
    let now = base_time();

    let recorded = progress::record_answer(&env.store, &AnswerEvent::new("kid-1", "apple", true), now)
        .await
        .unwrap();
    let due_at = recorded.progress.next_review;

    let before = review::select_due_words(&env.store, "kid-1", 10, due_at - Duration::milliseconds(1))
        .await
        .unwrap();
    assert!(before.is_empty());

    let at = review::select_due_words(&env.store, "kid-1", 10, due_at)
        .await
        .unwrap();
    assert_eq!(at.len(), 1);

    let stored = progress::get_progress(&env.store, "kid-1", "apple")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, recorded.progress);
}

#[tokio::test]
async fn test_catalog_word_disappears_from_new_after_first_answer() {
    let env = create_test_store().await;
    let now = base_time();

    words::register_words(&env.store, &[entry("apple", "apple")], now)
        .await
        .unwrap();
    progress::record_answer(&env.store, &AnswerEvent::new("kid-1", "apple", true), now)
        .await
        .unwrap();

    let due = review::select_due_words(&env.store, "kid-1", 10, now)
        .await
        .unwrap();
    assert!(due.is_empty());

    // Another learner still sees it as new
    let other = review::select_due_words(&env.store, "kid-2", 10, now)
        .await
        .unwrap();
    assert_eq!(other.len(), 1);
    assert!(other[0].is_new);
}

// ============================================================================
// Activity and summaries
// ============================================================================

#[tokio::test]
async fn test_daily_stats_group_by_mode_and_day() {
    let env = create_test_store().await;
    let now = base_time();

    let quiz = AnswerEvent::new("kid-1", "apple", true)
        .with_mode(LearningMode::Quiz)
        .with_response_time(2.0);
    progress::record_answer(&env.store, &quiz, now).await.unwrap();

    let spelling = AnswerEvent::new("kid-1", "banana", false).with_mode(LearningMode::Spelling);
    progress::record_answer(&env.store, &spelling, now + Duration::minutes(5))
        .await
        .unwrap();

    let again = AnswerEvent::new("kid-1", "apple", true).with_mode(LearningMode::Quiz);
    progress::record_answer(&env.store, &again, now + Duration::minutes(10))
        .await
        .unwrap();

    // Next day, excluded
    let tomorrow = AnswerEvent::new("kid-1", "cherry", true);
    progress::record_answer(&env.store, &tomorrow, now + Duration::days(1))
        .await
        .unwrap();

    let stats = activity::daily_stats(&env.store, "kid-1", NaiveDate::from_ymd_opt(2024, 9, 2).unwrap())
        .await
        .unwrap();

    assert_eq!(stats.attempts, 3);
    assert_eq!(stats.correct, 2);
    assert_eq!(stats.words_studied, 2);
    assert!((stats.accuracy - 200.0 / 3.0).abs() < 1e-9);
    // first quiz answer: 10 base + 5 quick + 10 new word; second: 10 base
    assert_eq!(stats.points_earned, 35);
    assert_eq!(stats.by_mode["quiz"].attempts, 2);
    assert_eq!(stats.by_mode["spelling"].correct, 0);
    assert!(!stats.by_mode.contains_key("review"));
}

#[tokio::test]
async fn test_daily_stats_empty_day() {
    let env = create_test_store().await;
    let stats = activity::daily_stats(&env.store, "kid-1", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        .await
        .unwrap();
    assert_eq!(stats.attempts, 0);
    assert_eq!(stats.accuracy, 0.0);
    assert!(stats.by_mode.is_empty());
}

#[tokio::test]
async fn test_daily_stats_rejects_last_representable_day() {
    let env = create_test_store().await;
    let err = activity::daily_stats(&env.store, "kid-1", NaiveDate::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressError::Validation(_)));
}

#[tokio::test]
async fn test_mastery_summary_counts_learned_words() {
    let env = create_test_store().await;
    let mut now = base_time();

    for _ in 0..4 {
        let event = AnswerEvent::new("kid-1", "apple", true).with_response_time(6.0);
        let recorded = progress::record_answer(&env.store, &event, now).await.unwrap();
        now = recorded.progress.next_review;
    }
    progress::record_answer(&env.store, &AnswerEvent::new("kid-1", "banana", false), base_time())
        .await
        .unwrap();

    // apple is due exactly at `now`; look just before it
    let summary = review::mastery_summary(&env.store, "kid-1", now - Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(summary.tracked_words, 2);
    assert_eq!(summary.learned_words, 1);
    assert_eq!(summary.due_words, 1);
    assert!((summary.average_success_rate - 50.0).abs() < 1e-9);
    // 20 + 10 + 10 + 35 for apple, nothing for the miss
    assert_eq!(summary.total_points, 75);
}

#[tokio::test]
async fn test_register_words_validates_input() {
    let env = create_test_store().await;
    let now = base_time();

    let err = words::register_words(&env.store, &[], now).await.unwrap_err();
    assert!(matches!(err, ProgressError::Validation(_)));

    let blank = WordEntry { id: Some("  ".to_string()), word: None };
    let err = words::register_words(&env.store, &[blank], now).await.unwrap_err();
    assert!(matches!(err, ProgressError::Validation(_)));

    let written = words::register_words(&env.store, &[entry("a", "ant"), entry("a", "ants")], now)
        .await
        .unwrap();
    assert_eq!(written, 2);

    let due = review::select_due_words(&env.store, "kid-1", 10, now).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].word.as_deref(), Some("ants"));
}
