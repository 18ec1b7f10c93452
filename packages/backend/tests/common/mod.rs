#![allow(dead_code)]

use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use wordsprout_backend::config::Config;
use wordsprout_backend::db::config::DbConfig;
use wordsprout_backend::db::ProgressStore;
use wordsprout_backend::state::AppState;

/// A store on a throwaway SQLite file. Keep the `TempDir` alive for the test.
pub struct TestStore {
    pub dir: TempDir,
    pub store: ProgressStore,
}

pub async fn create_test_store() -> TestStore {
    let dir = TempDir::new().expect("failed to create temp dir");
    let config = DbConfig::for_path(dir.path().join("progress.db"));
    let store = ProgressStore::connect(config)
        .await
        .expect("failed to open progress store");
    TestStore { dir, store }
}

pub async fn create_test_app() -> (TestStore, Router) {
    let test_store = create_test_store().await;
    let state = AppState::new(test_store.store.clone(), Config::default());
    let app = wordsprout_backend::create_app(state);
    (test_store, app)
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap()
}
