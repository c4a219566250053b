//! Test Helper Utilities
//!
//! Shared fixtures for the percept-client integration tests

#![allow(dead_code)]

pub mod recording_backend;

pub use recording_backend::{PauseHandle, RecordingBackend};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

use percept_client::prefs::MemoryStore;
use percept_client::view::RefreshTarget;
use percept_client::PerceptionApp;
use percept_common::config::ClientConfig;
use percept_common::db::{NewProfession, NewRating, Profession, ProfessionStats};
use percept_common::Backend;

/// Client session over an in-memory database wrapped in a recording backend
pub async fn create_test_app() -> (Arc<RecordingBackend>, PerceptionApp) {
    let backend = Arc::new(RecordingBackend::in_memory().await);
    let app = PerceptionApp::new(
        backend.clone(),
        Arc::new(MemoryStore::new()),
        &ClientConfig::default(),
    );
    (backend, app)
}

/// Insert a profession directly, bypassing call recording
pub async fn seed_profession(backend: &RecordingBackend, category: &str, name: &str) -> Profession {
    backend
        .inner()
        .insert_profession(&NewProfession {
            category: category.to_string(),
            name: name.to_string(),
            description: None,
        })
        .await
        .expect("seed profession")
}

/// Insert ratings from distinct foreign devices and store the resulting
/// aggregates on the profession row
pub async fn seed_ratings(backend: &RecordingBackend, profession_id: Uuid, scores: &[i64]) -> ProfessionStats {
    for (i, score) in scores.iter().enumerate() {
        let device = format!("seed-device-{}", i);
        backend
            .inner()
            .insert_rating(&NewRating {
                profession_id,
                device_id: device.clone(),
                user_id: device,
                score: *score,
            })
            .await
            .expect("seed rating");
    }

    let stats = ProfessionStats {
        avg_rating: scores.iter().sum::<i64>() as f64 / scores.len().max(1) as f64,
        total_ratings: scores.len() as i64,
        comments_count: 0,
    };
    backend
        .inner()
        .update_profession_stats(profession_id, &stats)
        .await
        .expect("seed stats");
    stats
}

/// Drain every refresh request currently queued
pub fn drain_refresh(rx: &mut broadcast::Receiver<RefreshTarget>) -> Vec<RefreshTarget> {
    let mut targets = Vec::new();
    while let Ok(target) = rx.try_recv() {
        targets.push(target);
    }
    targets
}

/// Wait until a refresh request matching `predicate` arrives
pub async fn wait_for_refresh<F>(rx: &mut broadcast::Receiver<RefreshTarget>, predicate: F) -> RefreshTarget
where
    F: Fn(&RefreshTarget) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Ok(target) if predicate(&target) => return target,
                Ok(_) => continue,
                Err(e) => panic!("refresh channel failed: {}", e),
            }
        }
    })
    .await
    .expect("timed out waiting for refresh request")
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}
