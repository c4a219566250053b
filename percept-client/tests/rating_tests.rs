//! Rating submission: duplicate prevention, validation, re-entrancy,
//! failure handling and late results

mod helpers;

use helpers::{assert_close, create_test_app, drain_refresh, seed_profession, seed_ratings};
use percept_client::rating::{RatingOutcome, RatingState};
use percept_client::view::RefreshTarget;
use percept_client::ClientError;
use percept_common::db::NewRating;
use percept_common::Backend;

#[tokio::test]
async fn test_second_vote_from_same_device_is_already_voted() {
    let (backend, app) = create_test_app().await;
    let p = seed_profession(&backend, "tech", "Engineer").await;

    let first = app.ratings.submit(p.id, 50).await.expect("first vote");
    assert!(first.is_success());

    let second = app.ratings.submit(p.id, 100).await.expect("second vote");
    assert_eq!(second, RatingOutcome::AlreadyVoted);
    assert_eq!(app.ratings.state(), RatingState::AlreadyVoted);

    assert_eq!(backend.calls("insert_rating"), 1);
    assert_eq!(backend.inner().count_ratings().await.unwrap(), 1);
}

#[tokio::test]
async fn test_out_of_range_slider_never_reaches_backend() {
    let (backend, app) = create_test_app().await;
    let p = seed_profession(&backend, "tech", "Engineer").await;

    for slider in [-1, 101, 500] {
        let result = app.ratings.submit(p.id, slider).await;
        assert!(matches!(result, Err(ClientError::Validation(_))), "slider {}", slider);
    }
    assert_eq!(backend.total_calls(), 0);
}

#[tokio::test]
async fn test_success_recomputes_and_updates_cache() {
    let (backend, app) = create_test_app().await;
    let p = seed_profession(&backend, "tech", "Engineer").await;
    seed_ratings(&backend, p.id, &[1, 5]).await;
    app.directory.open_detail(p.id).await.expect("open detail");

    let mut refresh = app.refresh.subscribe();
    let outcome = app.ratings.submit(p.id, 50).await.expect("submit");

    match outcome {
        RatingOutcome::Submitted {
            score,
            stats,
            view_current,
        } => {
            assert_eq!(score, 3);
            assert_close(stats.avg_rating, 3.0);
            assert_eq!(stats.total_ratings, 3);
            assert!(view_current);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(app.ratings.state(), RatingState::Success);

    let cached = app.cache.get(p.id).await.expect("cached profession");
    assert_eq!(cached.total_ratings, 3);

    let stored = backend.inner().get_profession(p.id).await.unwrap().unwrap();
    assert_eq!(stored.total_ratings, 3);

    let targets = drain_refresh(&mut refresh);
    assert!(targets.contains(&RefreshTarget::ProfessionDetail(p.id)));
    assert!(targets.contains(&RefreshTarget::DashboardStats));
    assert!(targets.contains(&RefreshTarget::PopularProfessions));
}

#[tokio::test]
async fn test_resubmit_while_in_flight_is_rejected() {
    let (backend, app) = create_test_app().await;
    let p = seed_profession(&backend, "tech", "Engineer").await;

    let pause = backend.pause("find_ratings");
    let first = app.ratings.submit(p.id, 50);
    let second = async {
        pause.entered().await;
        assert!(app.ratings.is_submitting());
        let result = app.ratings.submit(p.id, 60).await;
        pause.release();
        result
    };

    let (first, second) = tokio::join!(first, second);
    assert!(first.expect("first submission").is_success());
    assert_eq!(second, Err(ClientError::InFlight));

    assert!(!app.ratings.is_submitting());
    assert_eq!(backend.calls("find_ratings"), 1);
}

#[tokio::test]
async fn test_failure_leaves_cache_untouched_and_allows_retry() {
    let (backend, app) = create_test_app().await;
    let p = seed_profession(&backend, "tech", "Engineer").await;
    app.directory.open_detail(p.id).await.expect("open detail");

    backend.fail("insert_rating");
    let result = app.ratings.submit(p.id, 75).await;
    assert!(matches!(result, Err(ClientError::Backend(_))), "got {:?}", result);
    assert!(result.unwrap_err().is_retryable());
    assert_eq!(app.ratings.state(), RatingState::Failed);
    assert!(!app.ratings.is_submitting());

    let cached = app.cache.get(p.id).await.expect("cached profession");
    assert_eq!(cached.total_ratings, 0);
    assert_eq!(backend.inner().count_ratings().await.unwrap(), 0);

    backend.recover("insert_rating");
    let retry = app.ratings.submit(p.id, 75).await.expect("retry");
    assert!(retry.is_success());
    assert_eq!(backend.calls("find_ratings"), 2);
}

#[tokio::test]
async fn test_failed_stats_write_is_repaired_on_next_submit() {
    let (backend, app) = create_test_app().await;
    let p = seed_profession(&backend, "tech", "Engineer").await;
    app.directory.open_detail(p.id).await.expect("open detail");

    backend.fail("update_profession_stats");
    let result = app.ratings.submit(p.id, 75).await;
    assert!(matches!(result, Err(ClientError::Backend(_))), "got {:?}", result);
    assert_eq!(backend.inner().count_ratings().await.unwrap(), 1);
    assert!(app.ratings.has_pending_stats(p.id).await);

    // Still failing: the vote is recognised but the repair stays owed
    let blocked = app.ratings.submit(p.id, 75).await;
    assert!(matches!(blocked, Err(ClientError::Backend(_))), "got {:?}", blocked);
    assert!(app.ratings.has_pending_stats(p.id).await);

    backend.recover("update_profession_stats");
    let mut refresh = app.refresh.subscribe();
    let again = app.ratings.submit(p.id, 75).await.expect("resubmit");
    assert_eq!(again, RatingOutcome::AlreadyVoted);
    assert!(!app.ratings.has_pending_stats(p.id).await);
    assert_eq!(backend.calls("insert_rating"), 1);

    let stored = backend.inner().get_profession(p.id).await.unwrap().unwrap();
    assert_eq!(stored.total_ratings, 1);
    assert_close(stored.avg_rating, 4.0);

    let cached = app.cache.get(p.id).await.expect("cached profession");
    assert_eq!(cached.total_ratings, 1);

    let targets = drain_refresh(&mut refresh);
    assert!(targets.contains(&RefreshTarget::ProfessionDetail(p.id)));
    assert!(targets.contains(&RefreshTarget::DashboardStats));
}

#[tokio::test]
async fn test_concurrent_vote_from_other_tab_is_already_voted() {
    let (backend, app) = create_test_app().await;
    let p = seed_profession(&backend, "tech", "Engineer").await;
    let device = app.device.get_or_create();

    let pause = backend.pause("insert_rating");
    let submit = app.ratings.submit(p.id, 50);
    let other_tab = async {
        pause.entered().await;
        backend
            .inner()
            .insert_rating(&NewRating {
                profession_id: p.id,
                device_id: device.as_str().to_string(),
                user_id: device.as_str().to_string(),
                score: 1,
            })
            .await
            .expect("other tab vote");
        pause.release();
    };

    let (outcome, ()) = tokio::join!(submit, other_tab);
    assert_eq!(outcome.expect("submit"), RatingOutcome::AlreadyVoted);
    assert_eq!(backend.calls("update_profession_stats"), 0);
}

#[tokio::test]
async fn test_late_result_does_not_refresh_closed_detail_view() {
    let (backend, app) = create_test_app().await;
    let a = seed_profession(&backend, "tech", "Engineer").await;
    let b = seed_profession(&backend, "arts", "Painter").await;
    app.directory.open_detail(a.id).await.expect("open a");

    let mut refresh = app.refresh.subscribe();
    let pause = backend.pause("insert_rating");
    let submit = app.ratings.submit(a.id, 100);
    let navigate = async {
        pause.entered().await;
        app.directory.open_detail(b.id).await.expect("open b");
        pause.release();
    };

    let (outcome, ()) = tokio::join!(submit, navigate);
    match outcome.expect("submit") {
        RatingOutcome::Submitted { view_current, .. } => assert!(!view_current),
        other => panic!("unexpected outcome {:?}", other),
    }

    let targets = drain_refresh(&mut refresh);
    assert!(!targets.contains(&RefreshTarget::ProfessionDetail(a.id)));
    assert!(targets.contains(&RefreshTarget::DashboardStats));

    // The cache is keyed by id, so the result still lands for profession A
    let cached = app.cache.get(a.id).await.expect("cached a");
    assert_eq!(cached.total_ratings, 1);
    assert_close(cached.avg_rating, 5.0);
}

#[tokio::test]
async fn test_state_transitions_are_observable() {
    let (backend, app) = create_test_app().await;
    let p = seed_profession(&backend, "tech", "Engineer").await;
    let mut states = app.ratings.watch_state();
    assert_eq!(*states.borrow_and_update(), RatingState::Idle);

    let pause = backend.pause("insert_rating");
    let submit = app.ratings.submit(p.id, 50);
    let observe = async {
        pause.entered().await;
        let seen = *states.borrow_and_update();
        pause.release();
        seen
    };

    let (outcome, seen) = tokio::join!(submit, observe);
    assert!(outcome.unwrap().is_success());
    assert_eq!(seen, RatingState::Submitting);
    assert_eq!(app.ratings.state(), RatingState::Success);
}
