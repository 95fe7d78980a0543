//! Queue engine behaviour against a scripted backend.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use common::{calls_by_target, engine_with, png, queued_engine, target, FakeBackend, API_KEY};
use swapdeck_client::blob::ImageBlob;
use swapdeck_client::engine::{Phase, QueueEngine, QueueEvent, CLEAR_ALL_PROMPT};
use swapdeck_client::error::{ClientError, QueueError};
use swapdeck_client::queue::ItemStatus;
use swapdeck_client::session::SessionStore;
use swapdeck_core::dimensions::Dimensions;
use swapdeck_core::error::CoreError;
use swapdeck_core::generation::{GenerationResponse, VariationResult};
use tokio::sync::Semaphore;

async fn run_all(engine: &QueueEngine) {
    for handle in engine.process_all_remaining().await.unwrap() {
        handle.await.unwrap();
    }
}

// ---------------------------------------------------------------------------
// Test: 2 targets x 3 variations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn two_targets_three_variations_complete() {
    let backend = Arc::new(FakeBackend::succeeding());
    let (engine, ids) = queued_engine(backend.clone(), &["a.jpg", "b.jpg"], 3).await;
    engine.set_dimensions(Dimensions::new(3072, 4096).unwrap()).await;

    run_all(&engine).await;

    for id in &ids {
        let item = engine.item(*id).await.unwrap();
        assert_eq!(item.status, ItemStatus::Complete);
        assert_eq!(item.results.len(), 3);
        assert!(item.results.iter().all(VariationResult::is_success));
        assert_eq!(item.progress.completed, 3);
        assert_eq!(item.status_text(), "COMPLETE");
    }

    let calls = backend.calls();
    assert_eq!(calls.len(), 6);
    assert_eq!(calls_by_target(&calls)["a.jpg"], 3);
    assert!(calls.iter().all(|c| c.api_key == API_KEY));
    assert!(calls.iter().all(|c| c.face == "face.png"));
    assert!(calls.iter().all(|c| c.dimensions.to_string() == "3072*4096"));

    let stats = engine.stats().await;
    assert_eq!(stats.complete, 2);
    assert_eq!(stats.ready, 0);
    assert_eq!(stats.total_variations, 6);
}

// ---------------------------------------------------------------------------
// Test: failures are recorded and the loop continues
// ---------------------------------------------------------------------------

#[tokio::test]
async fn timeout_on_second_variation_is_recorded_as_failure() {
    let backend = Arc::new(FakeBackend::new(|call| {
        if call.attempt == 1 {
            Err(ClientError::Timeout(Duration::from_secs(300)))
        } else {
            Ok(GenerationResponse::succeeded(format!("https://cdn.test/{}", call.seq)))
        }
    }));
    let (engine, ids) = queued_engine(backend.clone(), &["a.jpg"], 3).await;

    run_all(&engine).await;

    let item = engine.item(ids[0]).await.unwrap();
    assert_eq!(item.status, ItemStatus::Complete);
    assert_eq!(item.results.len(), 3);
    assert!(item.results[0].is_success());
    assert_matches!(
        &item.results[1],
        VariationResult::Failure { message } if message.starts_with("Request timed out")
    );
    assert!(item.results[2].is_success());
    assert_eq!(backend.call_count(), 3);
}

#[tokio::test]
async fn item_completes_even_when_every_attempt_fails() {
    let backend = Arc::new(FakeBackend::new(|_| {
        Err(ClientError::Timeout(Duration::from_secs(300)))
    }));
    let (engine, ids) = queued_engine(backend.clone(), &["a.jpg"], 3).await;
    let mut events = engine.subscribe();

    run_all(&engine).await;

    let item = engine.item(ids[0]).await.unwrap();
    assert_eq!(item.status, ItemStatus::Complete);
    assert_eq!(item.status_text(), "COMPLETE");
    assert_eq!(item.results.len(), item.variation_count as usize);
    assert_eq!(item.progress.completed, 3);
    assert!(item.results.iter().all(|r| matches!(
        r,
        VariationResult::Failure { message } if message.starts_with("Request timed out")
    )));
    assert_eq!(backend.call_count(), 3);

    let stats = engine.stats().await;
    assert_eq!(stats.complete, 1);
    assert_eq!(stats.failed_variations, 3);

    let mut finished = None;
    while let Ok(event) = events.try_recv() {
        if let QueueEvent::ItemFinished { succeeded, failed, .. } = event {
            finished = Some((succeeded, failed));
        }
    }
    assert_eq!(finished, Some((0, 3)));
}

#[tokio::test]
async fn upstream_rejections_are_recorded_with_their_message() {
    let backend = Arc::new(FakeBackend::new(|_| {
        Err(ClientError::Api {
            status: 502,
            message: "Invalid API key".into(),
        })
    }));
    let (engine, ids) = queued_engine(backend, &["a.jpg"], 2).await;

    run_all(&engine).await;

    let item = engine.item(ids[0]).await.unwrap();
    assert_eq!(item.status, ItemStatus::Complete);
    assert_eq!(
        item.results,
        vec![
            VariationResult::failure("Invalid API key"),
            VariationResult::failure("Invalid API key"),
        ]
    );
}

#[tokio::test]
async fn capacity_rejection_and_unsuccessful_reply_become_failures() {
    let backend = Arc::new(FakeBackend::new(|call| match call.attempt {
        0 => Err(ClientError::Capacity {
            message: "Server at capacity (3/3). Please wait and try again.".into(),
            active_requests: 3,
            max_concurrent: 3,
        }),
        1 => Ok(GenerationResponse {
            success: false,
            output_url: None,
            error: Some("NSFW content detected".into()),
        }),
        _ => Ok(GenerationResponse::succeeded("https://cdn.test/ok")),
    }));
    let (engine, ids) = queued_engine(backend, &["a.jpg"], 3).await;

    run_all(&engine).await;

    let item = engine.item(ids[0]).await.unwrap();
    assert_eq!(item.status, ItemStatus::Complete);
    assert_eq!(
        item.results,
        vec![
            VariationResult::failure("Server at capacity (3/3). Please wait and try again."),
            VariationResult::failure("NSFW content detected"),
            VariationResult::success("https://cdn.test/ok"),
        ]
    );
}

// ---------------------------------------------------------------------------
// Test: progress is monotonic and ends at variation_count
// ---------------------------------------------------------------------------

#[tokio::test]
async fn progress_events_are_monotonic() {
    let backend = Arc::new(FakeBackend::succeeding());
    let (engine, ids) = queued_engine(backend, &["a.jpg"], 4).await;
    let mut events = engine.subscribe();

    let handle = engine.generate(ids[0]).await.unwrap();
    handle.await.unwrap();

    let mut completed = Vec::new();
    let mut finished = None;
    while let Ok(event) = events.try_recv() {
        match event {
            QueueEvent::ItemStarted { id, total } => {
                assert_eq!(id, ids[0]);
                assert_eq!(total, 4);
            }
            QueueEvent::VariationRecorded { completed: c, total, .. } => {
                assert_eq!(total, 4);
                completed.push(c);
            }
            QueueEvent::ItemFinished { succeeded, failed, .. } => {
                finished = Some((succeeded, failed))
            }
            QueueEvent::QueueChanged => {}
        }
    }
    assert_eq!(completed, [1, 2, 3, 4]);
    assert_eq!(finished, Some((4, 0)));
}

// ---------------------------------------------------------------------------
// Test: regeneration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn regenerate_clears_results_and_restarts_at_zero() {
    let backend = Arc::new(FakeBackend::succeeding());
    let (engine, ids) = queued_engine(backend.clone(), &["a.jpg"], 3).await;
    run_all(&engine).await;
    let first = engine.item(ids[0]).await.unwrap().results;

    // Only finished items can be regenerated; Ready ones cannot.
    let handle = engine.regenerate(ids[0]).await.unwrap();
    handle.await.unwrap();

    let item = engine.item(ids[0]).await.unwrap();
    assert_eq!(item.status, ItemStatus::Complete);
    assert_eq!(item.results.len(), 3);
    assert_eq!(
        item.success_urls().collect::<Vec<_>>(),
        ["https://cdn.test/a.jpg/3", "https://cdn.test/a.jpg/4", "https://cdn.test/a.jpg/5"]
    );
    assert_ne!(item.results, first);
    assert_eq!(backend.call_count(), 6);
}

#[tokio::test]
async fn regenerate_needs_a_finished_item() {
    let backend = Arc::new(FakeBackend::succeeding());
    let (engine, ids) = queued_engine(backend, &["a.jpg"], 1).await;

    assert_matches!(
        engine.regenerate(ids[0]).await,
        Err(QueueError::InvalidState { status: "ready", .. })
    );
}

#[tokio::test]
async fn all_failed_item_can_be_regenerated() {
    let backend = Arc::new(FakeBackend::new(|call| {
        if call.seq < 2 {
            Err(ClientError::Timeout(Duration::from_secs(1)))
        } else {
            Ok(GenerationResponse::succeeded("https://cdn.test/second-try"))
        }
    }));
    let (engine, ids) = queued_engine(backend, &["a.jpg"], 2).await;
    run_all(&engine).await;
    let failed = engine.item(ids[0]).await.unwrap();
    assert_eq!(failed.status, ItemStatus::Complete);
    assert_eq!(failed.success_count(), 0);

    engine.regenerate(ids[0]).await.unwrap().await.unwrap();

    let item = engine.item(ids[0]).await.unwrap();
    assert_eq!(item.status, ItemStatus::Complete);
    assert_eq!(item.success_count(), 2);
}

// ---------------------------------------------------------------------------
// Test: one loop per item
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_generate_on_processing_item_is_rejected() {
    let gate = Arc::new(Semaphore::new(0));
    let backend = Arc::new(FakeBackend::succeeding().gated(gate.clone()));
    let (engine, ids) = queued_engine(backend.clone(), &["a.jpg"], 2).await;

    let handle = engine.generate(ids[0]).await.unwrap();
    assert_eq!(engine.item(ids[0]).await.unwrap().status_text(), "PROCESSING 0/2");
    assert_matches!(
        engine.generate(ids[0]).await,
        Err(QueueError::InvalidState { status: "processing", .. })
    );
    assert_matches!(engine.process_all_remaining().await, Err(QueueError::NothingReady));

    gate.add_permits(10);
    handle.await.unwrap();
    assert_eq!(backend.call_count(), 2);
}

// ---------------------------------------------------------------------------
// Test: removal while processing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn removal_during_processing_stops_further_variations() {
    let gate = Arc::new(Semaphore::new(0));
    let backend = Arc::new(FakeBackend::succeeding().gated(gate.clone()));
    let (engine, ids) = queued_engine(backend.clone(), &["a.jpg"], 3).await;

    let handle = engine.generate(ids[0]).await.unwrap();
    backend.wait_for_calls(1).await;

    assert_eq!(engine.remove(ids[0]).await.unwrap(), Phase::Setup);
    gate.add_permits(10);
    handle.await.unwrap();

    assert_eq!(backend.call_count(), 1);
    assert!(engine.items().await.is_empty());
}

// ---------------------------------------------------------------------------
// Test: validation before any network call
// ---------------------------------------------------------------------------

#[tokio::test]
async fn oversized_face_reference_rejected_before_any_call() {
    let backend = Arc::new(FakeBackend::succeeding());
    let session = Arc::new(SessionStore::new());
    session.sign_in("tester", API_KEY).await;
    let engine = QueueEngine::new(session, backend.clone());

    let oversized = ImageBlob::new("big.png", png(2_200_000));
    let err = engine.set_face_reference(oversized).await.unwrap_err();
    assert_matches!(
        &err,
        QueueError::Core(CoreError::PayloadTooLarge(msg))
            if msg.starts_with("FILE TOO LARGE! Maximum allowed: 1.91MB")
                && msg.contains("Your file size: 2.10MB")
    );

    assert!(engine.face_reference().await.is_none());
    engine.add_targets(vec![target("a.jpg")]).await;
    assert!(!engine.can_create_queue().await);
    assert_matches!(engine.create_queue(3).await, Err(QueueError::NoFaceReference));
    assert!(engine.items().await.is_empty());
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn create_queue_requires_an_api_key() {
    let backend = Arc::new(FakeBackend::succeeding());
    let engine = engine_with(backend).await;
    engine.add_targets(vec![target("a.jpg")]).await;
    engine.session().logout().await;

    let err = engine.create_queue(3).await.unwrap_err();
    assert_matches!(err, QueueError::NotAuthorized);
    assert_eq!(err.to_string(), "PLEASE AUTHORIZE YOUR API KEY FIRST");
    assert_eq!(engine.pending_targets().await, ["a.jpg"]);
}

#[tokio::test]
async fn create_queue_needs_targets_and_sane_count() {
    let backend = Arc::new(FakeBackend::succeeding());
    let engine = engine_with(backend).await;
    assert_matches!(engine.create_queue(3).await, Err(QueueError::NoTargets));

    engine.add_targets(vec![target("a.jpg"), target("b.jpg")]).await;
    assert_matches!(
        engine.create_queue(0).await,
        Err(QueueError::Core(CoreError::Validation(_)))
    );

    assert_eq!(engine.remove_target(0).await.unwrap().name, "a.jpg");
    assert_matches!(engine.remove_target(5).await, Err(QueueError::TargetIndex(5)));
    assert!(engine.can_create_queue().await);
    assert_eq!(engine.create_queue(2).await.unwrap().len(), 1);
    assert!(engine.pending_targets().await.is_empty());
    assert_eq!(engine.phase().await, Phase::Queue);
}

#[tokio::test]
async fn process_all_with_nothing_ready() {
    let backend = Arc::new(FakeBackend::succeeding());
    let (engine, _) = queued_engine(backend, &["a.jpg"], 1).await;
    run_all(&engine).await;

    let err = engine.process_all_remaining().await.unwrap_err();
    assert_eq!(err.to_string(), "NO ROWS READY TO PROCESS");
}

// ---------------------------------------------------------------------------
// Test: bulk operations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_selected_asks_and_preserves_order() {
    let backend = Arc::new(FakeBackend::succeeding());
    let (engine, ids) = queued_engine(backend, &["a", "b", "c", "d"], 1).await;
    engine.toggle_selected(ids[0]).await.unwrap();
    engine.toggle_selected(ids[2]).await.unwrap();

    let mut asked = String::new();
    let deleted = engine
        .delete_selected(|prompt| {
            asked = prompt.to_string();
            false
        })
        .await;
    assert_eq!(deleted, 0);
    assert_eq!(asked, "DELETE 2 SELECTED ROWS?");
    assert_eq!(engine.items().await.len(), 4);

    assert_eq!(engine.delete_selected(|_| true).await, 2);
    let names: Vec<_> = engine.items().await.into_iter().map(|i| i.target.name).collect();
    assert_eq!(names, ["b", "d"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn selection_is_frozen_while_delete_prompt_is_open() {
    let backend = Arc::new(FakeBackend::succeeding());
    let (engine, ids) = queued_engine(backend, &["a", "b", "c", "d"], 1).await;
    engine.toggle_selected(ids[0]).await.unwrap();
    engine.toggle_selected(ids[1]).await.unwrap();

    let toggler = engine.clone();
    let late_id = ids[2];
    let mut toggle = None;
    let mut asked = String::new();
    let deleted = engine
        .delete_selected(|prompt| {
            asked = prompt.to_string();
            // Another task selects "c" while the prompt is up.
            toggle = Some(tokio::spawn(async move {
                toggler.toggle_selected(late_id).await
            }));
            std::thread::sleep(Duration::from_millis(100));
            true
        })
        .await;

    assert_eq!(asked, "DELETE 2 SELECTED ROWS?");
    assert_eq!(deleted, 2);

    // The late toggle lands after the deletion.
    assert!(toggle.unwrap().await.unwrap().unwrap());
    let items = engine.items().await;
    let names: Vec<_> = items.iter().map(|i| i.target.name.as_str()).collect();
    assert_eq!(names, ["c", "d"]);
    assert!(items[0].selected);
}

#[tokio::test]
async fn select_all_toggles_every_item() {
    let backend = Arc::new(FakeBackend::succeeding());
    let (engine, _) = queued_engine(backend, &["a", "b"], 1).await;

    engine.select_all().await;
    assert!(engine.items().await.iter().all(|i| i.selected));
    engine.select_all().await;
    assert!(engine.items().await.iter().all(|i| !i.selected));
}

#[tokio::test]
async fn add_more_uses_first_items_variation_count() {
    let backend = Arc::new(FakeBackend::succeeding());
    let (engine, _) = queued_engine(backend, &["a"], 5).await;

    let added = engine.add_more(vec![target("b"), target("c")]).await;
    assert_eq!(added.len(), 2);
    for id in added {
        let item = engine.item(id).await.unwrap();
        assert_eq!(item.variation_count, 5);
        assert_eq!(item.status, ItemStatus::Ready);
    }
}

#[tokio::test]
async fn clear_all_confirms_then_resets_to_setup() {
    let backend = Arc::new(FakeBackend::succeeding());
    let (engine, _) = queued_engine(backend, &["a", "b"], 1).await;
    engine.add_targets(vec![target("pending")]).await;

    assert!(!engine.clear_all(|_| false).await);
    assert_eq!(engine.phase().await, Phase::Queue);

    let mut asked = String::new();
    assert!(
        engine
            .clear_all(|prompt| {
                asked = prompt.to_string();
                true
            })
            .await
    );
    assert_eq!(asked, CLEAR_ALL_PROMPT);
    assert_eq!(engine.phase().await, Phase::Setup);
    assert!(engine.pending_targets().await.is_empty());
}

#[tokio::test]
async fn removing_the_last_item_returns_to_setup() {
    let backend = Arc::new(FakeBackend::succeeding());
    let (engine, ids) = queued_engine(backend, &["a", "b"], 1).await;

    assert_eq!(engine.remove(ids[0]).await.unwrap(), Phase::Queue);
    assert_eq!(engine.remove(ids[1]).await.unwrap(), Phase::Setup);
    assert_matches!(engine.remove(ids[1]).await, Err(QueueError::ItemNotFound(_)));
}

// ---------------------------------------------------------------------------
// Test: settings are read fresh per attempt
// ---------------------------------------------------------------------------

#[tokio::test]
async fn key_change_applies_to_next_attempt() {
    let gate = Arc::new(Semaphore::new(0));
    let backend = Arc::new(FakeBackend::succeeding().gated(gate.clone()));
    let (engine, ids) = queued_engine(backend.clone(), &["a.jpg"], 2).await;

    let handle = engine.generate(ids[0]).await.unwrap();
    backend.wait_for_calls(1).await;
    engine.session().sign_in("tester", "key-2").await;
    gate.add_permits(10);
    handle.await.unwrap();

    let keys: Vec<_> = backend.calls().into_iter().map(|c| c.api_key).collect();
    assert_eq!(keys, [API_KEY, "key-2"]);
}
