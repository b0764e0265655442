//! Worker state machine: timer lifecycle, idempotent stop, cache replay,
//! and self-retiring concerns.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockRemote, wait_until};
use deck_core::worker::{CustomDomainPoller, CyclesPoller, VersionPoller, spawn_worker};
use deck_core::{DurableCache, PollConfig, QueryResponse, RemoteQuery};
use deck_protocol::{
    Concern, CustomDomainState, CyclesSnapshot, EndpointId, ModuleStatus, RegistrationState,
    VersionMetadata, WorkerMessage,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn poll_config(interval_ms: u64) -> PollConfig {
    PollConfig {
        interval_ms,
        freshness_ms: 60_000,
        batch_limit: 12,
    }
}

fn cycles_body() -> serde_json::Value {
    serde_json::to_value(CyclesSnapshot {
        cycles: 7,
        status: ModuleStatus::Running,
        memory_size: 0,
    })
    .expect("body")
}

fn cache(dir: &TempDir) -> DurableCache {
    DurableCache::with_base_dir(dir.path()).expect("cache")
}

#[tokio::test(start_paused = true)]
async fn repeated_start_polling_keeps_a_single_timer() {
    let dir = TempDir::new().expect("tempdir");
    let remote = MockRemote::new();
    let e1 = EndpointId::from("e1");
    remote.respond(&e1, Ok(QueryResponse::uncertified(cycles_body())));

    let poller = CyclesPoller::new(
        Arc::clone(&remote) as Arc<dyn RemoteQuery>,
        cache(&dir),
        poll_config(1_000),
    );
    let (handle, mut rx) = spawn_worker(poller);

    // Rearm twice in a row; the second start replaces the first schedule
    // instead of doubling the timer.
    handle
        .start_polling(vec![e1.clone()], Duration::from_millis(1_000))
        .expect("start");
    handle
        .start_polling(vec![e1.clone()], Duration::from_millis(1_000))
        .expect("start");

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    handle.stop_polling().expect("stop");
    let after_stop = remote.query_count();

    // Immediate tick at each (re)start plus one per elapsed interval;
    // a duplicated timer would roughly double this.
    assert!(
        (2..=6).contains(&after_stop),
        "expected one timer's worth of ticks, got {after_stop}"
    );

    handle.shutdown().await;
    rx.close();
}

#[tokio::test(start_paused = true)]
async fn stop_polling_is_idempotent_and_halts_ticks() {
    let dir = TempDir::new().expect("tempdir");
    let remote = MockRemote::new();
    let e1 = EndpointId::from("e1");
    remote.respond(&e1, Ok(QueryResponse::uncertified(cycles_body())));

    let poller = CyclesPoller::new(
        Arc::clone(&remote) as Arc<dyn RemoteQuery>,
        cache(&dir),
        poll_config(1_000),
    );
    let (handle, _rx) = spawn_worker(poller);

    handle
        .start_polling(vec![e1.clone()], Duration::from_millis(1_000))
        .expect("start");
    let counter = Arc::clone(&remote);
    wait_until(move || counter.query_count() >= 1).await;

    handle.stop_polling().expect("stop");
    handle.stop_polling().expect("stop again");
    tokio::time::sleep(Duration::from_millis(50)).await;
    let settled = remote.query_count();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(settled, remote.query_count());

    // The worker is Idle, not dead: a new start resumes polling.
    handle
        .start_polling(vec![e1], Duration::from_millis(1_000))
        .expect("restart");
    let counter = Arc::clone(&remote);
    wait_until(move || counter.query_count() > settled).await;

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn wrong_direction_messages_are_ignored() {
    let dir = TempDir::new().expect("tempdir");
    let remote = MockRemote::new();
    let e1 = EndpointId::from("e1");
    remote.respond(&e1, Ok(QueryResponse::uncertified(cycles_body())));

    let poller = CyclesPoller::new(
        Arc::clone(&remote) as Arc<dyn RemoteQuery>,
        cache(&dir),
        poll_config(1_000),
    );
    let (handle, _rx) = spawn_worker(poller);

    handle
        .start_polling(vec![e1.clone()], Duration::from_millis(1_000))
        .expect("start");
    let counter = Arc::clone(&remote);
    wait_until(move || counter.query_count() >= 1).await;
    let before = remote.query_count();

    // Response-direction vocabulary sent at the worker: a no-op, and in
    // particular not a reason to tick early.
    handle
        .send(WorkerMessage::SyncError {
            endpoint_id: e1.clone(),
            error: "echo".to_string(),
        })
        .expect("send");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(before, remote.query_count());

    handle.stop_polling().expect("stop");
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn version_worker_replays_cached_metadata_before_first_fetch() {
    let dir = TempDir::new().expect("tempdir");
    let remote = MockRemote::new();
    let e1 = EndpointId::from("e1");
    // No scripted response: the network fetch will fail, but the cached
    // value must still arrive first.

    let metadata = VersionMetadata {
        current: semver::Version::new(0, 0, 9),
        release: semver::Version::new(0, 0, 10),
        package_info: None,
    };
    let cache = cache(&dir);
    cache
        .persist(Concern::Version, &e1, Some(&metadata))
        .await
        .expect("persist");

    let poller = VersionPoller::new(
        Arc::clone(&remote) as Arc<dyn RemoteQuery>,
        cache,
        poll_config(60_000),
    );
    let (handle, mut rx) = spawn_worker(poller);
    handle
        .start_polling(vec![e1.clone()], Duration::from_secs(60))
        .expect("start");

    let first = rx.recv().await.expect("cached replay");
    assert_eq!(
        WorkerMessage::SyncResult {
            endpoint_id: e1.clone(),
            data: serde_json::to_value(&metadata).ok(),
            certified: false,
        },
        first
    );

    let second = rx.recv().await.expect("first tick");
    assert!(matches!(second, WorkerMessage::SyncError { .. }));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn custom_domain_worker_retires_once_terminal() {
    let remote = MockRemote::new();
    let e1 = EndpointId::from("e1");
    remote.respond(
        &e1,
        Ok(QueryResponse::uncertified(
            serde_json::to_value(CustomDomainState {
                domain: "console.example".to_string(),
                state: RegistrationState::Available,
            })
            .expect("body"),
        )),
    );

    let poller = CustomDomainPoller::new(
        Arc::clone(&remote) as Arc<dyn RemoteQuery>,
        poll_config(1_000),
    );
    let (handle, mut rx) = spawn_worker(poller);
    handle
        .start_polling(vec![e1.clone()], Duration::from_millis(1_000))
        .expect("start");

    let first = rx.recv().await.expect("first result");
    assert!(matches!(first, WorkerMessage::SyncResult { .. }));

    // Terminal state reached: no more ticks, ever.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(1, remote.query_count());

    handle.shutdown().await;
}
