use std::time::Duration;

use queryscope::client::api::ApiError;
use queryscope::client::cache::{ClientConfig, QueryClient};
use queryscope::client::key::QueryKey;
use queryscope::client::state::{FetchStatus, QueryStatus};
use queryscope::panel::poller::CacheSnapshotPoller;
use queryscope::{DebugContext, Environment};
use serde_json::json;

fn test_ctx() -> DebugContext {
    DebugContext::new(Environment {
        user_agent: "queryscope-tests".to_string(),
        url: "test://poller".to_string(),
    })
}

fn test_client(ctx: &DebugContext) -> QueryClient {
    QueryClient::new(
        ClientConfig {
            stale_time: Duration::from_secs(60),
            retry: 0,
            retry_delay: Duration::from_millis(10),
        },
        ctx.logger.clone(),
    )
}

#[tokio::test]
async fn test_pending_then_success_single_row() {
    let ctx = test_ctx();
    let client = test_client(&ctx);
    let poller = CacheSnapshotPoller::new(client.clone(), ctx.logger.clone());

    // 1. Dispatch a slow fetch
    client.fetch_query(QueryKey::new(["users"]), || async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        Ok::<_, ApiError>(json!([{ "id": "1" }]))
    });

    // 2. While in flight: exactly one pending/fetching row
    tokio::time::sleep(Duration::from_millis(50)).await;
    let rows = poller.snapshots();
    assert_eq!(rows.len(), 1, "One entry, one row");
    assert_eq!(rows[0].status, QueryStatus::Pending);
    assert_eq!(rows[0].fetch_status, FetchStatus::Fetching);

    // 3. After settling: the same row updated, not duplicated
    tokio::time::sleep(Duration::from_millis(300)).await;
    let rows = poller.snapshots();
    assert_eq!(rows.len(), 1, "Row updated in place, never duplicated");
    assert_eq!(rows[0].status, QueryStatus::Success);
    assert_eq!(rows[0].fetch_status, FetchStatus::Idle);
}

#[tokio::test]
async fn test_clear_cache_empties_table_immediately() {
    let ctx = test_ctx();
    let client = test_client(&ctx);
    let poller = CacheSnapshotPoller::new(client.clone(), ctx.logger.clone());

    client.set_query_data(&QueryKey::new(["users"]), json!([1, 2]));
    client.set_query_data(&QueryKey::new(["todos"]), json!([3]));
    poller.refresh();
    assert_eq!(poller.snapshots().len(), 2);

    // clear_cache delegates to the client, then forces a re-snapshot
    poller.clear_cache();
    assert!(poller.snapshots().is_empty(), "Next snapshot has zero rows");
    assert!(client.entries().is_empty(), "Client bulk-clear was called");
}

#[tokio::test]
async fn test_invalidate_all_marks_rows_stale_via_notification() {
    let ctx = test_ctx();
    let client = test_client(&ctx);
    let poller = CacheSnapshotPoller::new(client.clone(), ctx.logger.clone());

    client.set_query_data(&QueryKey::new(["users"]), json!([1]));
    poller.refresh();
    assert!(
        !poller.snapshots()[0].is_stale,
        "Fresh data within the staleness window"
    );

    // invalidate_all does not force a snapshot; the notification drives it
    poller.invalidate_all();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(poller.snapshots()[0].is_stale, "Invalidation marks the row stale");
}

#[tokio::test]
async fn test_auto_refresh_gates_both_triggers() {
    let ctx = test_ctx();
    let client = test_client(&ctx);
    let poller = CacheSnapshotPoller::new(client.clone(), ctx.logger.clone());

    poller.set_auto_refresh(false);
    client.set_query_data(&QueryKey::new(["late"]), json!(1));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(
        poller.snapshots().is_empty(),
        "Notification must not re-snapshot while auto-refresh is off"
    );

    // Manual refresh works regardless of the flag
    poller.refresh();
    assert_eq!(poller.snapshots().len(), 1);
}

#[tokio::test]
async fn test_set_client_resubscribes() {
    let ctx = test_ctx();
    let client_a = test_client(&ctx);
    let client_b = test_client(&ctx);
    let mut poller = CacheSnapshotPoller::new(client_a.clone(), ctx.logger.clone());

    client_a.set_query_data(&QueryKey::new(["a"]), json!(1));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(poller.snapshots().len(), 1);

    // 1. Swap: immediate re-snapshot against the new cache
    poller.set_client(client_b.clone());
    assert!(poller.snapshots().is_empty(), "New client starts empty");

    // 2. Old client's notifications no longer reach the poller
    client_a.set_query_data(&QueryKey::new(["a2"]), json!(2));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(
        poller.snapshots().is_empty(),
        "Old subscription was torn down"
    );

    // 3. New client's notifications do
    client_b.set_query_data(&QueryKey::new(["b"]), json!(3));
    tokio::time::sleep(Duration::from_millis(50)).await;
    let rows = poller.snapshots();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].query_key, QueryKey::new(["b"]).canonical());
}

#[tokio::test]
async fn test_interval_tick_surfaces_observer_count_changes() {
    let ctx = test_ctx();
    let client = test_client(&ctx);
    let poller = CacheSnapshotPoller::new(client.clone(), ctx.logger.clone());

    let key = QueryKey::new(["users"]);
    client.set_query_data(&key, json!([1]));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(poller.snapshots()[0].observer_count, 0);

    // Registering a binding emits no notification; only the timer can
    // surface the changed count
    client.observe(&key);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        poller.snapshots()[0].observer_count,
        0,
        "No notification fired and no tick has elapsed yet"
    );

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert_eq!(
        poller.snapshots()[0].observer_count,
        1,
        "The interval tick picks up the silent change"
    );
}

#[tokio::test]
async fn test_remove_drops_the_row_via_notification() {
    let ctx = test_ctx();
    let client = test_client(&ctx);
    let poller = CacheSnapshotPoller::new(client.clone(), ctx.logger.clone());

    let key = QueryKey::from("users");
    client.set_query_data(&key, json!([1]));
    client.set_query_data(&QueryKey::new(["todos"]), json!([2]));
    poller.refresh();
    assert_eq!(poller.snapshots().len(), 2);

    client.remove(&key);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let rows = poller.snapshots();
    assert_eq!(rows.len(), 1, "Removed entry disappears from the table");
    assert_eq!(rows[0].query_key, QueryKey::new(["todos"]).canonical());

    // Removing an absent key neither notifies nor errors
    client.remove(&key);
    assert_eq!(poller.snapshots().len(), 1);
}

#[tokio::test]
async fn test_drop_poller_releases_subscription() {
    let ctx = test_ctx();
    let client = test_client(&ctx);
    let poller = CacheSnapshotPoller::new(client.clone(), ctx.logger.clone());
    drop(poller);

    // Cache keeps working with no panel attached
    client.set_query_data(&QueryKey::new(["after"]), json!(1));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(client.entries().len(), 1);
}

#[tokio::test]
async fn test_failed_fetch_settles_with_retry_count() {
    let ctx = test_ctx();
    let client = QueryClient::new(
        ClientConfig {
            stale_time: Duration::from_secs(60),
            retry: 2,
            retry_delay: Duration::from_millis(10),
        },
        ctx.logger.clone(),
    );

    let key = QueryKey::new(["broken"]);
    let handle = client.fetch_query(key.clone(), || async {
        Err::<serde_json::Value, ApiError>(ApiError::Network)
    });
    handle.await.expect("fetch task completes");

    let view = client.entry(&key).expect("entry exists");
    assert_eq!(view.state.status, QueryStatus::Error);
    assert_eq!(view.state.fetch_status, FetchStatus::Idle);
    assert_eq!(
        view.state.failure_count, 3,
        "Initial attempt plus two retries"
    );
    assert!(view.state.error.as_deref().unwrap_or("").contains("network error"));
    assert!(view.state.error_updated_at.is_some());
}

#[tokio::test]
async fn test_retry_recovers_on_later_success() {
    let ctx = test_ctx();
    let client = QueryClient::new(
        ClientConfig {
            stale_time: Duration::from_secs(60),
            retry: 3,
            retry_delay: Duration::from_millis(10),
        },
        ctx.logger.clone(),
    );

    let key = QueryKey::new(["flaky"]);
    let calls = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    let counter = calls.clone();
    let handle = client.fetch_query(key.clone(), move || {
        let calls = counter.clone();
        async move {
            if calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) < 2 {
                Err(ApiError::InjectedFailure)
            } else {
                Ok(json!("recovered"))
            }
        }
    });
    handle.await.expect("fetch task completes");

    let view = client.entry(&key).expect("entry exists");
    assert_eq!(view.state.status, QueryStatus::Success, "Retry recovered");
    assert_eq!(view.state.failure_count, 0, "Success resets the failure count");
    assert_eq!(view.state.data, Some(json!("recovered")));
}
