use std::time::Duration;

use queryscope::client::cache::{ClientConfig, QueryClient};
use queryscope::client::key::QueryKey;
use queryscope::console::export::{collect_debug_data, export_file_name, write_report};
use queryscope::console::tools::DebugTools;
use queryscope::observer::{CacheStatus, DebugQueryObserver};
use queryscope::panel::breakpoint::{BreakpointHelper, BREAKPOINT_SUGGESTIONS};
use queryscope::{DebugContext, DebugPanel, Environment, PanelMode};
use serde_json::json;

fn test_ctx() -> DebugContext {
    DebugContext::new(Environment {
        user_agent: "queryscope-tests".to_string(),
        url: "test://panel".to_string(),
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

fn temp_export_dir(tag: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "queryscope-test-{}-{}",
        tag,
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).expect("create export dir");
    dir
}

#[tokio::test]
async fn test_export_keys_match_recorders() {
    let ctx = test_ctx();

    // 1. Populate both recorders
    ctx.metrics.start_timing("[\"users\"]", "fetch").end();
    ctx.tracker
        .track_state_change(&QueryKey::new(["users"]), json!({ "status": "pending" }));
    ctx.tracker
        .track_state_change(&QueryKey::new(["todos"]), json!({ "status": "success" }));

    // 2. Collect: keys must match the recorders at call time, exactly
    let report = collect_debug_data(&ctx);
    let metric_keys: Vec<_> = ctx.metrics.metrics(None).keys().cloned().collect();
    for key in &metric_keys {
        assert!(report.performance.contains_key(key));
    }
    assert_eq!(report.performance.len(), metric_keys.len());

    let history = ctx.tracker.all_history();
    assert_eq!(report.state_history.len(), history.len());
    for key in history.keys() {
        assert!(report.state_history.contains_key(key));
    }
    assert_eq!(report.user_agent, "queryscope-tests");
    assert_eq!(report.url, "test://panel");
}

#[tokio::test]
async fn test_export_document_shape_on_disk() {
    let ctx = test_ctx();
    ctx.metrics.start_timing("[\"users\"]", "fetch").end();
    ctx.tracker
        .track_state_change(&QueryKey::new(["users"]), json!({ "status": "success" }));

    let report = collect_debug_data(&ctx);
    let dir = temp_export_dir("shape");
    let path = dir.join(export_file_name(report.timestamp));
    write_report(&report, &path).await.expect("write succeeds");

    let body = std::fs::read_to_string(&path).expect("file exists");
    let doc: serde_json::Value = serde_json::from_str(&body).expect("valid JSON");
    for field in ["performance", "stateHistory", "timestamp", "userAgent", "url"] {
        assert!(doc.get(field).is_some(), "document carries {}", field);
    }

    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    assert!(name.starts_with("debug-") && name.ends_with(".json"));
    let millis: i64 = name["debug-".len()..name.len() - ".json".len()]
        .parse()
        .expect("epoch millis in the file name");
    assert!(millis > 0);
}

#[tokio::test]
async fn test_tools_export_fire_and_forget() {
    let ctx = test_ctx();
    ctx.metrics.start_timing("[\"users\"]", "fetch").end();

    let dir = temp_export_dir("tools");
    let tools = DebugTools::new(ctx.clone(), dir);
    let path = tools.export_data();

    // The write settles asynchronously and logs its completion
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(path.exists(), "export landed at the returned path");
    let logged = ctx
        .log_buffer
        .entries()
        .iter()
        .any(|entry| entry.message.contains("Debug data exported"));
    assert!(logged, "completion is logged after the fact");
}

#[tokio::test]
async fn test_panel_without_tools_warns_not_throws() {
    let ctx = test_ctx();
    let client = test_client(&ctx);
    let panel = DebugPanel::new(ctx.clone(), client, None);

    assert!(panel.export_debug_data().is_none(), "No-op without tools");
    panel.show_debug_instructions();
    // The warning goes to the sink only; the ring stays as it was
    assert!(ctx
        .log_buffer
        .entries()
        .iter()
        .all(|entry| !entry.message.contains("Debug tools")));
}

#[tokio::test]
async fn test_clear_logs_touches_only_the_ring() {
    let ctx = test_ctx();
    let client = test_client(&ctx);
    let panel = DebugPanel::new(ctx.clone(), client, None);

    ctx.metrics.start_timing("[\"users\"]", "fetch").end();
    ctx.tracker
        .track_state_change(&QueryKey::new(["users"]), json!({ "status": "pending" }));
    assert!(!ctx.log_buffer.is_empty());

    panel.clear_logs();

    let entries = ctx.log_buffer.entries();
    assert_eq!(entries.len(), 1, "Only the confirmation line remains");
    assert!(entries[0].message.contains("Debug logs cleared"));
    assert!(!ctx.metrics.metrics(None).is_empty(), "Metrics untouched");
    assert!(!ctx.tracker.all_history().is_empty(), "History untouched");
}

#[tokio::test]
async fn test_panel_modes_and_rendering() {
    let ctx = test_ctx();
    let client = test_client(&ctx);
    client.set_query_data(&QueryKey::new(["users"]), json!([1, 2, 3]));

    let mut panel = DebugPanel::new(ctx.clone(), client, None);
    assert_eq!(panel.mode(), PanelMode::Collapsed);
    assert!(panel.render().contains("collapsed"), "Summary affordance only");

    panel.toggle();
    assert_eq!(panel.mode(), PanelMode::Expanded);
    panel.poller().refresh();

    let view = panel.render();
    assert!(view.contains(&QueryKey::new(["users"]).canonical()));
    assert!(view.contains("success"));
    assert!(view.contains("fresh"), "Within the staleness window");

    panel.toggle();
    assert_eq!(panel.mode(), PanelMode::Collapsed, "Exactly two modes");
}

#[tokio::test]
async fn test_observer_counts_renders_and_dedups_history() {
    let ctx = test_ctx();
    let client = test_client(&ctx);
    let key = QueryKey::new(["users"]);
    client.set_query_data(&key, json!([1]));

    let mut observer =
        DebugQueryObserver::new(client.clone(), key.clone(), Some("Users"), ctx.clone());

    let first = observer.observe();
    assert_eq!(first.debug_info.render_count, 1);
    assert_eq!(first.debug_info.cache_status, CacheStatus::Fresh);
    assert_eq!(first.observer_count, 1);

    // Nothing changed between passes: history gains no second entry
    let second = observer.observe();
    assert_eq!(second.debug_info.render_count, 2, "Counter is per-instance");
    assert_eq!(
        ctx.tracker.state_history(&key).len(),
        1,
        "Unchanged state is not re-recorded"
    );

    drop(observer);
    let view = client.entry(&key).expect("entry survives the observer");
    assert_eq!(view.observer_count, 0, "Teardown releases the binding");
}

#[tokio::test]
async fn test_cache_status_inactive_after_entry_removed() {
    let ctx = test_ctx();
    let client = test_client(&ctx);
    let key = QueryKey::new(["users"]);
    client.set_query_data(&key, json!([1]));

    let mut observer =
        DebugQueryObserver::new(client.clone(), key.clone(), Some("Users"), ctx.clone());
    assert_eq!(observer.observe().debug_info.cache_status, CacheStatus::Fresh);

    // Entry gone underneath the binding: the next pass reports inactive
    client.remove(&key);
    let result = observer.observe();
    assert_eq!(result.debug_info.cache_status, CacheStatus::Inactive);
    assert_eq!(result.observer_count, 0, "Missing entry has no bindings");
    assert!(result.is_stale, "Missing entry is never fresh");
}

#[test]
fn test_breakpoint_payload_verbatim() {
    let ctx = test_ctx();
    let mut helper = BreakpointHelper::without_clipboard(ctx.logger.clone());

    let suggestion = &BREAKPOINT_SUGGESTIONS[2];
    let payload = helper.copy_instructions(suggestion);

    assert!(payload.contains(suggestion.file), "File name verbatim");
    assert!(
        payload.contains(&suggestion.line.to_string()),
        "Line number verbatim"
    );
    assert!(payload.contains(suggestion.code), "Code snippet verbatim");
    assert!(payload.contains(suggestion.description));

    // Clipboard absent: the payload fell back to a log line
    let logged = ctx
        .log_buffer
        .entries()
        .iter()
        .any(|entry| entry.message.contains("Breakpoint instructions"));
    assert!(logged, "Denied clipboard degrades to logging");
}
