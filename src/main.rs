use std::time::Duration;

use queryscope::client::api::ApiService;
use queryscope::client::cache::{ClientConfig, QueryClient};
use queryscope::client::key::QueryKey;
use queryscope::console::tools::DebugTools;
use queryscope::observer::{log_query_internals, DebugQueryObserver};
use queryscope::panel::breakpoint::{BreakpointHelper, BREAKPOINT_SUGGESTIONS};
use queryscope::{DebugContext, DebugPanel, Environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging/tracing
    tracing_subscriber::fmt::init();
    tracing::info!("queryscope demo booting...");

    let ctx = DebugContext::new(Environment {
        user_agent: format!("queryscope/{}", env!("CARGO_PKG_VERSION")),
        url: format!("process://{}", std::process::id()),
    });

    let client = QueryClient::new(
        ClientConfig {
            stale_time: Duration::from_secs(5),
            retry: 2,
            retry_delay: Duration::from_millis(250),
        },
        ctx.logger.clone(),
    );

    let tools = DebugTools::new(ctx.clone(), std::env::temp_dir());
    let mut panel = DebugPanel::new(ctx.clone(), client.clone(), Some(tools));
    panel.toggle(); // run the demo with the panel expanded

    let api = ApiService::new(ctx.logger.clone());

    let mut users = DebugQueryObserver::new(
        client.clone(),
        QueryKey::new(["users"]),
        Some("Users"),
        ctx.clone(),
    );
    let mut user_two = DebugQueryObserver::new(
        client.clone(),
        QueryKey::new(["users", "2"]),
        Some("UserById"),
        ctx.clone(),
    );
    let mut failing = DebugQueryObserver::new(
        client.clone(),
        QueryKey::new(["broken"]),
        Some("ErrorQuery"),
        ctx.clone(),
    );

    // Kick off the demo fetches; they settle while the loop below runs.
    {
        let api = api.clone();
        users.fetch(move || {
            let api = api.clone();
            async move { api.fetch_users().await }
        });
    }
    {
        let api = api.clone();
        user_two.fetch(move || {
            let api = api.clone();
            async move { api.fetch_user_by_id("2").await }
        });
    }
    {
        let api = api.clone();
        failing.fetch(move || {
            let api = api.clone();
            async move { api.fetch_with_error().await }
        });
    }

    let mut cadence = tokio::time::interval(Duration::from_millis(1000));
    cadence.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    for round in 0..6 {
        cadence.tick().await;

        let users_result = users.observe();
        let _ = user_two.observe();
        let _ = failing.observe();

        if round == 5 {
            log_query_internals(&ctx.logger, &users_result, "Users");
        }

        println!("{}", panel.render());
    }

    // Offer the first breakpoint suggestion (clipboard, or log fallback).
    let mut helper = BreakpointHelper::new(ctx.logger.clone());
    let _ = helper.copy_instructions(&BREAKPOINT_SUGGESTIONS[0]);

    if let Some(path) = panel.export_debug_data() {
        tracing::info!("debug export scheduled at {}", path.display());
    }

    // Give the fire-and-forget write a moment to settle before exit.
    tokio::time::sleep(Duration::from_millis(200)).await;

    tracing::info!("queryscope demo done");
    Ok(())
}
