//! S5: selection among capable workers — healthy beats unhealthy, loaded
//! workers at capacity are ineligible.

use hive_core::test_support::{StubAgent, TaskBuilder};
use hive_core::{Agent, ManualClock};
use hive_engine::{Dispatcher, DispatcherConfig, EventBus, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn dispatcher() -> Arc<Dispatcher<ManualClock>> {
    Arc::new(Dispatcher::new(
        DispatcherConfig::default(),
        RetryPolicy {
            attempts: 1,
            initial_backoff_ms: 1,
        },
        ManualClock::new(),
        Arc::new(EventBus::new()),
        None,
    ))
}

#[tokio::test]
async fn healthy_idle_worker_wins_over_loaded_and_unhealthy() {
    let d = dispatcher();

    // W1 healthy, load 0 — should win.
    d.register(Arc::new(StubAgent::new("w1", &["calendar:fetch"])));
    // W2 healthy but saturated: it also advertises a blocking capability we
    // use to occupy all three load slots.
    let w2 = Arc::new(
        StubAgent::new("w2", &["calendar:fetch", "block:hold"])
            .with_execute_delay(Duration::from_millis(500)),
    );
    d.register(Arc::clone(&w2) as Arc<dyn Agent>);
    // W3 unhealthy, load 0.
    d.register(Arc::new(
        StubAgent::new("w3", &["calendar:fetch"]).with_healthy(false),
    ));
    d.refresh_health().await;

    // Saturate W2 with three concurrent holds (only W2 handles block:hold)
    let mut holds = Vec::new();
    for i in 0..3 {
        let d = Arc::clone(&d);
        holds.push(tokio::spawn(async move {
            d.dispatch(
                &TaskBuilder::new("block:hold").id(format!("hold-{}", i)).build(),
                &CancellationToken::new(),
            )
            .await
        }));
    }
    // Wait until all three slots are actually occupied
    for _ in 0..100 {
        if d.stats("w2").map(|s| s.current_load) == Some(3) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(d.stats("w2").map(|s| s.current_load), Some(3));

    let selected = d.find_agent(&TaskBuilder::new("calendar:fetch").build());
    assert_eq!(
        selected.map(|a| a.name().to_string()),
        Some("w1".to_string()),
        "W1 (healthy, idle) must be selected over W2 (at capacity) and W3 (unhealthy)"
    );

    for hold in holds {
        hold.await.unwrap();
    }
}

#[tokio::test]
async fn unhealthy_worker_still_selected_as_last_resort() {
    let d = dispatcher();
    d.register(Arc::new(
        StubAgent::new("only", &["a:b"]).with_healthy(false),
    ));
    d.refresh_health().await;

    // Score 100 − 50 = 50 > 0: degraded but eligible
    let selected = d.find_agent(&TaskBuilder::new("a:b").build());
    assert_eq!(selected.map(|a| a.name().to_string()), Some("only".to_string()));
}
