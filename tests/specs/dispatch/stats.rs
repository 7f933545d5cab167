//! Stats invariants: per-worker load bound and dispatch accounting.

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
async fn current_load_never_exceeds_max_agent_load() {
    let d = dispatcher();
    let agent = Arc::new(
        StubAgent::new("w", &["a:b"]).with_execute_delay(Duration::from_millis(60)),
    );
    d.register(Arc::clone(&agent) as Arc<dyn Agent>);

    // Five concurrent dispatches against a single worker with capacity 3
    let mut handles = Vec::new();
    for i in 0..5 {
        let d = Arc::clone(&d);
        handles.push(tokio::spawn(async move {
            d.dispatch(
                &TaskBuilder::new("a:b").id(format!("t{}", i)).build(),
                &CancellationToken::new(),
            )
            .await
        }));
    }

    // Sample the load while they run
    let mut max_load = 0;
    for _ in 0..20 {
        if let Some(stats) = d.stats("w") {
            max_load = max_load.max(stats.current_load);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(max_load <= 3, "per-worker load bound violated: {max_load}");

    let results: Vec<_> = {
        let mut out = Vec::new();
        for handle in handles {
            out.push(handle.await.unwrap());
        }
        out
    };

    // The overflow dispatches observed NO_AGENT_AVAILABLE
    let rejected = results.iter().filter(|r| !r.success).count();
    let accepted = results.iter().filter(|r| r.success).count();
    assert_eq!(accepted + rejected, 5);
    assert!(rejected >= 2, "dispatches beyond capacity must be rejected");

    // Stats consistency: every finished dispatch is accounted for
    let stats = d.stats("w").unwrap();
    assert_eq!(stats.completed + stats.failed, stats.dispatched);
    assert_eq!(stats.current_load, 0);
}

#[tokio::test]
async fn completed_plus_failed_equals_dispatched_after_quiesce() {
    let d = dispatcher();
    let agent = Arc::new(StubAgent::new("w", &["a:b"]));
    d.register(agent as Arc<dyn Agent>);

    for i in 0..4 {
        let _ = d
            .dispatch(
                &TaskBuilder::new("a:b").id(format!("t{}", i)).build(),
                &CancellationToken::new(),
            )
            .await;
    }

    let stats = d.stats("w").unwrap();
    assert_eq!(stats.dispatched, 4);
    assert_eq!(stats.completed + stats.failed, 4);
    assert_eq!(stats.current_load, 0);
}
