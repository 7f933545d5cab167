// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named-topic pub/sub with wildcard suffix matching.
//!
//! Topics are `domain:action` strings; a subscription pattern ending in `*`
//! matches every topic it prefixes (`"task:*"` receives `task:started`,
//! `task:completed`, ...). Subscriber failures are isolated: a panicking or
//! erroring handler is logged and never affects the emitter or sibling
//! subscribers.

use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::task::JoinSet;

/// The closed set of topics the core emits.
pub mod topics {
    pub const AGENT_STATUS: &str = "agent:status";
    pub const TASK_QUEUED: &str = "task:queued";
    pub const TASK_STARTED: &str = "task:started";
    pub const TASK_COMPLETED: &str = "task:completed";
    pub const TASK_FAILED: &str = "task:failed";
    pub const APPROVAL_PENDING: &str = "approval:pending";
    pub const APPROVAL_RESOLVED: &str = "approval:resolved";
    pub const LOG_ENTRY: &str = "log:entry";
    pub const DASHBOARD_UPDATE: &str = "dashboard:update";
    pub const LOOP_CYCLE: &str = "loop:cycle";
}

type Handler = Arc<dyn Fn(&str, &Value) + Send + Sync>;
type AsyncHandler =
    Arc<dyn Fn(String, Value) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Token returned by `on`/`on_async`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: u64,
    pattern: String,
    handler: Handler,
}

struct AsyncSubscription {
    id: u64,
    pattern: String,
    handler: AsyncHandler,
}

/// In-process event bus.
///
/// Handler lists are guarded so `on`/`off` never interleave with a running
/// `emit`; handlers themselves run outside the lock.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    handlers: Mutex<Vec<Subscription>>,
    async_handlers: Mutex<Vec<AsyncSubscription>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// The optional process-wide bus. Constructor injection is preferred;
    /// this exists for callers wiring components across module boundaries.
    pub fn global() -> Arc<EventBus> {
        static GLOBAL: OnceLock<Arc<EventBus>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(EventBus::new())))
    }

    /// Subscribe a synchronous handler to a topic or `prefix*` pattern.
    pub fn on(
        &self,
        pattern: impl Into<String>,
        handler: impl Fn(&str, &Value) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.handlers.lock().push(Subscription {
            id,
            pattern: pattern.into(),
            handler: Arc::new(handler),
        });
        SubscriptionId(id)
    }

    /// Subscribe an async handler, awaited by [`EventBus::emit_async`].
    pub fn on_async<F, Fut>(&self, pattern: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(String, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.async_handlers.lock().push(AsyncSubscription {
            id,
            pattern: pattern.into(),
            handler: Arc::new(move |topic, data| Box::pin(handler(topic, data))),
        });
        SubscriptionId(id)
    }

    /// Remove a subscription. Unknown ids are ignored.
    pub fn off(&self, id: SubscriptionId) {
        self.handlers.lock().retain(|s| s.id != id.0);
        self.async_handlers.lock().retain(|s| s.id != id.0);
    }

    /// Remove all subscriptions.
    pub fn clear(&self) {
        self.handlers.lock().clear();
        self.async_handlers.lock().clear();
    }

    /// Invoke every matching synchronous subscriber with `data`.
    ///
    /// Subscribers for a single emit observe the data before any later emit
    /// from the same caller; a panicking subscriber is contained and logged.
    pub fn emit(&self, topic: &str, data: Value) {
        let matching: Vec<Handler> = {
            let handlers = self.handlers.lock();
            handlers
                .iter()
                .filter(|s| pattern_matches(&s.pattern, topic))
                .map(|s| Arc::clone(&s.handler))
                .collect()
        };

        for handler in matching {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handler(topic, &data)
            }));
            if outcome.is_err() {
                tracing::warn!(topic, "event subscriber panicked");
            }
        }
    }

    /// Emit to synchronous subscribers, then await all matching async
    /// subscribers concurrently. Async failures are isolated and logged.
    pub async fn emit_async(&self, topic: &str, data: Value) {
        self.emit(topic, data.clone());

        let matching: Vec<AsyncHandler> = {
            let handlers = self.async_handlers.lock();
            handlers
                .iter()
                .filter(|s| pattern_matches(&s.pattern, topic))
                .map(|s| Arc::clone(&s.handler))
                .collect()
        };
        if matching.is_empty() {
            return;
        }

        let mut set = JoinSet::new();
        for handler in matching {
            set.spawn(handler(topic.to_string(), data.clone()));
        }
        while let Some(result) = set.join_next().await {
            if result.is_err() {
                tracing::warn!(topic, "async event subscriber failed");
            }
        }
    }
}

/// Exact match, or `prefix*` wildcard prefix match.
fn pattern_matches(pattern: &str, topic: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => topic.starts_with(prefix),
        None => pattern == topic,
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
