//! Runtime counters fed by the event bus, and the gateway's background tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use contractlens_agent::ConversationStore;
use contractlens_core::event::{DomainEvent, EventBus};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Default)]
pub struct EventCounters {
    responses: AtomicU64,
    tool_calls: AtomicU64,
    tool_failures: AtomicU64,
    documents_ingested: AtomicU64,
    errors: AtomicU64,
    tokens_used: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub responses: u64,
    pub tool_calls: u64,
    pub tool_failures: u64,
    pub documents_ingested: u64,
    pub errors: u64,
    pub tokens_used: u64,
}

impl EventCounters {
    pub fn record(&self, event: &DomainEvent) {
        match event {
            DomainEvent::ResponseGenerated { tokens_used, .. } => {
                self.responses.fetch_add(1, Ordering::Relaxed);
                self.tokens_used.fetch_add(u64::from(*tokens_used), Ordering::Relaxed);
            }
            DomainEvent::ToolExecuted { success, .. } => {
                self.tool_calls.fetch_add(1, Ordering::Relaxed);
                if !success {
                    self.tool_failures.fetch_add(1, Ordering::Relaxed);
                }
            }
            DomainEvent::DocumentIngested { .. } => {
                self.documents_ingested.fetch_add(1, Ordering::Relaxed);
            }
            DomainEvent::ErrorOccurred { .. } => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            responses: self.responses.load(Ordering::Relaxed),
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            tool_failures: self.tool_failures.load(Ordering::Relaxed),
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            tokens_used: self.tokens_used.load(Ordering::Relaxed),
        }
    }
}

/// Count every event published on `events` until the bus is dropped.
pub fn spawn_event_counter(events: &EventBus, counters: Arc<EventCounters>) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    debug!(kind = event.kind(), "Counting event");
                    counters.record(&event);
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Event counter lagged; some events were not counted")
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Event counter stopped");
    })
}

/// Prune sessions idle longer than `ttl`, checking every `interval`.
pub fn spawn_idle_pruner(
    store: Arc<ConversationStore>,
    ttl: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            store.prune_idle(ttl).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contractlens_core::message::{ConversationId, Message};

    #[test]
    fn record_counts_by_kind() {
        let counters = EventCounters::default();
        counters.record(&DomainEvent::ToolExecuted {
            tool_name: "search_contract".into(),
            success: false,
            duration_ms: 3,
            timestamp: Utc::now(),
        });
        counters.record(&DomainEvent::ResponseGenerated {
            conversation_id: "c".into(),
            model: "m".into(),
            iterations: 2,
            tokens_used: 40,
            timestamp: Utc::now(),
        });
        let snap = counters.snapshot();
        assert_eq!(snap.tool_calls, 1);
        assert_eq!(snap.tool_failures, 1);
        assert_eq!(snap.responses, 1);
        assert_eq!(snap.tokens_used, 40);
        assert_eq!(snap.errors, 0);
    }

    #[tokio::test]
    async fn counter_task_follows_the_bus() {
        let bus = EventBus::new(16);
        let counters = Arc::new(EventCounters::default());
        let handle = spawn_event_counter(&bus, counters.clone());

        bus.publish(DomainEvent::DocumentIngested {
            document_id: "nda".into(),
            chunk_count: 3,
            timestamp: Utc::now(),
        });
        bus.publish(DomainEvent::ErrorOccurred {
            context: "provider:openai".into(),
            error_message: "timeout".into(),
            timestamp: Utc::now(),
        });
        drop(bus);
        handle.await.unwrap();

        let snap = counters.snapshot();
        assert_eq!(snap.documents_ingested, 1);
        assert_eq!(snap.errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pruner_runs_on_interval() {
        let store = Arc::new(ConversationStore::new(5, 10));
        store.append(&ConversationId::from("old"), Message::user("hello")).await;

        let handle = spawn_idle_pruner(store.clone(), Duration::ZERO, Duration::from_secs(60));
        // Let wall-clock time move past the session's timestamp.
        std::thread::sleep(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        assert!(store.is_empty().await);
        handle.abort();
    }
}
