//! In-memory publish/subscribe bus for lifecycle events.
//!
//! The bus keeps a bounded history of everything published and fans each
//! event out to the subscribers whose glob pattern matches its type
//! (`"process.completed"`, `"process.*"`, `"*"`). Handlers for one event run
//! concurrently; a failing handler is logged and does not affect the others
//! or the publisher.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use glob::Pattern;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::LifecycleNotifier;
use crate::domain::{EventType, LifecycleEvent};

/// Default number of events kept in history
pub const DEFAULT_MAX_HISTORY: usize = 10_000;

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("Invalid subscription pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// Receives events from the bus
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    async fn handle(&self, event: &LifecycleEvent) -> Result<()>;
}

struct FnSubscriber<F> {
    handler: F,
}

#[async_trait]
impl<F, Fut> EventSubscriber for FnSubscriber<F>
where
    F: Fn(LifecycleEvent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn handle(&self, event: &LifecycleEvent) -> Result<()> {
        (self.handler)(event.clone()).await
    }
}

/// Wrap an async closure as a subscriber
pub fn subscribe_fn<F, Fut>(handler: F) -> Arc<dyn EventSubscriber>
where
    F: Fn(LifecycleEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnSubscriber { handler })
}

struct Subscription {
    id: SubscriptionId,
    pattern: Pattern,
    subscriber: Arc<dyn EventSubscriber>,
}

/// Bus statistics
#[derive(Debug, Clone, Serialize)]
pub struct EventBusStats {
    pub total_events: usize,
    pub subscriber_count: usize,
    pub patterns: Vec<String>,
}

/// Lifecycle event bus with bounded history
pub struct EventBus {
    max_history: usize,
    history: RwLock<VecDeque<LifecycleEvent>>,
    subscriptions: RwLock<Vec<Subscription>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl EventBus {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            history: RwLock::new(VecDeque::new()),
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Subscribe to every event whose type matches `pattern`
    pub async fn subscribe(
        &self,
        pattern: &str,
        subscriber: Arc<dyn EventSubscriber>,
    ) -> Result<SubscriptionId, EventBusError> {
        let compiled = Pattern::new(pattern).map_err(|source| EventBusError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let id = SubscriptionId(Uuid::new_v4());
        self.subscriptions.write().await.push(Subscription {
            id,
            pattern: compiled,
            subscriber,
        });
        debug!(pattern = %pattern, "Subscriber registered");
        Ok(id)
    }

    /// Remove a subscription; returns whether it existed
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write().await;
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    /// Record the event and deliver it to all matching subscribers.
    ///
    /// Returns once every handler has finished.
    pub async fn publish(&self, event: LifecycleEvent) {
        {
            let mut history = self.history.write().await;
            history.push_back(event.clone());
            while history.len() > self.max_history {
                history.pop_front();
            }
        }

        let event_type = event.event_type.as_str();
        let subscribers: Vec<Arc<dyn EventSubscriber>> = self
            .subscriptions
            .read()
            .await
            .iter()
            .filter(|s| s.pattern.matches(event_type))
            .map(|s| Arc::clone(&s.subscriber))
            .collect();

        if subscribers.is_empty() {
            return;
        }

        let results = join_all(subscribers.iter().map(|s| s.handle(&event))).await;
        for err in results.into_iter().filter_map(|r| r.err()) {
            warn!(event = %event_type, error = %err, "Event handler failed");
        }
    }

    /// Events from history, most recent first.
    ///
    /// `limit` of `None` returns every match.
    pub async fn get_events(
        &self,
        process_id: Option<Uuid>,
        event_type: Option<EventType>,
        limit: Option<usize>,
    ) -> Vec<LifecycleEvent> {
        let history = self.history.read().await;
        history
            .iter()
            .rev()
            .filter(|e| process_id.map_or(true, |id| e.process_id == id))
            .filter(|e| event_type.map_or(true, |t| e.event_type == t))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub async fn history_len(&self) -> usize {
        self.history.read().await.len()
    }

    pub async fn clear_history(&self) {
        self.history.write().await.clear();
    }

    pub async fn stats(&self) -> EventBusStats {
        let subscriptions = self.subscriptions.read().await;
        let mut patterns: Vec<String> = subscriptions
            .iter()
            .map(|s| s.pattern.as_str().to_string())
            .collect();
        patterns.sort();
        patterns.dedup();

        EventBusStats {
            total_events: self.history.read().await.len(),
            subscriber_count: subscriptions.len(),
            patterns,
        }
    }
}

#[async_trait]
impl LifecycleNotifier for EventBus {
    async fn notify(&self, event: LifecycleEvent) {
        self.publish(event).await
    }
}
