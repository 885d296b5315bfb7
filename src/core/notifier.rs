//! Lifecycle notification sink.
//!
//! The engine reports every process and group transition to a notifier that
//! the caller passes to `Process::execute`. Delivery is infallible from the
//! engine's point of view: a notifier that fails internally must log and move
//! on.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::LifecycleEvent;

/// Receives lifecycle events from executing processes
#[async_trait]
pub trait LifecycleNotifier: Send + Sync {
    async fn notify(&self, event: LifecycleEvent);
}

/// Notifier that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl LifecycleNotifier for NoopNotifier {
    async fn notify(&self, _event: LifecycleEvent) {}
}

#[async_trait]
impl<T: LifecycleNotifier + ?Sized> LifecycleNotifier for Arc<T> {
    async fn notify(&self, event: LifecycleEvent) {
        (**self).notify(event).await
    }
}
