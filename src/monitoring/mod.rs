//! Observability for executing processes.
//!
//! - EventBus: Pub/sub with bounded history, implements `LifecycleNotifier`
//! - Metrics: Per-execution and per-class statistics fed from the bus

pub mod event_bus;
pub mod metrics;

pub use event_bus::{
    subscribe_fn, EventBus, EventBusError, EventBusStats, EventSubscriber, SubscriptionId,
};
pub use metrics::{AggregatedMetrics, MetricsCollector, MetricsSummary, ProcessMetrics};
