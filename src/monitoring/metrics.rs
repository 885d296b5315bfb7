//! Execution metrics collected from lifecycle events.
//!
//! The collector listens for started/completed/failed events and keeps one
//! [`ProcessMetrics`] record per execution plus an [`AggregatedMetrics`] roll-up
//! per process class.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::event_bus::{EventBus, EventBusError, EventSubscriber, SubscriptionId};
use crate::domain::{EventType, LifecycleEvent, ProcessStatus};

/// Metrics for a single execution
#[derive(Debug, Clone, Serialize)]
pub struct ProcessMetrics {
    pub process_id: Uuid,
    pub process_name: String,
    pub process_class: String,
    pub status: ProcessStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub execution_time_ms: Option<f64>,
    pub error: Option<String>,
}

/// Roll-up for every execution of one process class
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedMetrics {
    pub process_class: String,
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub avg_execution_time_ms: f64,
    pub min_execution_time_ms: Option<f64>,
    pub max_execution_time_ms: Option<f64>,
    pub last_execution_at: Option<DateTime<Utc>>,
}

impl AggregatedMetrics {
    fn new(process_class: &str) -> Self {
        Self {
            process_class: process_class.to_string(),
            total_executions: 0,
            successful_executions: 0,
            failed_executions: 0,
            avg_execution_time_ms: 0.0,
            min_execution_time_ms: None,
            max_execution_time_ms: None,
            last_execution_at: None,
        }
    }

    /// Fraction of successful executions (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.total_executions == 0 {
            return 0.0;
        }
        self.successful_executions as f64 / self.total_executions as f64
    }

    fn record(&mut self, metrics: &ProcessMetrics) {
        self.total_executions += 1;
        match metrics.status {
            ProcessStatus::Completed => self.successful_executions += 1,
            ProcessStatus::Failed => self.failed_executions += 1,
            _ => {}
        }

        if let Some(elapsed) = metrics.execution_time_ms {
            let n = self.total_executions as f64;
            self.avg_execution_time_ms += (elapsed - self.avg_execution_time_ms) / n;
            self.min_execution_time_ms =
                Some(self.min_execution_time_ms.map_or(elapsed, |m| m.min(elapsed)));
            self.max_execution_time_ms =
                Some(self.max_execution_time_ms.map_or(elapsed, |m| m.max(elapsed)));
        }

        if let Some(completed_at) = metrics.completed_at {
            if self.last_execution_at.map_or(true, |last| completed_at > last) {
                self.last_execution_at = Some(completed_at);
            }
        }
    }
}

/// Overall statistics across all recorded executions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub total_processes: usize,
    pub completed: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub avg_execution_time_ms: f64,
    pub process_classes: usize,
}

/// Collects metrics from an [`EventBus`]
#[derive(Default)]
pub struct MetricsCollector {
    executions: RwLock<HashMap<Uuid, ProcessMetrics>>,
    aggregated: RwLock<HashMap<String, AggregatedMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe the collector to the started/completed/failed events of `bus`
    pub async fn attach(
        self: &Arc<Self>,
        bus: &EventBus,
    ) -> Result<Vec<SubscriptionId>, EventBusError> {
        let mut ids = Vec::new();
        for event_type in [
            EventType::ProcessStarted,
            EventType::ProcessCompleted,
            EventType::ProcessFailed,
        ] {
            let subscriber: Arc<dyn EventSubscriber> = self.clone();
            ids.push(bus.subscribe(event_type.as_str(), subscriber).await?);
        }
        Ok(ids)
    }

    /// Record one lifecycle event
    pub async fn record(&self, event: &LifecycleEvent) {
        match event.event_type {
            EventType::ProcessStarted => {
                self.executions.write().await.insert(
                    event.process_id,
                    ProcessMetrics {
                        process_id: event.process_id,
                        process_name: event.process_name.clone(),
                        process_class: event.process_class.clone(),
                        status: ProcessStatus::Running,
                        started_at: event.timestamp,
                        completed_at: None,
                        execution_time_ms: None,
                        error: None,
                    },
                );
            }
            EventType::ProcessCompleted | EventType::ProcessFailed => {
                let finished = {
                    let mut executions = self.executions.write().await;
                    // Events for executions started before the collector attached are ignored
                    let Some(metrics) = executions.get_mut(&event.process_id) else {
                        return;
                    };
                    metrics.status = event.status;
                    metrics.completed_at = Some(event.timestamp);
                    metrics.error = event.error.clone();
                    metrics.execution_time_ms = event.execution_time_ms.or_else(|| {
                        (event.timestamp - metrics.started_at)
                            .num_microseconds()
                            .map(|us| us as f64 / 1000.0)
                    });
                    metrics.clone()
                };

                self.aggregated
                    .write()
                    .await
                    .entry(finished.process_class.clone())
                    .or_insert_with(|| AggregatedMetrics::new(&finished.process_class))
                    .record(&finished);
            }
            EventType::GroupStarted | EventType::GroupCompleted => {}
        }
    }

    /// Metrics of one execution
    pub async fn get(&self, process_id: Uuid) -> Option<ProcessMetrics> {
        self.executions.read().await.get(&process_id).cloned()
    }

    pub async fn all(&self) -> Vec<ProcessMetrics> {
        let mut all: Vec<_> = self.executions.read().await.values().cloned().collect();
        all.sort_by_key(|m| m.started_at);
        all
    }

    pub async fn aggregated(&self, process_class: &str) -> Option<AggregatedMetrics> {
        self.aggregated.read().await.get(process_class).cloned()
    }

    /// All class roll-ups, sorted by class name
    pub async fn all_aggregated(&self) -> Vec<AggregatedMetrics> {
        let mut all: Vec<_> = self.aggregated.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.process_class.cmp(&b.process_class));
        all
    }

    pub async fn summary(&self) -> MetricsSummary {
        let executions = self.executions.read().await;
        let total = executions.len();
        let completed = executions
            .values()
            .filter(|m| m.status == ProcessStatus::Completed)
            .count();
        let failed = executions
            .values()
            .filter(|m| m.status == ProcessStatus::Failed)
            .count();
        let times: Vec<f64> = executions
            .values()
            .filter_map(|m| m.execution_time_ms)
            .collect();

        MetricsSummary {
            total_processes: total,
            completed,
            failed,
            success_rate: if total > 0 {
                completed as f64 / total as f64
            } else {
                0.0
            },
            avg_execution_time_ms: if times.is_empty() {
                0.0
            } else {
                times.iter().sum::<f64>() / times.len() as f64
            },
            process_classes: self.aggregated.read().await.len(),
        }
    }

    pub async fn clear(&self) {
        self.executions.write().await.clear();
        self.aggregated.write().await.clear();
    }
}

#[async_trait]
impl EventSubscriber for MetricsCollector {
    async fn handle(&self, event: &LifecycleEvent) -> Result<()> {
        self.record(event).await;
        Ok(())
    }
}
