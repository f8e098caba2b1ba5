/*!
Sinks de test : enregistrement en mémoire et panne permanente
*/

use async_trait::async_trait;
use bridge_kernel::models::Metric;
use bridge_kernel::sink::{MetricSink, SinkError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Garde chaque métrique reçue pour les assertions
#[derive(Debug, Default)]
pub struct RecordingSink {
    metrics: Mutex<Vec<Metric>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&self) -> Vec<Metric> {
        self.metrics.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.metrics.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.lock().is_empty()
    }

    pub fn find_by_name(&self, name: &str) -> Vec<Metric> {
        self.metrics.lock().iter().filter(|m| m.name == name).cloned().collect()
    }

    pub fn clear(&self) {
        self.metrics.lock().clear();
    }
}

#[async_trait]
impl MetricSink for RecordingSink {
    async fn write_metric(&self, metric: Metric) -> Result<(), SinkError> {
        self.metrics.lock().push(metric);
        Ok(())
    }
}

/// Refuse tout ; compte les tentatives
#[derive(Debug, Default)]
pub struct FailingSink {
    attempts: AtomicUsize,
}

impl FailingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MetricSink for FailingSink {
    async fn write_metric(&self, _metric: Metric) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        Err(SinkError::Closed)
    }
}
