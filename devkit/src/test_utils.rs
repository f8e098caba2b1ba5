/*!
Test Harness pour le bridge esphome2prom

Assemble le pipeline réel du kernel (registre, découverte, dispatch, queue,
forwarder) autour d'un broker simulé et d'un sink d'enregistrement.
*/

use crate::mqtt_stub::{DiscoveryBuilder, MockBroker};
use crate::sink_stub::RecordingSink;
use anyhow::Result;
use bridge_kernel::dispatch::Dispatcher;
use bridge_kernel::discovery::DiscoveryProcessor;
use bridge_kernel::forwarder::{spawn_forwarder, SinkForwarder};
use bridge_kernel::health::{BridgeHealth, HealthTracker};
use bridge_kernel::models::Metric;
use bridge_kernel::queue::{metric_queue, DEFAULT_ENQUEUE_TIMEOUT};
use bridge_kernel::registry::SensorRegistry;
use bridge_kernel::sink::MetricSink;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct TestHarness {
    pub broker: MockBroker,
    pub sink: Arc<RecordingSink>,
    pub registry: SensorRegistry,
    pub health: HealthTracker,
    forwarder: JoinHandle<()>,
}

impl TestHarness {
    /// Pipeline sans préfixe ni labels globaux, queue de 128
    pub fn new() -> Self {
        Self::with_options("", BTreeMap::new(), 128)
    }

    pub fn with_options(prefix: &str, extra_labels: BTreeMap<String, String>, queue_capacity: usize) -> Self {
        let sink = Arc::new(RecordingSink::new());
        Self::with_sink(prefix, extra_labels, queue_capacity, sink.clone(), sink)
    }

    /// `recorder` reçoit ce qui passe, `sink` est celui branché au forwarder
    pub fn with_sink(
        prefix: &str,
        extra_labels: BTreeMap<String, String>,
        queue_capacity: usize,
        sink: Arc<dyn MetricSink>,
        recorder: Arc<RecordingSink>,
    ) -> Self {
        tracing_subscriber::fmt().with_test_writer().try_init().ok();

        let health = HealthTracker::new();
        let registry = SensorRegistry::new();
        let (tx, rx) = metric_queue(queue_capacity, DEFAULT_ENQUEUE_TIMEOUT);
        let forwarder = spawn_forwarder(SinkForwarder::new(prefix, extra_labels, sink, health.clone()), rx);
        let discovery = DiscoveryProcessor::new(registry.clone(), tx, health.clone());
        let dispatcher = Dispatcher::new(registry.clone(), discovery, health.clone());

        Self {
            broker: MockBroker::new(dispatcher),
            sink: recorder,
            registry,
            health,
            forwarder,
        }
    }

    pub async fn announce(&self, sensor: &DiscoveryBuilder) -> Result<()> {
        self.broker.publish_retained(sensor.config_topic(), sensor.to_bytes()).await
    }

    pub async fn publish_state(&self, topic: &str, payload: &str) -> Result<()> {
        self.broker.publish(topic, payload.as_bytes().to_vec()).await
    }

    /// Attend qu'au moins `count` métriques aient atteint le sink
    pub async fn wait_for_metrics(&self, count: usize, timeout_ms: u64) -> Result<Vec<Metric>> {
        let start = std::time::Instant::now();

        while start.elapsed() < Duration::from_millis(timeout_ms) {
            if self.sink.len() >= count {
                return Ok(self.sink.metrics());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        anyhow::bail!("expected {} metrics, got {} after {}ms", count, self.sink.len(), timeout_ms);
    }

    /// Laisse le forwarder vider la queue puis vérifie que rien n'est arrivé
    pub async fn assert_no_metrics(&self, settle_ms: u64) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(settle_ms)).await;
        if !self.sink.is_empty() {
            anyhow::bail!("expected no metrics, got {:?}", self.sink.metrics());
        }
        Ok(())
    }

    pub fn get_stats(&self) -> BridgeHealth {
        self.health.get_health(&self.registry)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}
