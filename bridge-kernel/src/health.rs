use crate::registry::SensorRegistry;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MqttStatus {
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Debug, Serialize)]
pub struct BridgeHealth {
    pub uptime_seconds: u64,
    pub sensors_registered: usize,
    pub mqtt_status: MqttStatus,
    pub mqtt_reconnects: u32,
    pub discoveries: u64,
    pub metrics_forwarded: u64,
    pub sink_errors: u64,
    pub enqueue_timeouts: u64,
    pub parse_errors: u64,
    pub unhandled_messages: u64,
}

#[derive(Debug, Default)]
struct PipelineCounters {
    discoveries: AtomicU64,
    metrics_forwarded: AtomicU64,
    sink_errors: AtomicU64,
    enqueue_timeouts: AtomicU64,
    parse_errors: AtomicU64,
    unhandled: AtomicU64,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    mqtt_reconnects: Arc<AtomicU32>,
    mqtt_status: Arc<Mutex<MqttStatus>>,
    counters: Arc<PipelineCounters>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            mqtt_reconnects: Arc::new(AtomicU32::new(0)),
            mqtt_status: Arc::new(Mutex::new(MqttStatus::Connecting)),
            counters: Arc::new(PipelineCounters::default()),
        }
    }

    pub fn mark_mqtt_connected(&self) {
        *self.mqtt_status.lock() = MqttStatus::Connected;
    }

    pub fn mark_mqtt_disconnected(&self) {
        *self.mqtt_status.lock() = MqttStatus::Disconnected;
    }

    pub fn increment_reconnects(&self) {
        self.mqtt_reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mqtt_status(&self) -> MqttStatus {
        *self.mqtt_status.lock()
    }

    /// "connecting" au démarrage compte comme déconnecté pour le watchdog
    pub fn is_mqtt_connected(&self) -> bool {
        self.mqtt_status() == MqttStatus::Connected
    }

    pub fn record_discovery(&self) {
        self.counters.discoveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.counters.metrics_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sink_error(&self) {
        self.counters.sink_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enqueue_timeout(&self) {
        self.counters.enqueue_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_error(&self) {
        self.counters.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unhandled(&self) {
        self.counters.unhandled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_health(&self, registry: &SensorRegistry) -> BridgeHealth {
        let c = &self.counters;
        BridgeHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            sensors_registered: registry.len(),
            mqtt_status: self.mqtt_status(),
            mqtt_reconnects: self.mqtt_reconnects.load(Ordering::Relaxed),
            discoveries: c.discoveries.load(Ordering::Relaxed),
            metrics_forwarded: c.metrics_forwarded.load(Ordering::Relaxed),
            sink_errors: c.sink_errors.load(Ordering::Relaxed),
            enqueue_timeouts: c.enqueue_timeouts.load(Ordering::Relaxed),
            parse_errors: c.parse_errors.load(Ordering::Relaxed),
            unhandled_messages: c.unhandled.load(Ordering::Relaxed),
        }
    }
}
