/*!
# esphome2prom - Bridge ESPHome (MQTT discovery) vers Prometheus

Pipeline :
broker MQTT -> dispatch -> handler de capteur -> queue bornée -> forwarder -> sink

Le binaire `esphome2prom` assemble ces briques ; la bibliothèque est exposée
pour les tests d'intégration du devkit.
*/

pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod forwarder;
pub mod health;
pub mod http;
pub mod models;
pub mod mqtt;
pub mod queue;
pub mod registry;
pub mod sensors;
pub mod sink;
pub mod state;
pub mod topics;
pub mod units;
pub mod watchdog;

pub use discovery::{DiscoveryOutcome, DiscoveryProcessor};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use forwarder::{spawn_forwarder, SinkForwarder};
pub use health::HealthTracker;
pub use models::{DiscoveryAnnouncement, Metric};
pub use queue::{metric_queue, MetricReceiver, MetricSender};
pub use registry::SensorRegistry;
pub use sensors::{SensorError, SensorHandler, SensorKind};
pub use sink::{MetricSink, SinkError};
