/*!
# Bridge DevKit - Stubs et utilitaires de test pour esphome2prom

Permet de tester le pipeline complet sans broker ni Prometheus :
- broker MQTT simulé qui livre les messages au dispatcher du kernel
- constructeur d'annonces de découverte au format wire ESPHome
- sinks d'enregistrement et de panne
- harness qui assemble registre, queue, forwarder et sink
*/

pub mod mqtt_stub;
pub mod sink_stub;
pub mod test_utils;

pub use mqtt_stub::{DiscoveryBuilder, MockBroker, MockMessage};
pub use sink_stub::{FailingSink, RecordingSink};
pub use test_utils::TestHarness;
