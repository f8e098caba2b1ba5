/*!
Broker MQTT simulé pour tester le bridge sans Mosquitto

Les messages passent par le même chemin que la boucle rumqttc du kernel
(`mqtt::on_publish`) : routage inline, traitement des états dans une task,
attendue ici pour que les tests restent déterministes.
*/

use anyhow::Result;
use bridge_kernel::dispatch::Dispatcher;
use bridge_kernel::mqtt;
use parking_lot::Mutex;
use rumqttc::{Publish, QoS};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

#[derive(Clone)]
pub struct MockBroker {
    dispatcher: Dispatcher,
    delivered: Arc<Mutex<Vec<MockMessage>>>,
}

impl MockBroker {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            delivered: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Livre un message au bridge et attend la fin de son traitement
    pub async fn publish<S, V>(&self, topic: S, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        self.deliver(MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtMostOnce,
            retain: false,
        })
        .await
    }

    /// Annonce retenue, comme ESPHome les publie
    pub async fn publish_retained<S, V>(&self, topic: S, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        self.deliver(MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtLeastOnce,
            retain: true,
        })
        .await
    }

    pub async fn deliver(&self, message: MockMessage) -> Result<()> {
        self.delivered.lock().push(message.clone());
        let mut publish = Publish::new(message.topic.clone(), message.qos, message.payload);
        publish.retain = message.retain;

        if let Some(task) = mqtt::on_publish(&self.dispatcher, publish) {
            task.await?;
        }
        tracing::debug!("[mock] delivered {}", message.topic);
        Ok(())
    }

    pub fn get_delivered_messages(&self) -> Vec<MockMessage> {
        self.delivered.lock().clone()
    }

    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<MockMessage> {
        self.delivered.lock().iter().filter(|m| m.topic == topic).cloned().collect()
    }

    pub fn clear(&self) {
        self.delivered.lock().clear();
    }
}

/// Annonce de découverte au format abrégé publié par ESPHome
#[derive(Debug, Clone)]
pub struct DiscoveryBuilder {
    node: String,
    object_id: String,
    device_class: String,
    unit: String,
    name: String,
    device: String,
    state_topic: String,
}

impl DiscoveryBuilder {
    pub fn sensor<S: Into<String>>(node: S, object_id: S, device_class: S) -> Self {
        let node = node.into();
        let object_id = object_id.into();
        Self {
            state_topic: format!("{node}/sensor/{object_id}/state"),
            name: object_id.clone(),
            device: node.clone(),
            device_class: device_class.into(),
            unit: String::new(),
            node,
            object_id,
        }
    }

    pub fn unit<S: Into<String>>(mut self, unit: S) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn device<S: Into<String>>(mut self, device: S) -> Self {
        self.device = device.into();
        self
    }

    /// Chaîne vide = entité sans état
    pub fn with_state_topic<S: Into<String>>(mut self, topic: S) -> Self {
        self.state_topic = topic.into();
        self
    }

    pub fn config_topic(&self) -> String {
        format!("homeassistant/sensor/{}/{}/config", self.node, self.object_id)
    }

    pub fn state_topic(&self) -> &str {
        &self.state_topic
    }

    pub fn payload(&self) -> Value {
        json!({
            "dev_cla": self.device_class,
            "unit_of_meas": self.unit,
            "stat_cla": "measurement",
            "name": self.name,
            "stat_t": self.state_topic,
            "avty_t": format!("{}/status", self.node),
            "uniq_id": format!("{}{}", self.node, self.object_id),
            "dev": {
                "ids": format!("{}-id", self.node),
                "name": self.device,
                "sw": "esphome v2024.5.0",
                "mdl": "esp32dev",
                "mf": "espressif"
            }
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.payload().to_string().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_kernel::models::DiscoveryAnnouncement;

    #[test]
    fn test_builder_wire_format_decodes() {
        let b = DiscoveryBuilder::sensor("attic", "attic_temp", "temperature").unit("°C").name("Attic Temp");
        assert_eq!(b.config_topic(), "homeassistant/sensor/attic/attic_temp/config");
        assert_eq!(b.state_topic(), "attic/sensor/attic_temp/state");

        let decoded: DiscoveryAnnouncement = serde_json::from_slice(&b.to_bytes()).unwrap();
        assert_eq!(decoded.device_class, "temperature");
        assert_eq!(decoded.unit, "°C");
        assert_eq!(decoded.name, "Attic Temp");
        assert_eq!(decoded.device_name(), "attic");
        assert_eq!(decoded.state_topic, "attic/sensor/attic_temp/state");
    }

    #[test]
    fn test_builder_overrides() {
        let b = DiscoveryBuilder::sensor("n", "o", "humidity").device("ignoreme").with_state_topic("");
        assert_eq!(b.payload()["dev"]["name"], "ignoreme");
        assert_eq!(b.payload()["stat_t"], "");
    }
}
