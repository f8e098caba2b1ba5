use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

// Format abrégé des messages de découverte ESPHome / Home Assistant
// (homeassistant/<component>/<node>/<object>/config)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryAnnouncement {
    #[serde(rename = "dev_cla", default)]
    pub device_class: String,
    #[serde(rename = "unit_of_meas", default)]
    pub unit: String,
    #[serde(rename = "stat_cla", default)]
    pub state_class: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "stat_t", default)]
    pub state_topic: String,
    #[serde(rename = "cmd_t", default)]
    pub command_topic: String,
    #[serde(rename = "avty_t", default)]
    pub availability_topic: String,
    #[serde(rename = "uniq_id", default)]
    pub unique_id: String,
    #[serde(rename = "dev", default)]
    pub device: Option<DeviceDescriptor>,
}

impl DiscoveryAnnouncement {
    /// Nom du device utilisé comme label, vide si le descripteur est absent
    pub fn device_name(&self) -> &str {
        self.device.as_ref().map(|d| d.name.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    #[serde(rename = "ids", default)]
    pub ids: DeviceIds,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "sw", default)]
    pub software_version: String,
    #[serde(rename = "mdl", default)]
    pub model: String,
    #[serde(rename = "mf", default)]
    pub manufacturer: String,
    /// connexions : paires ["mac", "aa:bb:..."]
    #[serde(rename = "cns", default)]
    pub connections: Vec<(String, String)>,
}

/// ESPHome envoie une chaîne, Home Assistant accepte aussi une liste
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceIds {
    One(String),
    Many(Vec<String>),
}

impl Default for DeviceIds {
    fn default() -> Self {
        DeviceIds::Many(Vec::new())
    }
}

impl DeviceIds {
    pub fn primary(&self) -> Option<&str> {
        match self {
            DeviceIds::One(id) => Some(id.as_str()),
            DeviceIds::Many(ids) => ids.first().map(String::as_str),
        }
    }
}

/// Métrique normalisée, produite par un handler et consommée par le forwarder
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub value: f64,
    pub timestamp: OffsetDateTime,
}
