/**
 * TOPICS - Séparation stricte découverte / mises à jour d'état
 *
 * - découverte : homeassistant/#, filtré sur le suffixe /config
 *   (le wildcard # doit être en dernier, impossible de s'abonner à #/config)
 * - état : +/sensor/+/state, hors préfixe de découverte et hors "ignoreme/" ;
 *   comme le wildcard +, un segment vide est accepté ("/sensor/x/state")
 */

pub const DISCOVERY_PREFIX: &str = "homeassistant/";
pub const DISCOVERY_SUFFIX: &str = "/config";
pub const DISCOVERY_SUBSCRIPTION: &str = "homeassistant/#";
pub const STATE_SUBSCRIPTION: &str = "+/sensor/+/state";
/// Nom de device (ou segment de topic) qui désactive un capteur
pub const IGNORE_SENTINEL: &str = "ignoreme";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicClass {
    Discovery,
    State,
    Other,
}

pub fn is_discovery_topic(topic: &str) -> bool {
    topic.starts_with(DISCOVERY_PREFIX) && topic.ends_with(DISCOVERY_SUFFIX)
}

pub fn is_state_topic(topic: &str) -> bool {
    if topic.starts_with(DISCOVERY_PREFIX) || topic.contains(&format!("{IGNORE_SENTINEL}/")) {
        return false;
    }
    let segments: Vec<&str> = topic.split('/').collect();
    matches!(segments.as_slice(), [_, "sensor", _, "state"])
}

pub fn classify(topic: &str) -> TopicClass {
    if is_discovery_topic(topic) {
        TopicClass::Discovery
    } else if is_state_topic(topic) {
        TopicClass::State
    } else {
        TopicClass::Other
    }
}
