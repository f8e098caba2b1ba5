/**
 * SENSOR REGISTRY - Table state topic -> handler
 *
 * RÔLE :
 * Source de vérité unique pour "ce topic est-il connu, et comment
 * interpréter ses payloads". Alimentée par la découverte, lue par le dispatch.
 *
 * CONCURRENCE :
 * - install : verrou exclusif, limité à l'insertion
 * - lookup : verrou partagé, limité à la recherche ; le handler est un Arc
 *   cloné puis le verrou est relâché AVANT le traitement du message
 * - dernière découverte gagnante, jamais deux handlers pour un même topic
 */

use crate::sensors::{SensorHandler, SensorKind};
use crate::state::{new_state, Shared};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

pub type HandlersMap = HashMap<String, Arc<SensorHandler>>;

#[derive(Clone, Default)]
pub struct SensorRegistry {
    handlers: Shared<HandlersMap>,
}

/// Vue sérialisable d'un capteur enregistré (API /sensors)
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SensorView {
    pub state_topic: String,
    pub device_class: String,
    pub device: String,
    pub sensor: String,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self { handlers: new_state(HashMap::new()) }
    }

    /// Remplace atomiquement l'entrée existante ; retourne l'ancien handler
    pub fn install(&self, topic: &str, handler: SensorHandler) -> Option<Arc<SensorHandler>> {
        let handler = Arc::new(handler);
        self.handlers.write().insert(topic.to_string(), handler)
    }

    pub fn lookup(&self, topic: &str) -> Option<Arc<SensorHandler>> {
        self.handlers.read().get(topic).cloned()
    }

    pub fn kind_of(&self, topic: &str) -> Option<SensorKind> {
        self.handlers.read().get(topic).map(|h| h.kind())
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Liste triée par topic
    pub fn list_sensors(&self) -> Vec<SensorView> {
        let mut views: Vec<SensorView> = {
            let handlers = self.handlers.read();
            handlers
                .iter()
                .map(|(topic, h)| SensorView {
                    state_topic: topic.clone(),
                    device_class: h.kind().to_string(),
                    device: h.device().to_string(),
                    sensor: h.sensor().to_string(),
                })
                .collect()
        }; // verrou relâché ici
        views.sort_by(|a, b| a.state_topic.cmp(&b.state_topic));
        views
    }
}
