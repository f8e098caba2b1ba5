/**
 * DISCOVERY PROCESSOR - Annonces homeassistant/.../config -> handlers
 *
 * RÔLE :
 * Décode les annonces de découverte, choisit le handler selon la device
 * class déclarée et l'installe dans le registre (remplacement atomique).
 *
 * POLITIQUE :
 * - JSON invalide : warn + drop, registre inchangé
 * - device "ignoreme" : opt-out explicite, rien n'est installé
 * - state topic vide : entité sans état (bouton, switch...), ignorée
 * - device class vide : ignorée sans bruit ; inconnue : info + ignorée
 *
 * Callback fire-and-forget : aucune erreur ne remonte à l'appelant,
 * l'outcome ne sert qu'à l'observabilité et aux tests.
 */

use crate::health::HealthTracker;
use crate::models::DiscoveryAnnouncement;
use crate::queue::MetricSender;
use crate::registry::SensorRegistry;
use crate::sensors::{SensorHandler, SensorKind};
use crate::topics::{self, IGNORE_SENTINEL};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("not a discovery topic: {0}")]
    NotDiscoveryTopic(String),
    #[error("could not decode discovery {topic}: {source}")]
    Decode {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryOutcome {
    Installed {
        kind: SensorKind,
        state_topic: String,
        replaced: bool,
    },
    Rejected,
    IgnoredDevice,
    NoStateTopic,
    NoDeviceClass,
    UnknownDeviceClass(String),
}

#[derive(Clone)]
pub struct DiscoveryProcessor {
    registry: SensorRegistry,
    queue: MetricSender,
    health: HealthTracker,
}

impl DiscoveryProcessor {
    pub fn new(registry: SensorRegistry, queue: MetricSender, health: HealthTracker) -> Self {
        Self { registry, queue, health }
    }

    pub fn on_discovery(&self, topic: &str, payload: &[u8]) -> DiscoveryOutcome {
        match decode(topic, payload) {
            Ok(announcement) => self.apply(topic, &announcement),
            Err(DiscoveryError::NotDiscoveryTopic(_)) => DiscoveryOutcome::Rejected,
            Err(e) => {
                warn!("[discovery] {}: {}", e, String::from_utf8_lossy(payload));
                DiscoveryOutcome::Rejected
            }
        }
    }

    /// Installe le handler correspondant à une annonce déjà décodée
    pub fn apply(&self, topic: &str, d: &DiscoveryAnnouncement) -> DiscoveryOutcome {
        debug!("[discovery] received {}: {:?}", topic, d);

        if d.device_name() == IGNORE_SENTINEL {
            info!("[discovery] ignoring {}", topic);
            return DiscoveryOutcome::IgnoredDevice;
        }
        if d.state_topic.is_empty() {
            return DiscoveryOutcome::NoStateTopic;
        }
        if d.device_class.is_empty() {
            return DiscoveryOutcome::NoDeviceClass;
        }
        let Some(kind) = SensorKind::from_device_class(&d.device_class) else {
            info!("[discovery] [{}] unknown device class [{}]", topic, d.device_class);
            return DiscoveryOutcome::UnknownDeviceClass(d.device_class.clone());
        };

        // construction hors verrou, seule l'insertion est exclusive
        let handler = SensorHandler::new(kind, d, self.queue.clone());
        let replaced = self.registry.install(&d.state_topic, handler).is_some();
        self.health.record_discovery();
        info!("[discovery] adding {} sensor under {}", kind, d.state_topic);

        DiscoveryOutcome::Installed {
            kind,
            state_topic: d.state_topic.clone(),
            replaced,
        }
    }
}

pub fn decode(topic: &str, payload: &[u8]) -> Result<DiscoveryAnnouncement, DiscoveryError> {
    if !topics::is_discovery_topic(topic) {
        return Err(DiscoveryError::NotDiscoveryTopic(topic.to_string()));
    }
    serde_json::from_slice(payload).map_err(|source| DiscoveryError::Decode {
        topic: topic.to_string(),
        source,
    })
}
