/**
 * DISPATCH - Point d'entrée unique (topic, payload) venant du broker
 *
 * FONCTIONNEMENT :
 * - topic de découverte -> DiscoveryProcessor (synchrone, court)
 * - topic d'état -> lookup dans le registre (verrou partagé relâché aussitôt)
 *   puis ProcessMessage du handler, hors verrou
 * - tout le reste est ignoré
 *
 * `route` est synchrone : la boucle MQTT l'appelle inline pour conserver
 * l'ordre broker par topic (découverte installée avant les états suivants),
 * puis ne spawn que le traitement du handler.
 */

use crate::discovery::{DiscoveryOutcome, DiscoveryProcessor};
use crate::health::HealthTracker;
use crate::registry::SensorRegistry;
use crate::sensors::{SensorError, SensorHandler};
use crate::topics::{self, TopicClass};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug)]
pub enum Route {
    Discovery(DiscoveryOutcome),
    State(Arc<SensorHandler>),
    Unhandled,
    Ignored,
}

#[derive(Debug, PartialEq)]
pub enum DispatchOutcome {
    Discovery(DiscoveryOutcome),
    Processed,
    Dropped,
    Unhandled,
    Ignored,
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: SensorRegistry,
    discovery: DiscoveryProcessor,
    health: HealthTracker,
}

impl Dispatcher {
    pub fn new(registry: SensorRegistry, discovery: DiscoveryProcessor, health: HealthTracker) -> Self {
        Self { registry, discovery, health }
    }

    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    pub fn route(&self, topic: &str, payload: &[u8]) -> Route {
        match topics::classify(topic) {
            TopicClass::Discovery => Route::Discovery(self.discovery.on_discovery(topic, payload)),
            TopicClass::State => match self.registry.lookup(topic) {
                Some(handler) => Route::State(handler),
                None => {
                    self.health.record_unhandled();
                    debug!("[dispatch] unhandled sensor: {}: {}", topic, String::from_utf8_lossy(payload));
                    Route::Unhandled
                }
            },
            TopicClass::Other => Route::Ignored,
        }
    }

    /// Entrée complète : route puis traite le message d'état éventuel
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) -> DispatchOutcome {
        match self.route(topic, payload) {
            Route::Discovery(outcome) => DispatchOutcome::Discovery(outcome),
            Route::State(handler) => self.process(&handler, topic, payload).await,
            Route::Unhandled => DispatchOutcome::Unhandled,
            Route::Ignored => DispatchOutcome::Ignored,
        }
    }

    /// Dispatch d'un message d'état uniquement
    pub async fn dispatch(&self, topic: &str, payload: &[u8]) -> DispatchOutcome {
        if !topics::is_state_topic(topic) {
            return DispatchOutcome::Ignored;
        }
        self.handle_message(topic, payload).await
    }

    pub async fn process(&self, handler: &SensorHandler, topic: &str, payload: &[u8]) -> DispatchOutcome {
        debug!("[dispatch] sensor {}: {}", topic, String::from_utf8_lossy(payload));
        match handler.process_message(payload).await {
            Ok(()) => DispatchOutcome::Processed,
            Err(e) => {
                match &e {
                    SensorError::Parse { .. } => self.health.record_parse_error(),
                    SensorError::Queue(_) if e.is_queue_timeout() => self.health.record_enqueue_timeout(),
                    SensorError::Queue(_) => {}
                }
                warn!("[dispatch] could not process message {}: {}", topic, e);
                DispatchOutcome::Dropped
            }
        }
    }
}
