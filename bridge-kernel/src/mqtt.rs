/**
 * MQTT LISTENER - Boucle d'événements rumqttc du bridge
 *
 * FONCTIONNEMENT :
 * - à chaque ConnAck : statut connecté + (ré)abonnement aux deux filtres
 *   (découverte homeassistant/# et états +/sensor/+/state), la session
 *   n'étant pas persistante côté broker
 * - Publish : routage inline (découverte installée dans l'ordre broker),
 *   seul le traitement d'un message d'état est spawné
 * - erreur : statut déconnecté, compteur de reconnexions, pause 2s puis
 *   rumqttc reconnecte au prochain poll
 */

use crate::config::MqttEndpoint;
use crate::dispatch::{DispatchOutcome, Dispatcher, Route};
use crate::health::HealthTracker;
use crate::topics::{DISCOVERY_SUBSCRIPTION, STATE_SUBSCRIPTION};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, Publish, QoS};
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, warn};

pub const CLIENT_ID_PREFIX: &str = "esphome2prom";
pub const KEEP_ALIVE: Duration = Duration::from_secs(20);
const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

/// Identifiant unique par process, deux bridges peuvent partager un broker
pub fn client_id() -> String {
    format!("{}-{}", CLIENT_ID_PREFIX, uuid::Uuid::new_v4().simple())
}

pub fn mqtt_options(endpoint: &MqttEndpoint) -> MqttOptions {
    let mut opts = MqttOptions::new(client_id(), endpoint.host.clone(), endpoint.port);
    opts.set_keep_alive(KEEP_ALIVE);
    if let Some(user) = &endpoint.username {
        opts.set_credentials(user.clone(), endpoint.password.clone().unwrap_or_default());
    }
    opts
}

pub fn spawn_mqtt_listener(opts: MqttOptions, dispatcher: Dispatcher, health: HealthTracker) -> JoinHandle<()> {
    task::spawn(async move {
        let (host, port) = opts.broker_address();
        let (client, mut eventloop) = AsyncClient::new(opts, 10);
        info!("[mqtt] connecting to {}:{}", host, port);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    health.mark_mqtt_connected();
                    info!("[mqtt] connected to {}:{}", host, port);
                    subscribe_all(&client);
                }
                Ok(Event::Incoming(Incoming::Publish(p))) => {
                    on_publish(&dispatcher, p);
                }
                Ok(_) => {}
                Err(e) => {
                    if health.is_mqtt_connected() {
                        warn!("[mqtt] connection lost: {}", e);
                    } else {
                        debug!("[mqtt] connection error: {}", e);
                    }
                    health.mark_mqtt_disconnected();
                    health.increment_reconnects();
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                }
            }
        }
    })
}

/// try_subscribe : la boucle ne doit pas attendre sur son propre canal de requêtes
fn subscribe_all(client: &AsyncClient) {
    for filter in [DISCOVERY_SUBSCRIPTION, STATE_SUBSCRIPTION] {
        match client.try_subscribe(filter, QoS::AtMostOnce) {
            Ok(()) => debug!("[mqtt] subscribed to {}", filter),
            Err(e) => error!("[mqtt] subscribe {} failed: {}", filter, e),
        }
    }
}

/// Retourne la task de traitement quand le message est un état enregistré
pub fn on_publish(dispatcher: &Dispatcher, publish: Publish) -> Option<JoinHandle<DispatchOutcome>> {
    match dispatcher.route(&publish.topic, &publish.payload) {
        Route::State(handler) => {
            let dispatcher = dispatcher.clone();
            Some(task::spawn(async move {
                dispatcher.process(&handler, &publish.topic, &publish.payload).await
            }))
        }
        Route::Discovery(_) | Route::Unhandled | Route::Ignored => None,
    }
}
