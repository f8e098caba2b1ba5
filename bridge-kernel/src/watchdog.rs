/**
 * LIVENESS WATCHDOG - Fail-fast si le broker reste injoignable
 *
 * Vérification périodique de l'état MQTT :
 * - déconnecté : score += 2
 * - connecté : score -= 1 (plancher 0)
 * - score > seuil : erreur fatale, le process sort en erreur et le
 *   superviseur (systemd, docker...) le relance
 *
 * Avec les valeurs par défaut (30s, seuil 10) il faut 6 checks déconnectés
 * d'affilée, soit ~3 minutes.
 */

use crate::health::HealthTracker;
use std::time::Duration;
use tracing::{debug, error};

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_THRESHOLD: u32 = 10;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LivenessError {
    #[error("not connected to MQTT for a while ({checks} checks), exiting")]
    Exhausted { checks: u64 },
}

#[derive(Debug, Clone)]
pub struct LivenessCounter {
    score: u32,
    threshold: u32,
}

impl LivenessCounter {
    pub fn new(threshold: u32) -> Self {
        Self { score: 0, threshold }
    }

    /// Retourne true quand le seuil est dépassé
    pub fn observe(&mut self, connected: bool) -> bool {
        if !connected {
            self.score += 2;
        } else if self.score > 0 {
            self.score -= 1;
        }
        self.score > self.threshold
    }

    pub fn score(&self) -> u32 {
        self.score
    }
}

/// Ne retourne que sur épuisement ; à sélectionner contre le reste du process
pub async fn run_liveness_watchdog(health: HealthTracker, interval: Duration, threshold: u32) -> LivenessError {
    let mut counter = LivenessCounter::new(threshold);
    let mut checks: u64 = 0;
    loop {
        tokio::time::sleep(interval).await;
        checks += 1;
        let connected = health.is_mqtt_connected();
        if counter.observe(connected) {
            let err = LivenessError::Exhausted { checks };
            error!("[watchdog] {}", err);
            return err;
        }
        if !connected {
            debug!("[watchdog] MQTT disconnected, liveness score {}/{}", counter.score(), threshold);
        }
    }
}
