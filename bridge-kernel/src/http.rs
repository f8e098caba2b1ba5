/**
 * API HTTP - Surface d'observation du bridge (optionnelle, --listen-addr)
 *
 * ROUTES :
 * - GET /health  : "ok" tant que le process tourne
 * - GET /status  : snapshot JSON (MQTT, compteurs du pipeline, nb de capteurs)
 * - GET /sensors : capteurs enregistrés (state topic, device class, device, nom)
 *
 * Lecture seule, pas d'authentification : à exposer sur le réseau local.
 */

use crate::health::{BridgeHealth, HealthTracker};
use crate::registry::{SensorRegistry, SensorView};
use axum::{extract::State, routing::get, Json, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub registry: SensorRegistry,
    pub health: HealthTracker,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(get_status))
        .route("/sensors", get(list_sensors))
        .with_state(app_state)
}

// GET /status
async fn get_status(State(app): State<AppState>) -> Json<BridgeHealth> {
    Json(app.health.get_health(&app.registry))
}

// GET /sensors
async fn list_sensors(State(app): State<AppState>) -> Json<Vec<SensorView>> {
    Json(app.registry.list_sensors())
}

pub async fn serve(addr: SocketAddr, app_state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("[http] listening on http://{}", listener.local_addr()?);
    axum::serve(listener, build_router(app_state)).await
}
