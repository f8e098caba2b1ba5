/**
 * ESPHOME2PROM - Point d'entrée du bridge
 *
 * RÔLE : assemblage config -> queue -> sink/forwarder -> registre/dispatch
 * -> listener MQTT, plus l'API HTTP optionnelle et le watchdog de liveness.
 *
 * ARRÊT : Ctrl-C (sortie propre) ou watchdog épuisé (code de sortie non nul,
 * le superviseur relance le process).
 */

use anyhow::{Context, Result};
use bridge_kernel::config::{BridgeConfig, Cli};
use bridge_kernel::http::{self, AppState};
use bridge_kernel::sink::{LogSink, MetricSink, PromWriter, PromWriterConfig};
use bridge_kernel::{
    metric_queue, mqtt, spawn_forwarder, watchdog, DiscoveryProcessor, Dispatcher, HealthTracker, SensorRegistry,
    SinkForwarder,
};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // .env optionnel
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let cfg = BridgeConfig::load(&cli).await.context("loading configuration")?;
    init_tracing(cfg.debug);

    info!("[bridge] starting, MQTT broker {}:{}", cfg.mqtt.host, cfg.mqtt.port);
    if !cfg.extra_labels.is_empty() {
        info!("[bridge] extra labels: {:?}", cfg.extra_labels);
    }

    let health = HealthTracker::new();
    let registry = SensorRegistry::new();
    let (queue_tx, queue_rx) = metric_queue(cfg.queue_capacity, cfg.enqueue_timeout);

    // sink : PromWriter si une URL est configurée, sinon dry-run
    let sink: Arc<dyn MetricSink> = match &cfg.prometheus_write_url {
        Some(url) => {
            let mut writer_cfg = PromWriterConfig::new(url.clone());
            writer_cfg.max_batch_length = cfg.batch_max_length;
            writer_cfg.max_batch_duration = cfg.batch_max_duration;
            let (writer, _batch_task) = PromWriter::spawn(writer_cfg).context("starting Prometheus writer")?;
            info!("[bridge] writing metrics to {}", url);
            Arc::new(writer)
        }
        None => {
            warn!("[bridge] no Prometheus write URL configured, metrics will only be logged");
            Arc::new(LogSink)
        }
    };

    let forwarder = SinkForwarder::new(cfg.prefix.clone(), cfg.extra_labels.clone(), sink, health.clone());
    spawn_forwarder(forwarder, queue_rx);

    let discovery = DiscoveryProcessor::new(registry.clone(), queue_tx, health.clone());
    let dispatcher = Dispatcher::new(registry.clone(), discovery, health.clone());
    mqtt::spawn_mqtt_listener(mqtt::mqtt_options(&cfg.mqtt), dispatcher, health.clone());

    if let Some(addr) = cfg.listen_addr {
        let app_state = AppState {
            registry: registry.clone(),
            health: health.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = http::serve(addr, app_state).await {
                error!("[http] server stopped: {}", e);
            }
        });
    }

    tokio::select! {
        exhausted = watchdog::run_liveness_watchdog(health.clone(), cfg.liveness_interval, cfg.liveness_threshold) => {
            Err(exhausted.into())
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for shutdown signal")?;
            info!("[bridge] shutting down");
            Ok(())
        }
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}
