/**
 * SINK FORWARDER - Consommateur unique de la queue de métriques
 *
 * Pour chaque métrique : préfixe du nom, fusion des labels globaux
 * (les labels globaux gagnent en cas de collision), timestamp en UTC,
 * puis écriture vers le sink. Une erreur de sink est loggée et la boucle
 * continue ; la métrique n'est jamais remise en queue.
 *
 * L'écriture est attendue : un sink lent ralentit la consommation et la
 * queue bornée se remplit jusqu'aux timeouts d'enqueue des handlers.
 */

use crate::health::HealthTracker;
use crate::models::Metric;
use crate::queue::MetricReceiver;
use crate::sink::MetricSink;
use std::collections::BTreeMap;
use std::sync::Arc;
use time::UtcOffset;
use tokio::task::{self, JoinHandle};
use tracing::{info, warn};

pub struct SinkForwarder {
    prefix: String,
    extra_labels: BTreeMap<String, String>,
    sink: Arc<dyn MetricSink>,
    health: HealthTracker,
}

impl SinkForwarder {
    pub fn new(
        prefix: impl Into<String>,
        extra_labels: BTreeMap<String, String>,
        sink: Arc<dyn MetricSink>,
        health: HealthTracker,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            extra_labels,
            sink,
            health,
        }
    }

    pub fn enrich(&self, mut metric: Metric) -> Metric {
        metric.name = format!("{}{}", self.prefix, metric.name);
        for (k, v) in &self.extra_labels {
            metric.labels.insert(k.clone(), v.clone());
        }
        metric.timestamp = metric.timestamp.to_offset(UtcOffset::UTC);
        metric
    }

    pub async fn forward(&self, metric: Metric) {
        let metric = self.enrich(metric);
        let name = metric.name.clone();
        match self.sink.write_metric(metric).await {
            Ok(()) => self.health.record_forwarded(),
            Err(e) => {
                self.health.record_sink_error();
                warn!("[forwarder] error writing metric {}: {}", name, e);
            }
        }
    }

    /// Tourne jusqu'à la fermeture de la queue (tous les producteurs droppés)
    pub async fn run(self, mut rx: MetricReceiver) {
        while let Some(metric) = rx.recv().await {
            self.forward(metric).await;
        }
        info!("[forwarder] metric queue closed, stopping");
    }
}

pub fn spawn_forwarder(forwarder: SinkForwarder, rx: MetricReceiver) -> JoinHandle<()> {
    task::spawn(forwarder.run(rx))
}
