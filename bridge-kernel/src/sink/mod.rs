/**
 * SINKS - Destination des métriques normalisées
 *
 * RÔLE :
 * Interface commune que le forwarder appelle une fois par métrique.
 * Le batching, le flush et les retries sont l'affaire du sink. Un sink
 * saturé fait attendre le forwarder : la pression remonte jusqu'à la
 * queue bornée, seul endroit où une métrique peut être abandonnée.
 *
 * IMPLÉMENTATIONS :
 * - PromWriter : batch + remote write Prometheus (protobuf + snappy)
 * - LogSink : dry-run quand aucune URL d'écriture n'est configurée
 */

pub mod promwriter;

use crate::models::Metric;
use async_trait::async_trait;
use tracing::debug;

pub use promwriter::{PromWriter, PromWriterConfig};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink closed")]
    Closed,
    #[error("invalid sink configuration: {0}")]
    InvalidConfig(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("snappy compression failed: {0}")]
    Compress(#[from] snap::Error),
}

#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn write_metric(&self, metric: Metric) -> Result<(), SinkError>;
}

/// Sink sans destination : trace les métriques au niveau debug
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl MetricSink for LogSink {
    async fn write_metric(&self, metric: Metric) -> Result<(), SinkError> {
        debug!(
            "[sink] {}{:?} {} @ {}",
            metric.name, metric.labels, metric.value, metric.timestamp
        );
        Ok(())
    }
}
