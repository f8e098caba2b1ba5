/**
 * METRIC QUEUE - Point de passage unique handlers -> forwarder
 *
 * FONCTIONNEMENT :
 * - Channel tokio borné (128 par défaut), N producteurs / 1 consommateur
 * - Enqueue avec timeout fixe : si la queue reste pleine, la métrique est
 *   abandonnée (la fraîcheur prime sur l'exhaustivité)
 */

use crate::models::Metric;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::SendTimeoutError};

pub const DEFAULT_QUEUE_CAPACITY: usize = 128;
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EnqueueError {
    #[error("timeout on send queue after {0:?}")]
    Timeout(Duration),
    #[error("send queue closed")]
    Closed,
}

/// Handle d'écriture partagé par tous les handlers
#[derive(Debug, Clone)]
pub struct MetricSender {
    tx: mpsc::Sender<Metric>,
    timeout: Duration,
}

pub type MetricReceiver = mpsc::Receiver<Metric>;

pub fn metric_queue(capacity: usize, timeout: Duration) -> (MetricSender, MetricReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (MetricSender { tx, timeout }, rx)
}

impl MetricSender {
    /// La métrique est cédée à la queue ; elle est perdue en cas d'erreur
    pub async fn enqueue(&self, metric: Metric) -> Result<(), EnqueueError> {
        match self.tx.send_timeout(metric, self.timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(EnqueueError::Timeout(self.timeout)),
            Err(SendTimeoutError::Closed(_)) => Err(EnqueueError::Closed),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Places libres restantes
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use time::OffsetDateTime;

    fn metric(value: f64) -> Metric {
        Metric {
            name: "humidity".into(),
            labels: BTreeMap::new(),
            value,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (tx, mut rx) = metric_queue(4, DEFAULT_ENQUEUE_TIMEOUT);
        tx.enqueue(metric(1.0)).await.unwrap();
        tx.enqueue(metric(2.0)).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().value, 1.0);
        assert_eq!(rx.recv().await.unwrap().value, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_times_out() {
        let (tx, _rx) = metric_queue(1, Duration::from_secs(1));
        tx.enqueue(metric(1.0)).await.unwrap();
        assert_eq!(tx.available(), 0);

        let err = tx.enqueue(metric(2.0)).await.unwrap_err();
        assert_eq!(err, EnqueueError::Timeout(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (tx, rx) = metric_queue(1, DEFAULT_ENQUEUE_TIMEOUT);
        drop(rx);
        assert_eq!(tx.enqueue(metric(1.0)).await.unwrap_err(), EnqueueError::Closed);
    }
}
