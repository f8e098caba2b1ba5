/**
 * PROMWRITER - Remote write Prometheus batché
 *
 * FONCTIONNEMENT :
 * - write_metric attend une place dans un buffer borné : si l'écriture HTTP
 *   traîne, le forwarder attend aussi et la queue de métriques se remplit
 * - une task dédiée vide le buffer par lots : flush quand le lot atteint
 *   max_batch_length ou toutes les max_batch_duration
 * - chaque lot devient un WriteRequest protobuf compressé snappy (bloc brut),
 *   POSTé sur l'URL de remote write ; quelques tentatives puis abandon du lot
 *
 * Compatible Prometheus (--web.enable-remote-write-receiver), Mimir,
 * VictoriaMetrics (/api/v1/write)...
 */

use super::{MetricSink, SinkError};
use crate::models::Metric;
use async_trait::async_trait;
use prost::Message;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, USER_AGENT};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

pub const REMOTE_WRITE_VERSION: &str = "0.1.0";
const METRIC_NAME_LABEL: &str = "__name__";

// Sous-ensemble de prometheus/prompb (types.proto, remote.proto)
#[derive(Clone, PartialEq, prost::Message)]
pub struct WriteRequest {
    #[prost(message, repeated, tag = "1")]
    pub timeseries: Vec<TimeSeries>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TimeSeries {
    #[prost(message, repeated, tag = "1")]
    pub labels: Vec<Label>,
    #[prost(message, repeated, tag = "2")]
    pub samples: Vec<Sample>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Label {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Sample {
    #[prost(double, tag = "1")]
    pub value: f64,
    /// millisecondes depuis l'epoch
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct PromWriterConfig {
    pub url: String,
    pub max_batch_length: usize,
    pub max_batch_duration: Duration,
    /// métriques en attente de lot avant que write_metric ne bloque
    pub buffer: usize,
    pub max_attempts: u32,
    pub request_timeout: Duration,
}

impl PromWriterConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_batch_length: 10,
            max_batch_duration: Duration::from_secs(1),
            buffer: 64,
            max_attempts: 3,
            request_timeout: Duration::from_secs(10),
        }
    }
}

pub struct PromWriter {
    tx: mpsc::Sender<Metric>,
}

impl PromWriter {
    /// Démarre la task de batching ; doit être appelé dans un runtime tokio
    pub fn spawn(config: PromWriterConfig) -> Result<(Self, JoinHandle<()>), SinkError> {
        let parsed = url::Url::parse(&config.url)
            .map_err(|e| SinkError::InvalidConfig(format!("invalid write URL {:?}: {}", config.url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SinkError::InvalidConfig(format!("unsupported write URL {:?}", config.url)));
        }
        let client = reqwest::Client::builder().timeout(config.request_timeout).build()?;
        let (tx, rx) = mpsc::channel(config.buffer.max(1));
        let handle = tokio::spawn(batch_loop(client, config, rx));
        Ok((Self { tx }, handle))
    }
}

#[async_trait]
impl MetricSink for PromWriter {
    async fn write_metric(&self, metric: Metric) -> Result<(), SinkError> {
        self.tx.send(metric).await.map_err(|_| SinkError::Closed)
    }
}

async fn batch_loop(client: reqwest::Client, config: PromWriterConfig, mut rx: mpsc::Receiver<Metric>) {
    let mut batch: Vec<Metric> = Vec::with_capacity(config.max_batch_length);
    let mut ticker = tokio::time::interval(config.max_batch_duration.max(Duration::from_millis(10)));

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(metric) => {
                    batch.push(metric);
                    if batch.len() >= config.max_batch_length {
                        flush(&client, &config, &mut batch).await;
                    }
                }
                None => {
                    flush(&client, &config, &mut batch).await;
                    debug!("[promwriter] input closed, batch loop stopped");
                    return;
                }
            },
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    flush(&client, &config, &mut batch).await;
                }
            }
        }
    }
}

async fn flush(client: &reqwest::Client, config: &PromWriterConfig, batch: &mut Vec<Metric>) {
    if batch.is_empty() {
        return;
    }
    let count = batch.len();
    let body = match encode_batch(batch) {
        Ok(body) => body,
        Err(e) => {
            error!("[promwriter] dropping batch of {} metrics: {}", count, e);
            batch.clear();
            return;
        }
    };
    batch.clear();

    for attempt in 1..=config.max_attempts {
        let result = client
            .post(&config.url)
            .header(CONTENT_TYPE, "application/x-protobuf")
            .header(CONTENT_ENCODING, "snappy")
            .header("X-Prometheus-Remote-Write-Version", REMOTE_WRITE_VERSION)
            .header(USER_AGENT, concat!("esphome2prom/", env!("CARGO_PKG_VERSION")))
            .body(body.clone())
            .send()
            .await
            .and_then(|resp| resp.error_for_status());
        match result {
            Ok(_) => {
                debug!("[promwriter] wrote {} metrics", count);
                return;
            }
            Err(e) => {
                warn!("[promwriter] write attempt {}/{} failed: {}", attempt, config.max_attempts, e);
                if attempt < config.max_attempts {
                    tokio::time::sleep(Duration::from_millis(250 * 2u64.pow(attempt))).await;
                }
            }
        }
    }
    error!("[promwriter] dropping batch of {} metrics after {} attempts", count, config.max_attempts);
}

/// Une série par métrique, labels triés par nom avec __name__
pub fn to_write_request(metrics: &[Metric]) -> WriteRequest {
    let timeseries = metrics
        .iter()
        .map(|m| {
            let mut labels: Vec<Label> = m
                .labels
                .iter()
                .filter(|(k, _)| k.as_str() != METRIC_NAME_LABEL)
                .map(|(k, v)| Label { name: k.clone(), value: v.clone() })
                .collect();
            labels.push(Label { name: METRIC_NAME_LABEL.to_string(), value: m.name.clone() });
            labels.sort_by(|a, b| a.name.cmp(&b.name));

            let millis = (m.timestamp.unix_timestamp_nanos() / 1_000_000) as i64;
            TimeSeries {
                labels,
                samples: vec![Sample { value: m.value, timestamp: millis }],
            }
        })
        .collect();
    WriteRequest { timeseries }
}

/// Corps HTTP : protobuf puis snappy en bloc (pas le format framé)
pub fn encode_batch(metrics: &[Metric]) -> Result<Vec<u8>, SinkError> {
    let raw = to_write_request(metrics).encode_to_vec();
    Ok(snap::raw::Encoder::new().compress_vec(&raw)?)
}
