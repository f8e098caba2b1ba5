/**
 * SENSORS - Handlers typés par device class
 *
 * RÔLE :
 * Un handler par state topic découvert. Il connaît l'identité du capteur
 * (device + nom), sa conversion d'unité (fixée à la construction) et le
 * handle d'écriture vers la queue de métriques partagée.
 *
 * FONCTIONNEMENT :
 * payload "21.5" -> parse f64 -> conversion -> Metric{labels} -> enqueue (timeout)
 */

use crate::models::{DiscoveryAnnouncement, Metric};
use crate::queue::{EnqueueError, MetricSender};
use crate::units::{self, Conversion};
use std::collections::BTreeMap;
use std::fmt;
use time::OffsetDateTime;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("error parsing [{payload}]: {reason}")]
    Parse { payload: String, reason: String },
    #[error(transparent)]
    Queue(#[from] EnqueueError),
}

impl SensorError {
    pub fn is_queue_timeout(&self) -> bool {
        matches!(self, SensorError::Queue(EnqueueError::Timeout(_)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticleSize {
    Pm1,
    Pm25,
    Pm4,
    Pm10,
    /// classe "aqi" : indice, pas une taille de particule
    Aqi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Temperature,
    Pressure,
    Humidity,
    SignalStrength,
    Voltage,
    Current,
    Co2,
    Particulate(ParticleSize),
}

impl SensorKind {
    /// https://www.home-assistant.io/integrations/sensor/#device-class
    pub fn from_device_class(class: &str) -> Option<Self> {
        let kind = match class {
            "temperature" => SensorKind::Temperature,
            "pressure" => SensorKind::Pressure,
            "humidity" => SensorKind::Humidity,
            "signal_strength" => SensorKind::SignalStrength,
            "voltage" => SensorKind::Voltage,
            "current" => SensorKind::Current,
            "carbon_dioxide" => SensorKind::Co2,
            "pm1" => SensorKind::Particulate(ParticleSize::Pm1),
            "pm25" => SensorKind::Particulate(ParticleSize::Pm25),
            "pm4" => SensorKind::Particulate(ParticleSize::Pm4),
            "pm10" => SensorKind::Particulate(ParticleSize::Pm10),
            "aqi" => SensorKind::Particulate(ParticleSize::Aqi),
            _ => return None,
        };
        Some(kind)
    }

    pub fn device_class(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "temperature",
            SensorKind::Pressure => "pressure",
            SensorKind::Humidity => "humidity",
            SensorKind::SignalStrength => "signal_strength",
            SensorKind::Voltage => "voltage",
            SensorKind::Current => "current",
            SensorKind::Co2 => "carbon_dioxide",
            SensorKind::Particulate(ParticleSize::Pm1) => "pm1",
            SensorKind::Particulate(ParticleSize::Pm25) => "pm25",
            SensorKind::Particulate(ParticleSize::Pm4) => "pm4",
            SensorKind::Particulate(ParticleSize::Pm10) => "pm10",
            SensorKind::Particulate(ParticleSize::Aqi) => "aqi",
        }
    }

    pub fn metric_name(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "temperature",
            SensorKind::Pressure => "pressure",
            SensorKind::Humidity => "humidity",
            SensorKind::SignalStrength => "signal_strength",
            SensorKind::Voltage => "voltage",
            SensorKind::Current => "current",
            SensorKind::Co2 => "co2",
            SensorKind::Particulate(_) => "air_quality",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.device_class())
    }
}

/// Handler immuable, remplacé uniquement par une nouvelle découverte
#[derive(Debug)]
pub struct SensorHandler {
    kind: SensorKind,
    device: String,
    sensor: String,
    /// label "unit" (particules et signal uniquement)
    unit_label: Option<String>,
    conversion: Conversion,
    queue: MetricSender,
}

impl SensorHandler {
    /// Factory : choisit la conversion à partir de l'unité déclarée
    pub fn new(kind: SensorKind, announcement: &DiscoveryAnnouncement, queue: MetricSender) -> Self {
        let unit = announcement.unit.as_str();
        let (conversion, unit_label) = match kind {
            SensorKind::Temperature => (units::temperature_conversion(unit), None),
            SensorKind::Voltage => (units::voltage_conversion(unit), None),
            SensorKind::Current => (units::current_conversion(unit), None),
            SensorKind::Pressure => {
                if !units::is_hectopascal(unit) {
                    warn!(
                        "[sensors] sensor [{}] on {} does not use hPa unit (got {:?}), add conversion",
                        announcement.name, announcement.state_topic, unit
                    );
                }
                (Conversion::Identity, None)
            }
            SensorKind::SignalStrength => (Conversion::Identity, Some(units::normalize_signal_unit(unit))),
            SensorKind::Particulate(_) => (Conversion::Identity, Some(unit.to_string())),
            SensorKind::Humidity | SensorKind::Co2 => (Conversion::Identity, None),
        };

        Self {
            kind,
            device: announcement.device_name().to_string(),
            sensor: announcement.name.clone(),
            unit_label,
            conversion,
            queue,
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn sensor(&self) -> &str {
        &self.sensor
    }

    pub fn conversion(&self) -> Conversion {
        self.conversion
    }

    /// Parse + conversion + horodatage, sans toucher à la queue
    pub fn read(&self, payload: &[u8]) -> Result<Metric, SensorError> {
        let value = parse_reading(payload)?;

        let mut labels = BTreeMap::new();
        labels.insert("device".to_string(), self.device.clone());
        labels.insert("sensor".to_string(), self.sensor.clone());
        if let Some(unit) = &self.unit_label {
            labels.insert("unit".to_string(), unit.clone());
        }

        Ok(Metric {
            name: self.kind.metric_name().to_string(),
            labels,
            value: self.conversion.apply(value),
            timestamp: OffsetDateTime::now_utc(),
        })
    }

    /// Lecture complète : la métrique est cédée à la queue, jamais retentée
    pub async fn process_message(&self, payload: &[u8]) -> Result<(), SensorError> {
        let metric = self.read(payload)?;
        self.queue.enqueue(metric).await?;
        Ok(())
    }
}

fn parse_reading(payload: &[u8]) -> Result<f64, SensorError> {
    let parse_error = |reason: String| SensorError::Parse {
        payload: String::from_utf8_lossy(payload).into_owned(),
        reason,
    };
    let text = std::str::from_utf8(payload).map_err(|e| parse_error(e.to_string()))?;
    let value: f64 = text.trim().parse().map_err(|e: std::num::ParseFloatError| parse_error(e.to_string()))?;
    // ESPHome publie "nan" quand le capteur n'a pas de lecture
    if !value.is_finite() {
        return Err(parse_error("non-finite reading".to_string()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeviceDescriptor;
    use crate::queue::{metric_queue, DEFAULT_ENQUEUE_TIMEOUT};
    use std::time::Duration;

    fn announcement(class: &str, unit: &str) -> DiscoveryAnnouncement {
        DiscoveryAnnouncement {
            device_class: class.into(),
            unit: unit.into(),
            name: "thermo".into(),
            state_topic: "garden/sensor/thermo/state".into(),
            device: Some(DeviceDescriptor { name: "garden".into(), ..Default::default() }),
            ..Default::default()
        }
    }

    fn handler(class: &str, unit: &str) -> (SensorHandler, crate::queue::MetricReceiver) {
        let (tx, rx) = metric_queue(8, DEFAULT_ENQUEUE_TIMEOUT);
        let kind = SensorKind::from_device_class(class).unwrap();
        (SensorHandler::new(kind, &announcement(class, unit), tx), rx)
    }

    #[test]
    fn test_device_class_mapping() {
        assert_eq!(SensorKind::from_device_class("carbon_dioxide"), Some(SensorKind::Co2));
        assert_eq!(
            SensorKind::from_device_class("pm25"),
            Some(SensorKind::Particulate(ParticleSize::Pm25))
        );
        assert_eq!(SensorKind::from_device_class("illuminance"), None);
        assert_eq!(SensorKind::from_device_class(""), None);
        assert_eq!(SensorKind::Particulate(ParticleSize::Pm10).metric_name(), "air_quality");
        assert_eq!(SensorKind::Co2.to_string(), "carbon_dioxide");
    }

    #[test]
    fn test_temperature_kelvin_read() {
        let (h, _rx) = handler("temperature", "K");
        let m = h.read(b"293.15").unwrap();
        assert_eq!(m.name, "temperature");
        assert!((m.value - 20.0).abs() < 1e-9);
        assert_eq!(m.labels.get("device").map(String::as_str), Some("garden"));
        assert_eq!(m.labels.get("sensor").map(String::as_str), Some("thermo"));
        assert!(!m.labels.contains_key("unit"));
    }

    #[test]
    fn test_temperature_fahrenheit_read() {
        let (h, _rx) = handler("temperature", "°F");
        assert_eq!(h.read(b"98.6").unwrap().value, 37.0);
    }

    #[test]
    fn test_voltage_millivolt_read() {
        let (h, _rx) = handler("voltage", "mV");
        assert_eq!(h.read(b"3300").unwrap().value, 3.3);
    }

    #[test]
    fn test_unknown_voltage_unit_is_identity() {
        let (h, _rx) = handler("voltage", "volts");
        assert_eq!(h.conversion(), Conversion::Identity);
        assert_eq!(h.read(b"12.5").unwrap().value, 12.5);
    }

    #[test]
    fn test_signal_strength_unit_label() {
        let (h, _rx) = handler("signal_strength", "dbm");
        let m = h.read(b"-67").unwrap();
        assert_eq!(m.labels.get("unit").map(String::as_str), Some("dBm"));
        assert_eq!(m.value, -67.0);
    }

    #[test]
    fn test_particulate_carries_unit_label() {
        let (h, _rx) = handler("pm10", "µg/m³");
        let m = h.read(b"12").unwrap();
        assert_eq!(m.name, "air_quality");
        assert_eq!(m.labels.get("unit").map(String::as_str), Some("µg/m³"));
    }

    #[test]
    fn test_pressure_without_hpa_still_built() {
        let (h, _rx) = handler("pressure", "Pa");
        assert_eq!(h.read(b"1013.2").unwrap().value, 1013.2);
    }

    #[test]
    fn test_malformed_payloads() {
        let (h, _rx) = handler("humidity", "%");
        for payload in [&b"abc"[..], b"", b"nan", b"\xff\xfe", b"12,5"] {
            assert!(matches!(h.read(payload), Err(SensorError::Parse { .. })), "{payload:?}");
        }
    }

    #[tokio::test]
    async fn test_malformed_payload_never_enqueues() {
        let (h, mut rx) = handler("humidity", "%");
        assert!(h.process_message(b"oops").await.is_err());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_same_payload_twice_gives_identical_metrics() {
        let (h, mut rx) = handler("carbon_dioxide", "ppm");
        h.process_message(b"612").await.unwrap();
        h.process_message(b"612").await.unwrap();
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.name, second.name);
        assert_eq!(first.labels, second.labels);
        assert_eq!(first.value, second.value);
        assert!(second.timestamp >= first.timestamp);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_drops_with_timeout_error() {
        let (tx, mut rx) = metric_queue(1, Duration::from_secs(1));
        let kind = SensorKind::Humidity;
        let h = SensorHandler::new(kind, &announcement("humidity", "%"), tx);

        h.process_message(b"40").await.unwrap();
        let err = h.process_message(b"41").await.unwrap_err();
        assert!(err.is_queue_timeout());

        assert_eq!(rx.recv().await.unwrap().value, 40.0);
        assert!(rx.try_recv().is_err());
    }
}
