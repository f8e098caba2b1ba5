// Tests bout en bout : broker simulé -> dispatch -> queue -> forwarder -> sink

use bridge_devkit::{DiscoveryBuilder, FailingSink, RecordingSink, TestHarness};
use std::collections::BTreeMap;
use std::sync::Arc;

const WAIT_MS: u64 = 2000;

#[tokio::test]
async fn test_kelvin_temperature_is_celsius() {
    let harness = TestHarness::new();
    let sensor = DiscoveryBuilder::sensor("attic", "attic_temp", "temperature").unit("K").name("Attic");

    harness.announce(&sensor).await.unwrap();
    harness.publish_state(sensor.state_topic(), "294.15").await.unwrap();

    let metrics = harness.wait_for_metrics(1, WAIT_MS).await.unwrap();
    let m = &metrics[0];
    assert_eq!(m.name, "temperature");
    assert!((m.value - 21.0).abs() < 1e-9, "got {}", m.value);
    assert_eq!(m.labels["device"], "attic");
    assert_eq!(m.labels["sensor"], "Attic");
}

#[tokio::test]
async fn test_fahrenheit_rounded_to_tenth() {
    let harness = TestHarness::new();
    let sensor = DiscoveryBuilder::sensor("porch", "porch_temp", "temperature").unit("°F");

    harness.announce(&sensor).await.unwrap();
    harness.publish_state(sensor.state_topic(), "70").await.unwrap();

    let metrics = harness.wait_for_metrics(1, WAIT_MS).await.unwrap();
    assert_eq!(metrics[0].value, 21.1);
}

#[tokio::test]
async fn test_millivolts_to_volts() {
    let harness = TestHarness::new();
    let sensor = DiscoveryBuilder::sensor("shed", "battery", "voltage").unit("mV");

    harness.announce(&sensor).await.unwrap();
    harness.publish_state(sensor.state_topic(), "3300").await.unwrap();

    let metrics = harness.wait_for_metrics(1, WAIT_MS).await.unwrap();
    assert_eq!(metrics[0].name, "voltage");
    assert_eq!(metrics[0].value, 3.3);
}

#[tokio::test]
async fn test_particulate_and_signal_carry_unit_label() {
    let harness = TestHarness::new();
    let pm = DiscoveryBuilder::sensor("living", "pm25", "pm25").unit("µg/m³");
    let wifi = DiscoveryBuilder::sensor("living", "wifi", "signal_strength").unit("dbm");

    harness.announce(&pm).await.unwrap();
    harness.announce(&wifi).await.unwrap();
    harness.publish_state(pm.state_topic(), "12").await.unwrap();
    harness.publish_state(wifi.state_topic(), "-61").await.unwrap();

    harness.wait_for_metrics(2, WAIT_MS).await.unwrap();
    let pm_metric = &harness.sink.find_by_name("air_quality")[0];
    assert_eq!(pm_metric.labels["unit"], "µg/m³");
    assert_eq!(pm_metric.value, 12.0);

    let wifi_metric = &harness.sink.find_by_name("signal_strength")[0];
    assert_eq!(wifi_metric.labels["unit"], "dBm");
    assert_eq!(wifi_metric.value, -61.0);
}

#[tokio::test]
async fn test_rediscovery_replaces_handler() {
    let harness = TestHarness::new();
    let first = DiscoveryBuilder::sensor("lab", "thermo", "temperature").unit("°C");
    let second = DiscoveryBuilder::sensor("lab", "thermo", "voltage").unit("mV");

    harness.announce(&first).await.unwrap();
    harness.announce(&second).await.unwrap();
    assert_eq!(harness.registry.len(), 1);

    harness.publish_state(first.state_topic(), "1500").await.unwrap();
    let metrics = harness.wait_for_metrics(1, WAIT_MS).await.unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].name, "voltage");
    assert_eq!(metrics[0].value, 1.5);
}

#[tokio::test]
async fn test_unregistered_topic_produces_no_metric() {
    let harness = TestHarness::new();
    harness.publish_state("stranger/sensor/temp/state", "20").await.unwrap();

    harness.assert_no_metrics(50).await.unwrap();
    assert_eq!(harness.get_stats().unhandled_messages, 1);
}

#[tokio::test]
async fn test_invalid_discovery_keeps_previous_handler() {
    let harness = TestHarness::new();
    let sensor = DiscoveryBuilder::sensor("cellar", "hum", "humidity").unit("%");

    harness.announce(&sensor).await.unwrap();
    harness.broker.publish(sensor.config_topic(), b"{broken".to_vec()).await.unwrap();
    harness.publish_state(sensor.state_topic(), "77").await.unwrap();

    let metrics = harness.wait_for_metrics(1, WAIT_MS).await.unwrap();
    assert_eq!(metrics[0].name, "humidity");
    assert_eq!(metrics[0].value, 77.0);
}

#[tokio::test]
async fn test_ignored_device_and_stateless_entities() {
    let harness = TestHarness::new();
    let ignored = DiscoveryBuilder::sensor("garage", "t", "temperature").device("ignoreme");
    let stateless = DiscoveryBuilder::sensor("garage", "restart", "temperature").with_state_topic("");

    harness.announce(&ignored).await.unwrap();
    harness.announce(&stateless).await.unwrap();
    assert!(harness.registry.is_empty());

    harness.publish_state(ignored.state_topic(), "20").await.unwrap();
    harness.assert_no_metrics(50).await.unwrap();
}

#[tokio::test]
async fn test_non_numeric_state_is_dropped() {
    let harness = TestHarness::new();
    let sensor = DiscoveryBuilder::sensor("office", "co2", "carbon_dioxide").unit("ppm");

    harness.announce(&sensor).await.unwrap();
    harness.publish_state(sensor.state_topic(), "unavailable").await.unwrap();
    harness.publish_state(sensor.state_topic(), " 612 ").await.unwrap();

    let metrics = harness.wait_for_metrics(1, WAIT_MS).await.unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].name, "co2");
    assert_eq!(metrics[0].value, 612.0);
    assert_eq!(harness.get_stats().parse_errors, 1);
}

#[tokio::test]
async fn test_prefix_and_extra_labels_applied() {
    let extra = BTreeMap::from([
        ("host".to_string(), "pi4".to_string()),
        ("device".to_string(), "forced".to_string()),
    ]);
    let harness = TestHarness::with_options("esp_", extra, 16);
    let sensor = DiscoveryBuilder::sensor("kitchen", "p", "pressure").unit("hPa");

    harness.announce(&sensor).await.unwrap();
    harness.publish_state(sensor.state_topic(), "1013.2").await.unwrap();

    let metrics = harness.wait_for_metrics(1, WAIT_MS).await.unwrap();
    let m = &metrics[0];
    assert_eq!(m.name, "esp_pressure");
    assert_eq!(m.labels["host"], "pi4");
    assert_eq!(m.labels["device"], "forced");
    assert!(m.timestamp.offset().is_utc());
}

#[tokio::test]
async fn test_failing_sink_does_not_stall_pipeline() {
    let failing = Arc::new(FailingSink::new());
    let harness = TestHarness::with_sink("", BTreeMap::new(), 4, failing.clone(), Arc::new(RecordingSink::new()));
    let sensor = DiscoveryBuilder::sensor("barn", "amps", "current").unit("mA");

    harness.announce(&sensor).await.unwrap();
    for i in 0..10 {
        harness.publish_state(sensor.state_topic(), &format!("{}", 100 + i)).await.unwrap();
    }

    let start = std::time::Instant::now();
    while failing.attempts() < 10 && start.elapsed().as_millis() < WAIT_MS as u128 {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(failing.attempts(), 10);
    assert_eq!(harness.get_stats().sink_errors, 10);
    assert_eq!(harness.get_stats().metrics_forwarded, 0);
}
