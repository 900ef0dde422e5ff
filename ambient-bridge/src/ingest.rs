/*!
 * INGESTION PIPELINE - one station report, three independent outputs
 *
 * ROLE:
 * Takes the key/value fields of one report and fans them out to:
 * 1. raw MQTT topics `{prefix}/{topic}/{key}` (QoS 0)
 * 2. Home Assistant discovery triples when enabled (QoS 1)
 * 3. a single InfluxDB point when a store is configured
 *
 * FAILURE POLICY:
 * Every publish and the store write are awaited in turn. A failure is logged
 * and only abandons that one step; nothing here can fail the HTTP response.
 */

use crate::discovery::{self, DeviceIdentity, Discovery, AVAILABILITY_ONLINE, DISCOVERY_QOS};
use crate::fields::{self, STATION_ID_FIELD, STATION_TYPE_FIELD};
use crate::mqtt::BusPublisher;
use crate::state::AppContext;
use crate::topics;
use rumqttc::QoS;
use tracing::{debug, error, info, warn};

pub const RAW_QOS: QoS = QoS::AtMostOnce;

/// Distinct report fields in arrival order. A repeated key keeps the value
/// it was first reported with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationReport {
    fields: Vec<(String, String)>,
}

impl StationReport {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut fields: Vec<(String, String)> = Vec::new();
        for (key, value) in pairs {
            if fields.iter().any(|(k, _)| *k == key) {
                continue;
            }
            fields.push((key, value));
        }
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Fields that take part in discovery and storage.
    pub fn measurements(&self) -> impl Iterator<Item = &(String, String)> {
        self.fields.iter().filter(|(key, _)| !fields::is_ignored(key))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestSummary {
    pub raw_published: usize,
    pub raw_failed: usize,
    pub discovery_documents: usize,
    pub discovery_failed: usize,
    pub unknown_keys: Vec<String>,
    pub stored_fields: usize,
    pub store_failed: bool,
}

pub async fn process_report<P: BusPublisher>(ctx: &AppContext<P>, report: &StationReport) -> IngestSummary {
    let mut summary = IngestSummary::default();
    if report.is_empty() {
        return summary;
    }

    publish_raw(ctx, report, &mut summary).await;

    if ctx.config.hass.discovery {
        publish_discovery(ctx, report, &mut summary).await;
    }

    if let Some(store) = &ctx.store {
        let measurements: Vec<(String, String)> = report.measurements().cloned().collect();
        if !measurements.is_empty() {
            match store.write_report(&measurements).await {
                Ok(written) => summary.stored_fields = written,
                Err(e) => {
                    error!("{e}");
                    summary.store_failed = true;
                }
            }
        }
    }

    summary
}

async fn publish_raw<P: BusPublisher>(ctx: &AppContext<P>, report: &StationReport, summary: &mut IngestSummary) {
    for (key, value) in report.fields() {
        info!("{key} = {value}");
        let topic = topics::raw_topic(&ctx.config.mqtt, key);
        match ctx.publisher.publish(&topic, RAW_QOS, false, value.clone().into_bytes()).await {
            Ok(()) => summary.raw_published += 1,
            Err(e) => {
                error!("{e}");
                summary.raw_failed += 1;
            }
        }
    }
}

async fn publish_discovery<P: BusPublisher>(
    ctx: &AppContext<P>,
    report: &StationReport,
    summary: &mut IngestSummary,
) {
    let hass = &ctx.config.hass;
    let Some(device) = DeviceIdentity::resolve(hass, report.get(STATION_ID_FIELD), report.get(STATION_TYPE_FIELD))
    else {
        if report.measurements().next().is_some() {
            warn!("report has no {STATION_ID_FIELD} and no object_id is configured, skipping discovery");
        }
        return;
    };

    for (key, value) in report.measurements() {
        let doc = match discovery::build_document(key, &device, &ctx.catalog, &hass.discovery_prefix) {
            Discovery::Document(doc) => doc,
            Discovery::UnknownPlatform => {
                warn!("got a key of {key} - no discovery metadata for it");
                summary.unknown_keys.push(key.clone());
                continue;
            }
        };

        debug!("processed key {key} - {} topic {}", doc.platform, doc.availability_topic);
        summary.discovery_documents += 1;

        let config_payload = match doc.to_payload(key) {
            Ok(payload) => Some(payload),
            Err(e) => {
                error!("{e}");
                summary.discovery_failed += 1;
                None
            }
        };

        let mut publishes = vec![
            (doc.availability_topic.as_str(), AVAILABILITY_ONLINE.as_bytes().to_vec()),
            (doc.state_topic.as_str(), value.clone().into_bytes()),
        ];
        if let Some(payload) = config_payload {
            publishes.push((doc.config_topic.as_str(), payload));
        }

        for (topic, payload) in publishes {
            if let Err(e) = ctx.publisher.publish(topic, DISCOVERY_QOS, false, payload).await {
                error!("{e}");
                summary.discovery_failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_context;
    use ambient_devkit::{MockInfluxServer, MockMqttClient, StationReportBuilder};

    fn report(items: &[(&str, &str)]) -> StationReport {
        StationReport::from_pairs(items.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    fn example_report() -> StationReport {
        report(&[
            ("PASSKEY", "AA:BB:CC"),
            ("stationtype", "WS2902A"),
            ("tempf", "63.1"),
            ("humidity", "35"),
        ])
    }

    fn topics_of(client: &MockMqttClient) -> Vec<String> {
        client.get_published_messages().into_iter().map(|m| m.topic).collect()
    }

    #[test]
    fn test_report_keeps_first_value_of_duplicate_keys() {
        let r = report(&[("tempf", "63.1"), ("uv", "6"), ("tempf", "99.9")]);
        assert_eq!(r.len(), 2);
        assert_eq!(r.get("tempf"), Some("63.1"));
        assert_eq!(r.fields()[1].0, "uv");
    }

    #[tokio::test]
    async fn test_example_report_end_to_end() {
        let influx = MockInfluxServer::start().await.unwrap();
        let ctx = test_context(true, Some(&influx));

        let summary = process_report(&ctx, &example_report()).await;

        let messages = ctx.publisher.get_published_messages();
        let raw: Vec<_> = messages.iter().filter(|m| m.topic.starts_with("weather/backyard/")).collect();
        assert_eq!(raw.len(), 4);
        for msg in &raw {
            assert_eq!(msg.qos, QoS::AtMostOnce);
            assert!(!msg.retain);
        }
        assert_eq!(ctx.publisher.find_messages_by_topic("weather/backyard/PASSKEY")[0].payload, b"AA:BB:CC");
        assert_eq!(ctx.publisher.find_messages_by_topic("weather/backyard/tempf")[0].payload, b"63.1");

        let discovery: Vec<_> = messages.iter().filter(|m| m.topic.starts_with("homeassistant/")).collect();
        assert_eq!(discovery.len(), 6);
        assert!(discovery.iter().all(|m| m.qos == QoS::AtLeastOnce && !m.retain));
        assert!(discovery.iter().all(|m| m.topic.contains("/AA-BB-CC/")));
        assert!(!discovery.iter().any(|m| m.topic.contains("PASSKEY") || m.topic.contains("stationtype")));

        let config: serde_json::Value = ctx
            .publisher
            .get_last_json_message("homeassistant/sensor/AA-BB-CC/Outdoor Humidity/config")
            .unwrap()
            .unwrap();
        assert_eq!(config["unique_id"], "AA-BB-CC_humidity");
        assert_eq!(config["device"]["sw_version"], "WS2902A");

        assert_eq!(summary.raw_published, 4);
        assert_eq!(summary.discovery_documents, 2);
        assert_eq!(summary.stored_fields, 2);

        let writes = influx.writes();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].body.starts_with("weather,host=edgewater tempf=63.1,humidity=35i "));
        assert!(!writes[0].body.contains("PASSKEY"));
        assert!(!writes[0].body.contains("stationtype"));
    }

    #[tokio::test]
    async fn test_discovery_triple_order() {
        let ctx = test_context(true, None);
        process_report(&ctx, &report(&[("PASSKEY", "AA:BB:CC"), ("tempf", "63.1")])).await;

        assert_eq!(
            topics_of(&ctx.publisher),
            vec![
                "weather/backyard/PASSKEY",
                "weather/backyard/tempf",
                "homeassistant/sensor/AA-BB-CC/Outdoor Temperature/availability",
                "homeassistant/sensor/AA-BB-CC/Outdoor Temperature/state",
                "homeassistant/sensor/AA-BB-CC/Outdoor Temperature/config",
            ]
        );
        let messages = ctx.publisher.get_published_messages();
        assert_eq!(messages[2].payload, b"online");
        assert_eq!(messages[3].payload, b"63.1");
    }

    #[tokio::test]
    async fn test_empty_report_does_nothing() {
        let influx = MockInfluxServer::start().await.unwrap();
        let ctx = test_context(true, Some(&influx));

        let summary = process_report(&ctx, &StationReport::default()).await;

        assert_eq!(summary, IngestSummary::default());
        assert!(ctx.publisher.get_published_messages().is_empty());
        assert!(influx.writes().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_key_is_raw_and_stored_only() {
        let influx = MockInfluxServer::start().await.unwrap();
        let ctx = test_context(true, Some(&influx));

        let summary = process_report(&ctx, &report(&[("PASSKEY", "AA:BB:CC"), ("soilmoisture1", "41")])).await;

        assert_eq!(summary.unknown_keys, vec!["soilmoisture1".to_string()]);
        assert_eq!(summary.discovery_documents, 0);
        assert_eq!(topics_of(&ctx.publisher), vec!["weather/backyard/PASSKEY", "weather/backyard/soilmoisture1"]);
        assert!(influx.writes()[0].body.contains("soilmoisture1=41 "));
    }

    #[tokio::test]
    async fn test_discovery_disabled_publishes_raw_only() {
        let ctx = test_context(false, None);
        let summary = process_report(&ctx, &example_report()).await;

        assert_eq!(summary.raw_published, 4);
        assert_eq!(summary.discovery_documents, 0);
        assert!(topics_of(&ctx.publisher).iter().all(|t| t.starts_with("weather/backyard/")));
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_stop_the_rest() {
        let influx = MockInfluxServer::start().await.unwrap();
        let ctx = test_context(true, Some(&influx));
        ctx.publisher.fail_topic("weather/backyard/PASSKEY");
        ctx.publisher.fail_topic("homeassistant/sensor/AA-BB-CC/Outdoor Temperature/state");

        let summary = process_report(&ctx, &example_report()).await;

        assert_eq!(summary.raw_failed, 1);
        assert_eq!(summary.raw_published, 3);
        assert_eq!(summary.discovery_failed, 1);
        assert_eq!(ctx.publisher.find_messages_by_topic("homeassistant/sensor/AA-BB-CC/Outdoor Temperature/config").len(), 1);
        assert_eq!(influx.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_is_contained() {
        let influx = MockInfluxServer::start().await.unwrap();
        influx.fail_with(503);
        let ctx = test_context(true, Some(&influx));

        let summary = process_report(&ctx, &example_report()).await;

        assert!(summary.store_failed);
        assert_eq!(summary.raw_published, 4);
        assert_eq!(summary.discovery_documents, 2);
    }

    #[tokio::test]
    async fn test_missing_station_id_skips_discovery() {
        let ctx = test_context(true, None);
        let summary = process_report(&ctx, &report(&[("tempf", "63.1")])).await;

        assert_eq!(summary.raw_published, 1);
        assert_eq!(summary.discovery_documents, 0);
    }

    #[tokio::test]
    async fn test_replayed_report_is_published_again() {
        let influx = MockInfluxServer::start().await.unwrap();
        let ctx = test_context(true, Some(&influx));
        let report = example_report();

        let first = process_report(&ctx, &report).await;
        let second = process_report(&ctx, &report).await;

        assert_eq!(first, second);
        assert_eq!(ctx.publisher.get_published_messages().len(), 2 * (4 + 6));
        assert_eq!(influx.writes().len(), 2);
    }

    #[tokio::test]
    async fn test_point_is_stamped_at_write_time() {
        let influx = MockInfluxServer::start().await.unwrap();
        let ctx = test_context(true, Some(&influx));
        let report = report(&[
            ("PASSKEY", "AA:BB:CC"),
            ("dateutc", "2019-01-01 00:00:00"),
            ("tempf", "63.1"),
        ]);

        let before = time::OffsetDateTime::now_utc().unix_timestamp();
        process_report(&ctx, &report).await;
        let after = time::OffsetDateTime::now_utc().unix_timestamp();

        let writes = influx.writes();
        let stamp: i64 = writes[0].body.trim().rsplit(' ').next().unwrap().parse().unwrap();
        assert!(before <= stamp && stamp <= after, "{stamp} not in {before}..={after}");
        // 2019-01-01T00:00:00Z
        assert!(stamp > 1_546_300_800);
    }

    #[tokio::test]
    async fn test_full_station_report() {
        let influx = MockInfluxServer::start().await.unwrap();
        let ctx = test_context(true, Some(&influx));
        let report = StationReport::from_pairs(StationReportBuilder::ws2902a("AA:BB:CC:DD:EE:FF").build());

        let summary = process_report(&ctx, &report).await;

        assert_eq!(summary.raw_published, report.len());
        assert_eq!(summary.raw_failed, 0);
        assert!(summary.unknown_keys.is_empty(), "unknown: {:?}", summary.unknown_keys);
        assert_eq!(summary.stored_fields, report.measurements().count());
        assert!(!influx.writes()[0].body.contains("dateutc"));
    }
}
