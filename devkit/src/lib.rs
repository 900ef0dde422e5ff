/*!
# Ambient DevKit - test stubs for the bridge

Helpers for exercising the bridge without external services:
- MQTT stub recording every publish, with per-topic failure injection
- InfluxDB 1.x `/write` endpoint on an ephemeral port
- Builder for realistic weather station reports
*/

pub mod influx_stub;
pub mod mqtt_stub;
pub mod report_builder;

pub use influx_stub::{MockInfluxServer, RecordedWrite};
pub use mqtt_stub::{MockMessage, MockMqttClient};
pub use report_builder::StationReportBuilder;
