//! Topic naming.
//!
//! Two independent schemes: raw republication under the configured
//! prefix/topic, and the Home Assistant discovery namespace.

use crate::config::MqttConf;

/// `{prefix}/{topic}/{key}`
pub fn raw_topic(mqtt: &MqttConf, key: &str) -> String {
    format!("{}/{}/{}", mqtt.topic_prefix, mqtt.topic, key)
}

pub fn availability_topic(discovery_prefix: &str, sensor_type: &str, device_id: &str, name: &str) -> String {
    format!("{discovery_prefix}/{sensor_type}/{device_id}/{name}/availability")
}

pub fn state_topic(discovery_prefix: &str, sensor_type: &str, device_id: &str, name: &str) -> String {
    format!("{discovery_prefix}/{sensor_type}/{device_id}/{name}/state")
}

pub fn config_topic(discovery_prefix: &str, sensor_type: &str, device_id: &str, name: &str) -> String {
    format!("{discovery_prefix}/{sensor_type}/{device_id}/{name}/config")
}

/// `{device_id}_{key}`
pub fn unique_id(device_id: &str, key: &str) -> String {
    format!("{device_id}_{key}")
}
