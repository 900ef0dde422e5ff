/*!
 * HOME ASSISTANT DISCOVERY - per-sensor MQTT discovery documents
 *
 * ROLE:
 * Turns one station field into the availability / state / config triple
 * Home Assistant expects to auto-register a sensor entity.
 *
 * HOW IT WORKS:
 * - DeviceIdentity groups every sensor of one station (rebuilt per request)
 * - The catalog decides platform, display name, unit, icon and device class
 * - Documents are built fresh for every field and never cached
 */

use crate::catalog::ComponentCatalog;
use crate::config::HassConf;
use crate::error::BridgeError;
use crate::topics;
use rumqttc::QoS;
use serde::Serialize;

/// QoS for every discovery related publish (availability, state, config).
pub const DISCOVERY_QOS: QoS = QoS::AtLeastOnce;

pub const AVAILABILITY_ONLINE: &str = "online";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeviceIdentity {
    pub identifiers: Vec<String>,
    pub manufacturer: String,
    pub model: String,
    pub name: String,
    pub sw_version: String,
}

impl DeviceIdentity {
    /// Configured object id wins, otherwise the station id with `:` turned
    /// into `-`. `None` when neither is available.
    pub fn resolve(hass: &HassConf, station_id: Option<&str>, station_type: Option<&str>) -> Option<Self> {
        let device_id = match hass.object_id() {
            Some(object_id) => object_id.to_string(),
            None => station_id.filter(|id| !id.is_empty())?.replace(':', "-"),
        };

        Some(Self {
            identifiers: vec![device_id],
            manufacturer: hass.manufacturer().to_string(),
            model: hass.device_model().to_string(),
            name: hass.device_name().to_string(),
            sw_version: station_type.unwrap_or_default().to_string(),
        })
    }

    pub fn device_id(&self) -> &str {
        self.identifiers.first().map(String::as_str).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryDocument {
    pub availability_topic: String,
    #[serde(skip)]
    pub config_topic: String,
    pub device: DeviceIdentity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    pub name: String,
    pub qos: u8,
    pub state_topic: String,
    pub unique_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    #[serde(skip)]
    pub platform: String,
}

impl DiscoveryDocument {
    pub fn to_payload(&self, key: &str) -> Result<Vec<u8>, BridgeError> {
        serde_json::to_vec(self).map_err(|source| BridgeError::Serialize {
            key: key.to_string(),
            source,
        })
    }
}

#[derive(Debug, Clone)]
pub enum Discovery {
    Document(DiscoveryDocument),
    UnknownPlatform,
}

pub fn build_document(
    key: &str,
    device: &DeviceIdentity,
    catalog: &ComponentCatalog,
    discovery_prefix: &str,
) -> Discovery {
    let Some(entry) = catalog.lookup(key) else {
        return Discovery::UnknownPlatform;
    };
    let Some(platform) = entry.platform() else {
        return Discovery::UnknownPlatform;
    };

    let device_id = device.device_id();
    let name = non_empty(&entry.name).unwrap_or(key).to_string();

    Discovery::Document(DiscoveryDocument {
        availability_topic: topics::availability_topic(discovery_prefix, platform, device_id, &name),
        config_topic: topics::config_topic(discovery_prefix, platform, device_id, &name),
        state_topic: topics::state_topic(discovery_prefix, platform, device_id, &name),
        unique_id: topics::unique_id(device_id, key),
        device: device.clone(),
        device_class: non_empty(&entry.device_class).map(str::to_string),
        icon: non_empty(&entry.icon).map(str::to_string),
        unit_of_measurement: non_empty(&entry.unit).map(str::to_string),
        qos: DISCOVERY_QOS as u8,
        platform: platform.to_string(),
        name,
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
