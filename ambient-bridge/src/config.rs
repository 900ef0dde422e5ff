use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

pub const DEFAULT_DEVICE_MODEL: &str = "ws-2902a";
pub const DEFAULT_DEVICE_NAME: &str = "ws-2902a";
pub const DEFAULT_MANUFACTURER: &str = "Ambient Weather";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BridgeConfig {
    #[serde(default)]
    pub http: HttpConf,
    pub mqtt: MqttConf,
    #[serde(default)]
    pub hass: HassConf,
    pub influx: Option<InfluxConf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpConf {
    #[serde(default = "default_http_port")]
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MqttConf {
    pub broker_host: String,
    #[serde(default = "default_broker_port")]
    pub broker_port: u16,
    pub broker_username: Option<String>,
    pub broker_password: Option<String>,
    pub client_id: String,
    pub topic_prefix: String,
    pub topic: String,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HassConf {
    #[serde(default)]
    pub discovery: bool,
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,
    pub object_id: Option<String>,
    pub device_model: Option<String>,
    pub device_name: Option<String>,
    pub manufacturer: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InfluxConf {
    pub hostname: String,
    #[serde(default = "default_influx_port")]
    pub port: u16,
    pub database: String,
    #[serde(default = "default_host_tag")]
    pub host_tag: String,
}

fn default_http_port() -> u16 { 8080 }
fn default_broker_port() -> u16 { 1883 }
fn default_keep_alive() -> u64 { 30 }
fn default_discovery_prefix() -> String { "homeassistant".into() }
fn default_influx_port() -> u16 { 8086 }
fn default_host_tag() -> String { "edgewater".into() }

impl Default for HttpConf {
    fn default() -> Self {
        Self { port: default_http_port() }
    }
}

impl Default for HassConf {
    fn default() -> Self {
        Self {
            discovery: false,
            discovery_prefix: default_discovery_prefix(),
            object_id: None,
            device_model: None,
            device_name: None,
            manufacturer: None,
        }
    }
}

impl MqttConf {
    /// Username and password, only when both are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.broker_username.as_deref(), self.broker_password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

impl HassConf {
    pub fn device_model(&self) -> &str {
        non_empty(&self.device_model).unwrap_or(DEFAULT_DEVICE_MODEL)
    }

    pub fn device_name(&self) -> &str {
        non_empty(&self.device_name).unwrap_or(DEFAULT_DEVICE_NAME)
    }

    pub fn manufacturer(&self) -> &str {
        non_empty(&self.manufacturer).unwrap_or(DEFAULT_MANUFACTURER)
    }

    pub fn object_id(&self) -> Option<&str> {
        non_empty(&self.object_id)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl BridgeConfig {
    pub fn from_toml_str(txt: &str, origin: &str) -> Result<Self, ConfigError> {
        let cfg: BridgeConfig = toml::from_str(txt).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty("mqtt.broker_host", &self.mqtt.broker_host)?;
        require_non_empty("mqtt.client_id", &self.mqtt.client_id)?;
        require_non_empty("mqtt.topic_prefix", &self.mqtt.topic_prefix)?;
        require_non_empty("mqtt.topic", &self.mqtt.topic)?;
        require_non_zero("mqtt.broker_port", self.mqtt.broker_port)?;
        require_non_zero("http.port", self.http.port)?;
        if self.hass.discovery {
            require_non_empty("hass.discovery_prefix", &self.hass.discovery_prefix)?;
        }
        if let Some(influx) = &self.influx {
            require_non_empty("influx.hostname", &influx.hostname)?;
            require_non_empty("influx.database", &influx.database)?;
            require_non_empty("influx.host_tag", &influx.host_tag)?;
            require_non_zero("influx.port", influx.port)?;
        }
        Ok(())
    }
}

fn require_non_empty(key: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid { key, reason: "must not be empty".into() });
    }
    Ok(())
}

fn require_non_zero(key: &'static str, value: u16) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid { key, reason: "must not be 0".into() });
    }
    Ok(())
}

pub async fn load_config(path: &Path) -> Result<BridgeConfig, ConfigError> {
    let origin = path.display().to_string();
    let txt = fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
        path: origin.clone(),
        source,
    })?;
    BridgeConfig::from_toml_str(&txt, &origin)
}
