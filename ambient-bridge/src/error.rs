use thiserror::Error;

/// Startup configuration problems. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Runtime failures of the translation pipeline. None of these ever reach the
/// HTTP caller; they are logged by the ingestion handler.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("cannot connect to MQTT broker {broker}: {reason}")]
    Connect { broker: String, reason: String },

    #[error("cannot serialize discovery document for {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot convert {key}={value:?} to {expected}")]
    FieldParse {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("field key {key:?} cannot be written to the time-series store")]
    FieldKey { key: String },

    #[error("time-series write failed: {0}")]
    Store(String),
}

impl From<reqwest::Error> for BridgeError {
    fn from(e: reqwest::Error) -> Self {
        BridgeError::Store(e.to_string())
    }
}
