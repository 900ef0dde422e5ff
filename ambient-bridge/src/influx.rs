//! InfluxDB 1.x writer.
//!
//! One point per station report:
//! ```text
//! weather,host=edgewater tempf=63.1,humidity=35i 1651425636
//! ```
//! sent to `/write?db=<database>&precision=s`.

use crate::config::InfluxConf;
use crate::error::BridgeError;
use crate::fields::{self, FieldValue};
use time::OffsetDateTime;
use tracing::{debug, warn};

pub const MEASUREMENT: &str = "weather";
pub const HOST_TAG: &str = "host";

impl FieldValue {
    /// Integers get the `i` suffix, floats use shortest round-trip form.
    pub fn to_line_protocol(&self) -> String {
        match self {
            FieldValue::Integer(v) => format!("{v}i"),
            FieldValue::Float(v) => format!("{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: Vec<(String, String)>,
    pub fields: Vec<(String, FieldValue)>,
    /// Unix seconds.
    pub timestamp: i64,
}

impl Point {
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape_measurement(&self.measurement);

        let mut tags: Vec<_> = self.tags.iter().collect();
        tags.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, value) in tags {
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_key(value));
        }

        line.push(' ');
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(key, value)| format!("{}={}", escape_key(key), value.to_line_protocol()))
            .collect();
        line.push_str(&fields.join(","));

        line.push(' ');
        line.push_str(&self.timestamp.to_string());
        line
    }
}

/// Classify and convert every field. Ignored keys are skipped, values that
/// do not parse are returned separately so the rest of the point survives.
pub fn build_point(
    entries: &[(String, String)],
    host_tag: &str,
    timestamp: i64,
) -> (Point, Vec<BridgeError>) {
    let mut values = Vec::with_capacity(entries.len());
    let mut rejected = Vec::new();

    for (key, raw) in entries {
        if !is_storable_key(key) {
            rejected.push(BridgeError::FieldKey { key: key.clone() });
            continue;
        }
        match fields::parse_field(key, raw) {
            Ok(Some(value)) => values.push((key.clone(), value)),
            Ok(None) => {}
            Err(e) => rejected.push(e),
        }
    }

    let point = Point {
        measurement: MEASUREMENT.to_string(),
        tags: vec![(HOST_TAG.to_string(), host_tag.to_string())],
        fields: values,
        timestamp,
    };
    (point, rejected)
}

/// Line protocol has no escape for line breaks, and a trailing backslash
/// would swallow the `=` separator.
fn is_storable_key(key: &str) -> bool {
    !key.is_empty() && !key.chars().any(|c| c.is_control() || c == '\\')
}

fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

/// Tag keys, tag values and field keys share the same escaping rules.
fn escape_key(s: &str) -> String {
    s.replace(',', "\\,").replace('=', "\\=").replace(' ', "\\ ")
}

pub struct InfluxWriter {
    http: reqwest::Client,
    write_url: String,
    database: String,
    host_tag: String,
}

impl InfluxWriter {
    pub fn new(cfg: &InfluxConf) -> Self {
        Self {
            http: reqwest::Client::new(),
            write_url: format!("http://{}:{}/write", cfg.hostname, cfg.port),
            database: cfg.database.clone(),
            host_tag: cfg.host_tag.clone(),
        }
    }

    /// Builds one point from the report fields, stamped now, and writes it.
    /// Returns how many fields were written; 0 means nothing was sent.
    pub async fn write_report(&self, fields: &[(String, String)]) -> Result<usize, BridgeError> {
        let timestamp = OffsetDateTime::now_utc().unix_timestamp();
        let (point, rejected) = build_point(fields, &self.host_tag, timestamp);

        for e in &rejected {
            warn!("dropping field from time-series point: {e}");
        }
        if point.fields.is_empty() {
            debug!("no numeric fields left, skipping time-series write");
            return Ok(0);
        }

        self.write(&point).await?;
        Ok(point.fields.len())
    }

    pub async fn write(&self, point: &Point) -> Result<(), BridgeError> {
        let body = point.to_line_protocol();
        debug!("influx write: {body}");

        let resp = self
            .http
            .post(&self.write_url)
            .query(&[("db", self.database.as_str()), ("precision", "s")])
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(BridgeError::Store(format!("{status}: {}", detail.trim())));
        }
        Ok(())
    }
}
