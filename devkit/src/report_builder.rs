/*!
Station report builder.

Produces the query fields an Ambient Weather WS-2902 sends to a custom
server, ready for `reqwest::RequestBuilder::query` or the bridge's report type.
*/

use chrono::Utc;

#[derive(Debug, Clone, Default)]
pub struct StationReportBuilder {
    fields: Vec<(String, String)>,
}

impl StationReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A full WS-2902A upload for the given station MAC.
    pub fn ws2902a<S: Into<String>>(passkey: S) -> Self {
        Self::new()
            .field("PASSKEY", passkey)
            .field("stationtype", "AMBWeatherV4.2.9")
            .field("dateutc", Utc::now().format("%Y-%m-%d %H:%M:%S").to_string())
            .field("tempinf", "64.0")
            .field("humidityin", "36")
            .field("baromrelin", "29.953")
            .field("baromabsin", "29.534")
            .field("tempf", "63.1")
            .field("humidity", "35")
            .field("winddir", "292")
            .field("windspeedmph", "2.2")
            .field("windgustmph", "2.2")
            .field("maxdailygust", "11.4")
            .field("hourlyrainin", "0.000")
            .field("eventrainin", "0.000")
            .field("dailyrainin", "0.000")
            .field("weeklyrainin", "0.000")
            .field("monthlyrainin", "0.000")
            .field("totalrainin", "15.610")
            .field("solarradiation", "645.94")
            .field("uv", "6")
            .field("batt_co2", "1")
    }

    /// Sets a field, replacing an earlier value for the same key.
    pub fn field<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => self.fields.push((key, value)),
        }
        self
    }

    pub fn without(mut self, key: &str) -> Self {
        self.fields.retain(|(k, _)| k != key);
        self
    }

    pub fn build(self) -> Vec<(String, String)> {
        self.fields
    }
}
