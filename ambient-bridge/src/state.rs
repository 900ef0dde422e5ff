use crate::catalog::ComponentCatalog;
use crate::config::BridgeConfig;
use crate::influx::InfluxWriter;
use crate::mqtt::BusPublisher;
use std::sync::Arc;

/// Everything a request needs, built once at startup and read-only after.
pub struct AppContext<P> {
    pub config: BridgeConfig,
    pub catalog: ComponentCatalog,
    pub publisher: P,
    pub store: Option<InfluxWriter>,
}

pub type Shared<P> = Arc<AppContext<P>>;

impl<P: BusPublisher> AppContext<P> {
    pub fn new(config: BridgeConfig, catalog: ComponentCatalog, publisher: P) -> Self {
        let store = config.influx.as_ref().map(InfluxWriter::new);
        Self { config, catalog, publisher, store }
    }

    pub fn shared(self) -> Shared<P> {
        Arc::new(self)
    }
}

#[cfg(test)]
pub(crate) fn test_context(
    discovery: bool,
    influx: Option<&ambient_devkit::MockInfluxServer>,
) -> AppContext<ambient_devkit::MockMqttClient> {
    let mut txt = format!(
        r#"
        [mqtt]
        broker_host = "localhost"
        client_id = "ambient-bridge-test"
        topic_prefix = "weather"
        topic = "backyard"

        [hass]
        discovery = {discovery}
        "#
    );
    if let Some(server) = influx {
        txt.push_str(&format!(
            "[influx]\nhostname = \"{}\"\nport = {}\ndatabase = \"weather\"\n",
            server.addr().ip(),
            server.addr().port()
        ));
    }

    let config = BridgeConfig::from_toml_str(&txt, "test").unwrap();
    let catalog = ComponentCatalog::bundled().unwrap();
    AppContext::new(config, catalog, ambient_devkit::MockMqttClient::new())
}
