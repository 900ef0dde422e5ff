use crate::config::MqttConf;
use crate::error::BridgeError;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Incoming, MqttOptions, QoS};
use std::future::Future;
use std::time::Duration;
use tokio::task;
use tokio::time::timeout;
use tracing::{debug, error, info};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_PAUSE: Duration = Duration::from_secs(2);

/// Publish side of the message bus. One call = one message, no retry.
pub trait BusPublisher: Send + Sync + 'static {
    fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send;
}

#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

impl BusPublisher for MqttPublisher {
    async fn publish(&self, topic: &str, qos: QoS, retain: bool, payload: Vec<u8>) -> Result<(), BridgeError> {
        self.client
            .publish(topic, qos, retain, payload)
            .await
            .map_err(|e| BridgeError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
impl BusPublisher for ambient_devkit::MockMqttClient {
    async fn publish(&self, topic: &str, qos: QoS, retain: bool, payload: Vec<u8>) -> Result<(), BridgeError> {
        ambient_devkit::MockMqttClient::publish(self, topic, qos, retain, payload)
            .await
            .map_err(|e| BridgeError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }
}

fn mqtt_options(cfg: &MqttConf) -> MqttOptions {
    let mut opts = MqttOptions::new(&cfg.client_id, &cfg.broker_host, cfg.broker_port);
    opts.set_keep_alive(Duration::from_secs(cfg.keep_alive_secs.max(5)));
    opts.set_clean_session(true);
    if let Some((user, pass)) = cfg.credentials() {
        opts.set_credentials(user, pass);
    }
    opts
}

/// Connects to the broker and waits for its CONNACK, then hands the event
/// loop to a background task. Failure here is fatal for startup.
pub async fn connect(cfg: &MqttConf) -> Result<MqttPublisher, BridgeError> {
    let broker = format!("{}:{}", cfg.broker_host, cfg.broker_port);
    let (client, mut eventloop) = AsyncClient::new(mqtt_options(cfg), 10);

    match timeout(CONNECT_TIMEOUT, wait_for_connack(&mut eventloop)).await {
        Ok(Ok(())) => info!("connected to MQTT at {broker}"),
        Ok(Err(reason)) => return Err(BridgeError::Connect { broker, reason }),
        Err(_) => {
            return Err(BridgeError::Connect {
                broker,
                reason: format!("no CONNACK within {}s", CONNECT_TIMEOUT.as_secs()),
            })
        }
    }

    spawn_event_loop(eventloop, broker);
    Ok(MqttPublisher::new(client))
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), String> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                return match ack.code {
                    ConnectReturnCode::Success => Ok(()),
                    code => Err(format!("connection refused: {code:?}")),
                };
            }
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }
}

/// Drives the client; rumqttc reconnects on the next poll after an error.
fn spawn_event_loop(mut eventloop: EventLoop, broker: String) {
    task::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        info!("connected to MQTT at {broker}");
                    } else {
                        error!("MQTT broker {broker} refused connection: {:?}", ack.code);
                    }
                }
                Ok(Event::Incoming(Incoming::PubAck(ack))) => {
                    debug!("puback pkid={}", ack.pkid);
                }
                Ok(_) => {}
                Err(e) => {
                    error!("connection to MQTT at {broker} lost: {e}");
                    tokio::time::sleep(RECONNECT_PAUSE).await;
                }
            }
        }
    });
}
