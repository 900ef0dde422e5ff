/*!
Mock MQTT client for tests without a broker.

Records every successful publish and can be told to reject given topics, to
check that one failing publish does not stop the others.
*/

use anyhow::Result;
use rumqttc::QoS;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

/// Mock MQTT client mirroring the publish side of `rumqttc::AsyncClient`
#[derive(Clone, Default)]
pub struct MockMqttClient {
    published_messages: Arc<Mutex<Vec<MockMessage>>>,
    failing_topics: Arc<Mutex<HashSet<String>>>,
}

impl MockMqttClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every later publish to `topic` fails and is not recorded.
    pub fn fail_topic<S: Into<String>>(&self, topic: S) {
        self.failing_topics.lock().unwrap().insert(topic.into());
    }

    /// Same shape as `AsyncClient::publish`
    pub async fn publish<S, V>(&self, topic: S, qos: QoS, retain: bool, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            retain,
        };

        if self.failing_topics.lock().unwrap().contains(&message.topic) {
            tracing::debug!("[MOCK] rejecting publish to {}", message.topic);
            anyhow::bail!("mock broker rejected {}", message.topic);
        }

        tracing::debug!("[MOCK] published to {}: {} bytes", message.topic, message.payload.len());
        self.published_messages.lock().unwrap().push(message);
        Ok(())
    }

    /// All recorded messages, in publish order
    pub fn get_published_messages(&self) -> Vec<MockMessage> {
        self.published_messages.lock().unwrap().clone()
    }

    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<MockMessage> {
        self.published_messages
            .lock()
            .unwrap()
            .iter()
            .filter(|msg| msg.topic == topic)
            .cloned()
            .collect()
    }

    /// Parses the last message of a topic as JSON
    pub fn get_last_json_message<T>(&self, topic: &str) -> Result<Option<T>>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let messages = self.find_messages_by_topic(topic);
        if let Some(last_msg) = messages.last() {
            let parsed: T = serde_json::from_slice(&last_msg.payload)?;
            Ok(Some(parsed))
        } else {
            Ok(None)
        }
    }

    pub fn clear(&self) {
        self.published_messages.lock().unwrap().clear();
        self.failing_topics.lock().unwrap().clear();
    }
}
