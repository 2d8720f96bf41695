//! MQTT broker connection backed by rumqttc.
//!
//! Startup waits for the broker's CONNACK and fails hard if it never comes.
//! Afterwards a background task drives the event loop; rumqttc reconnects on
//! the next poll after an error.

use crate::config::MqttConfig;
use crate::publisher::{PublishError, Publisher};
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Request queue depth between the client handle and the event loop.
const REQUEST_CAPACITY: usize = 64;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("MQTT broker {broker} refused connection: {code:?}")]
    Refused {
        broker: String,
        code: ConnectReturnCode,
    },

    #[error("MQTT connection to {broker} failed: {source}")]
    Connection {
        broker: String,
        #[source]
        source: rumqttc::ConnectionError,
    },

    #[error("Timed out after {secs}s waiting for MQTT broker {broker}")]
    Timeout { broker: String, secs: u64 },
}

/// Build client options from config. Credentials are only set with a username.
pub fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut opts = MqttOptions::new(
        config.effective_client_id(),
        config.host.clone(),
        config.port,
    );
    opts.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    if let Some(username) = &config.username {
        opts.set_credentials(username, config.password.clone().unwrap_or_default());
    }
    opts
}

/// `Publisher` over a rumqttc client handle. QoS 0, fire-and-forget.
///
/// Never waits for queue space: while the broker is unreachable the request
/// queue fills and further publishes fail immediately.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

impl Publisher for MqttPublisher {
    async fn publish(
        &self,
        topic: &str,
        payload: String,
        retained: bool,
    ) -> Result<(), PublishError> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, retained, payload)
            .map_err(|e| PublishError::SendFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Live broker connection: the publisher plus the task polling its event loop.
pub struct MqttConnection {
    publisher: Arc<MqttPublisher>,
    event_task: JoinHandle<()>,
}

impl MqttConnection {
    pub fn publisher(&self) -> Arc<MqttPublisher> {
        self.publisher.clone()
    }

    /// Send DISCONNECT and give the event loop a moment to flush it.
    pub async fn disconnect(mut self) {
        if let Err(e) = self.publisher.client.disconnect().await {
            log::warn!("MQTT disconnect request failed: {}", e);
        }
        if tokio::time::timeout(DISCONNECT_TIMEOUT, &mut self.event_task)
            .await
            .is_err()
        {
            log::warn!("MQTT event loop did not stop in time, aborting");
            self.event_task.abort();
        }
    }
}

/// Connect to the broker, waiting up to `connect_timeout_secs` for CONNACK.
pub async fn connect(config: &MqttConfig) -> Result<MqttConnection, ConnectError> {
    let broker = format!("{}:{}", config.host, config.port);
    let (client, mut event_loop) = AsyncClient::new(mqtt_options(config), REQUEST_CAPACITY);

    let secs = config.connect_timeout_secs;
    tokio::time::timeout(
        Duration::from_secs(secs),
        wait_for_connack(&mut event_loop, &broker),
    )
    .await
    .map_err(|_| ConnectError::Timeout {
        broker: broker.clone(),
        secs,
    })??;
    log::info!("Connected to MQTT broker {}", broker);

    let event_task = tokio::spawn(drive_event_loop(event_loop, broker));

    Ok(MqttConnection {
        publisher: Arc::new(MqttPublisher::new(client)),
        event_task,
    })
}

async fn wait_for_connack(event_loop: &mut EventLoop, broker: &str) -> Result<(), ConnectError> {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(())
                } else {
                    Err(ConnectError::Refused {
                        broker: broker.to_string(),
                        code: ack.code,
                    })
                };
            }
            Ok(_) => {}
            Err(source) => {
                return Err(ConnectError::Connection {
                    broker: broker.to_string(),
                    source,
                })
            }
        }
    }
}

async fn drive_event_loop(mut event_loop: EventLoop, broker: String) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                log::info!("Reconnected to MQTT broker {}", broker);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                log::debug!("MQTT disconnect sent to {}", broker);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("MQTT connection error ({}), retrying: {}", broker, e);
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mqtt_options_from_config() {
        let config = MqttConfig {
            host: "broker.lan".into(),
            port: 1884,
            client_id: Some("bridge".into()),
            keep_alive_secs: 45,
            ..MqttConfig::default()
        };
        let opts = mqtt_options(&config);
        assert_eq!(opts.broker_address(), ("broker.lan".to_string(), 1884));
        assert_eq!(opts.client_id(), "bridge");
        assert_eq!(opts.keep_alive(), Duration::from_secs(45));
        assert!(opts.credentials().is_none());
    }

    #[test]
    fn test_mqtt_options_credentials() {
        let config = MqttConfig {
            username: Some("ha".into()),
            password: Some("secret".into()),
            ..MqttConfig::default()
        };
        let opts = mqtt_options(&config);
        assert_eq!(
            opts.credentials(),
            Some(("ha".to_string(), "secret".to_string()))
        );
    }

    #[tokio::test]
    async fn test_connect_unreachable_broker_fails() {
        // Nothing listens on port 1 on loopback.
        let config = MqttConfig {
            host: "127.0.0.1".into(),
            port: 1,
            connect_timeout_secs: 5,
            ..MqttConfig::default()
        };
        let err = connect(&config).await.err().unwrap();
        assert!(matches!(
            err,
            ConnectError::Connection { .. } | ConnectError::Timeout { .. }
        ));
    }

    #[tokio::test]
    async fn test_publisher_enqueues_without_waiting_for_broker() {
        let (client, _event_loop) = AsyncClient::new(mqtt_options(&MqttConfig::default()), 4);
        let publisher = MqttPublisher::new(client);
        publisher
            .publish("homeassistant/sensor/ws2902/uv_index/state", "3".into(), false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_publisher_fails_fast_when_queue_full() {
        let (client, _event_loop) = AsyncClient::new(mqtt_options(&MqttConfig::default()), 4);
        let publisher = MqttPublisher::new(client);
        for i in 0..4 {
            publisher
                .publish("homeassistant/sensor/ws2902/uv_index/state", i.to_string(), false)
                .await
                .unwrap();
        }
        let result = tokio::time::timeout(
            Duration::from_millis(500),
            publisher.publish("homeassistant/sensor/ws2902/uv_index/state", "5".into(), false),
        )
        .await
        .expect("publish must not wait for queue space");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_publisher_fails_when_event_loop_dropped() {
        let (client, event_loop) = AsyncClient::new(mqtt_options(&MqttConfig::default()), 4);
        drop(event_loop);
        let publisher = MqttPublisher::new(client);
        let err = publisher
            .publish("homeassistant/sensor/ws2902/uv_index/state", "3".into(), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("uv_index/state"));
    }
}
