//! Test helpers for HTTP ingest integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::watch;
use ws2902_mqtt::{Dispatcher, PublishError, Publisher, SensorRegistry};

pub const PREFIX: &str = "homeassistant";

/// One captured publish call.
#[derive(Debug, Clone)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub retained: bool,
}

/// In-memory publisher; every topic ending in a registered suffix fails.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<Published>>,
    failing_suffixes: Mutex<Vec<String>>,
}

impl RecordingPublisher {
    pub fn fail_on(&self, suffix: &str) {
        self.failing_suffixes.lock().unwrap().push(suffix.to_string());
    }

    pub fn messages(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }

    pub fn on_topic(&self, topic: &str) -> Vec<Published> {
        self.messages()
            .into_iter()
            .filter(|p| p.topic == topic)
            .collect()
    }
}

impl Publisher for RecordingPublisher {
    async fn publish(
        &self,
        topic: &str,
        payload: String,
        retained: bool,
    ) -> Result<(), PublishError> {
        if self
            .failing_suffixes
            .lock()
            .unwrap()
            .iter()
            .any(|s| topic.ends_with(s.as_str()))
        {
            return Err(PublishError::SendFailed {
                topic: topic.to_string(),
                reason: "test: broker gone".to_string(),
            });
        }
        self.published.lock().unwrap().push(Published {
            topic: topic.to_string(),
            payload,
            retained,
        });
        Ok(())
    }
}

/// A running bridge HTTP server on an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub publisher: Arc<RecordingPublisher>,
    shutdown_tx: watch::Sender<()>,
    handle: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        let publisher = Arc::new(RecordingPublisher::default());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(SensorRegistry::ws2902()),
            publisher.clone(),
            PREFIX,
        ));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let handle = tokio::spawn(ws2902_mqtt::http_server::serve(
            listener,
            dispatcher,
            shutdown_rx,
        ));
        Self {
            addr,
            publisher,
            shutdown_tx,
            handle,
        }
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        self.handle.await.unwrap().unwrap();
    }
}

pub fn topic(internal_id: &str, leaf: &str) -> String {
    format!("{}/sensor/ws2902/{}/{}", PREFIX, internal_id, leaf)
}
