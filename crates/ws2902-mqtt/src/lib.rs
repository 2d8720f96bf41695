//! WS-2902 weather station to MQTT bridge.
//!
//! Receives the station's custom-server uploads over HTTP and republishes
//! every recognized measurement to MQTT, announcing each sensor once through
//! Home Assistant MQTT discovery.

pub mod config;
pub mod dispatch;
pub mod http_server;
pub mod mqtt;
pub mod publisher;
pub mod registry;
pub mod runner;
pub mod sensor;
pub mod units;

pub use config::{Config, ConfigError, ConfigSource, HttpConfig, MqttConfig};
pub use dispatch::{report_from_pairs, DispatchError, Dispatcher, Report};
pub use mqtt::{connect, ConnectError, MqttConnection, MqttPublisher};
pub use publisher::{PublishError, Publisher};
pub use registry::SensorRegistry;
pub use runner::{run, Args};
pub use sensor::{HandleError, SensorDescriptor, Transform, TransformError};
pub use units::Unit;
