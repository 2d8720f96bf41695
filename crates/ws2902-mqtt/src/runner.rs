//! Process entry: CLI flags, logging, broker connection, HTTP server, shutdown.

use crate::config::{Config, ConfigSource};
use crate::dispatch::Dispatcher;
use crate::http_server;
use crate::mqtt;
use crate::registry::SensorRegistry;
use anyhow::Context;
use argh::FromArgs;
use log::LevelFilter;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// WS-2902 weather station to MQTT bridge with Home Assistant discovery
#[derive(FromArgs, Debug)]
pub struct Args {
    /// path to YAML configuration file (optional)
    #[argh(option, short = 'c', default = "PathBuf::from(\"ws2902-mqtt.yaml\")")]
    pub config: PathBuf,

    /// port to serve HTTP endpoint on
    #[argh(option)]
    pub port: Option<u16>,

    /// log level (debug, info, warning, error, critical)
    #[argh(option)]
    pub log: Option<String>,

    /// mqtt topic prefix
    #[argh(option)]
    pub prefix: Option<String>,

    /// mqtt server host
    #[argh(option)]
    pub mqtt_host: Option<String>,

    /// mqtt server port
    #[argh(option)]
    pub mqtt_port: Option<u16>,

    /// mqtt username
    #[argh(option)]
    pub mqtt_user: Option<String>,

    /// mqtt password
    #[argh(option)]
    pub mqtt_pass: Option<String>,
}

impl Args {
    /// Command line values win over the config file.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.http.port = port;
        }
        if let Some(level) = &self.log {
            config.log_level = level.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.mqtt.topic_prefix = prefix.clone();
        }
        if let Some(host) = &self.mqtt_host {
            config.mqtt.host = host.clone();
        }
        if let Some(port) = self.mqtt_port {
            config.mqtt.port = port;
        }
        if let Some(user) = &self.mqtt_user {
            config.mqtt.username = Some(user.clone());
        }
        if let Some(pass) = &self.mqtt_pass {
            config.mqtt.password = Some(pass.clone());
        }
    }
}

/// Initialize logging with env_logger.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn setup_logging(level: LevelFilter) {
    let default_filter = level.to_string().to_lowercase();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

/// Resolve configuration from the config file (defaults if it is absent) and `args`.
///
/// Logging is not initialized yet when this runs, so the source is returned
/// for the caller to report.
pub fn resolve_config(args: &Args) -> anyhow::Result<(Config, ConfigSource)> {
    let (mut config, source) = Config::load_or_default(&args.config)?;
    args.apply_to(&mut config);
    config.validate()?;
    Ok((config, source))
}

/// Run the bridge until Ctrl+C.
pub async fn run(args: Args) -> anyhow::Result<()> {
    let (config, source) = resolve_config(&args)?;
    setup_logging(config.log_filter()?);

    log::info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    match source {
        ConfigSource::File => log::info!("Config loaded from {}", args.config.display()),
        ConfigSource::Defaults => log::info!(
            "Config file {} not found, using defaults",
            args.config.display()
        ),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    })?;

    log::info!(
        "Connecting to MQTT broker {}:{}...",
        config.mqtt.host,
        config.mqtt.port
    );
    let connection = mqtt::connect(&config.mqtt)
        .await
        .context("MQTT broker unavailable at startup")?;

    let registry = Arc::new(SensorRegistry::ws2902());
    log::info!(
        "Republishing {} station fields under {}/sensor/ws2902/",
        registry.len(),
        config.mqtt.topic_prefix
    );
    let dispatcher = Arc::new(Dispatcher::new(
        registry,
        connection.publisher(),
        config.mqtt.topic_prefix.clone(),
    ));

    let served = http_server::run_http_server(dispatcher, &config.http, shutdown_rx).await;
    connection.disconnect().await;
    served.context("HTTP server failed")?;

    log::info!("ws2902-mqtt stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::from_args(&["ws2902-mqtt"], args).unwrap()
    }

    #[test]
    fn test_no_flags_keeps_config() {
        let mut config = Config::default();
        parse(&[]).apply_to(&mut config);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse(&[
            "--port", "9001",
            "--log", "debug",
            "--prefix", "ha",
            "--mqtt-host", "broker.lan",
            "--mqtt-port", "8883",
            "--mqtt-user", "bridge",
            "--mqtt-pass", "pw",
        ]);
        let mut config = Config::default();
        args.apply_to(&mut config);

        assert_eq!(config.http.port, 9001);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.mqtt.topic_prefix, "ha");
        assert_eq!(config.mqtt.host, "broker.lan");
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.mqtt.username.as_deref(), Some("bridge"));
        assert_eq!(config.mqtt.password.as_deref(), Some("pw"));
    }

    #[test]
    fn test_resolve_config_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.yaml");
        std::fs::write(&path, "mqtt:\n  host: from-file\n  topic_prefix: file\n").unwrap();

        let path_arg = path.to_string_lossy().to_string();
        let args = parse(&["-c", &path_arg, "--prefix", "flag"]);
        let (config, source) = resolve_config(&args).unwrap();
        assert_eq!(source, ConfigSource::File);
        assert_eq!(config.mqtt.host, "from-file");
        assert_eq!(config.mqtt.topic_prefix, "flag");
    }

    #[test]
    fn test_resolve_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path_arg = dir.path().join("absent.yaml").to_string_lossy().to_string();
        let args = parse(&["-c", &path_arg]);
        let (config, source) = resolve_config(&args).unwrap();
        assert_eq!(source, ConfigSource::Defaults);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_resolve_config_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path_arg = dir.path().join("absent.yaml").to_string_lossy().to_string();
        let args = parse(&["-c", &path_arg, "--log", "shouting"]);
        assert!(resolve_config(&args).is_err());
    }
}
