//! ws2902-mqtt
//!
//! Point the station's "customized" upload server at this process
//! (path `/data?`, default port 8543) and it republishes every report to MQTT
//! with Home Assistant discovery configs.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ws2902_mqtt::run(argh::from_env()).await
}
