use anyhow::Context;
use dotenv::dotenv;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use phone_dial_relay::{
    config::{RelayConfig, SinkMode},
    control::DialLoop,
    hardware::{Hardware, PhoneHardware},
    network::{link::LinkManager, socket::WebSocketTransport, wifi::HostNetwork},
    sink::{ConsoleSink, LinkSink},
};

fn init_logger() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("phone_dial_relay=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .compact(),
        )
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_logger();

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return Err(e.into());
        }
    };

    let hardware = Hardware::create().context("failed to set up dial hardware")?;

    info!(
        sink = ?config.sink,
        poll_interval = ?config.poll_interval,
        "rotary dial relay ready, dial a number"
    );

    match (config.sink, config.endpoint) {
        (SinkMode::Link, Some(endpoint)) => {
            let network = HostNetwork::create(config.credentials, endpoint.authority());
            let transport = WebSocketTransport::create(endpoint);
            let link = LinkManager::new(network, transport, config.link);

            DialLoop::new(hardware, LinkSink::new(link), config.poll_interval)
                .run()
                .await;
        }
        _ => {
            DialLoop::new(hardware, ConsoleSink, config.poll_interval)
                .run()
                .await;
        }
    }

    Ok(())
}
