use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::{
    dial::DialEvent,
    network::{
        link::{DeliveryResult, LinkManager},
        NetworkStack, PhoneOutgoingMessage, Transport,
    },
};

/// Where decoded events go. Selected once at startup.
#[async_trait]
pub trait EventSink: Send {
    /// Runs before the lines are sampled each cycle.
    async fn maintain(&mut self, _now: Instant) {}

    async fn emit(&mut self, event: &DialEvent);

    /// Runs after this cycle's events were emitted.
    async fn pump(&mut self) {}
}

fn log_event(event: &DialEvent) {
    match event {
        DialEvent::DigitDialed(digit) => info!(digit, "number dialed"),
        DialEvent::HookChanged(position) => info!(?position, "hook changed"),
        DialEvent::InvalidDial(pulses) => warn!(pulses, "invalid pulse count"),
    }
}

/// Logs events and nothing else.
#[derive(Debug, Default)]
pub struct ConsoleSink;

#[async_trait]
impl EventSink for ConsoleSink {
    async fn emit(&mut self, event: &DialEvent) {
        log_event(event);
    }
}

/// Logs events and forwards them to the collector.
pub struct LinkSink<N, T> {
    link: LinkManager<N, T>,
}

impl<N, T> LinkSink<N, T> {
    pub fn new(link: LinkManager<N, T>) -> Self {
        LinkSink { link }
    }

    pub fn link(&self) -> &LinkManager<N, T> {
        &self.link
    }
}

#[async_trait]
impl<N: NetworkStack, T: Transport> EventSink for LinkSink<N, T> {
    async fn maintain(&mut self, now: Instant) {
        self.link.maintain_connectivity(now).await;
    }

    async fn emit(&mut self, event: &DialEvent) {
        log_event(event);

        let Some(message) = PhoneOutgoingMessage::from_event(event) else {
            return;
        };

        match self.link.deliver(&message).await {
            DeliveryResult::Delivered => debug!(?message, "delivered"),
            DeliveryResult::Skipped(reason) => {
                info!(?message, ?reason, "not delivered, link is down")
            }
            DeliveryResult::Failed(e) => {
                warn!(?message, error = %e, "delivery failed, dropping event")
            }
        }
    }

    async fn pump(&mut self) {
        self.link.pump().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkConfig;
    use crate::dial::HookPosition;
    use crate::network::link::tests::{MockNetwork, MockTransport};

    fn connected_sink() -> LinkSink<MockNetwork, MockTransport> {
        let network = MockNetwork {
            connected: true,
            ..Default::default()
        };
        let transport = MockTransport {
            accept_connects: true,
            ..Default::default()
        };

        LinkSink::new(LinkManager::new(network, transport, LinkConfig::default()))
    }

    #[tokio::test]
    async fn forwards_digits_and_hook_changes() {
        let mut sink = connected_sink();

        sink.maintain(Instant::now()).await;
        sink.emit(&DialEvent::HookChanged(HookPosition::OffHook)).await;
        sink.emit(&DialEvent::DigitDialed(0)).await;
        sink.pump().await;

        let transport = sink.link().transport();
        assert_eq!(
            transport.published[1..],
            [
                (String::from("phone/hook"), String::from("picked_up")),
                (String::from("phone/dial"), String::from("0")),
            ]
        );
        assert_eq!(transport.polls, 1);
    }

    #[tokio::test]
    async fn invalid_dials_stay_local() {
        let mut sink = connected_sink();

        sink.maintain(Instant::now()).await;
        sink.emit(&DialEvent::InvalidDial(13)).await;

        assert_eq!(sink.link().transport().published.len(), 1);
    }

    #[tokio::test]
    async fn events_without_a_link_are_dropped() {
        let mut sink = connected_sink();

        sink.emit(&DialEvent::DigitDialed(4)).await;

        assert!(sink.link().transport().published.is_empty());
    }
}
