use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::LinkConfig,
    error::TransportError,
    network::{NetworkStack, PhoneOutgoingMessage, Transport},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    NotConnected,
}

#[derive(Debug)]
pub enum DeliveryResult {
    Delivered,
    Skipped(SkipReason),
    Failed(TransportError),
}

#[derive(Clone, Copy, Debug)]
pub struct LinkState {
    pub network_connected: bool,
    pub session_connected: bool,
    pub last_network_attempt: Option<Instant>,
    pub last_reconnect_attempt: Option<Instant>,
    pub reconnect_backoff: Duration,
}

/// `<base>-<8 hex digits>`, fresh for every connect attempt so a reconnect
/// never collides with a session the broker still holds for us.
pub fn session_client_id(base: &str) -> String {
    format!("{base}-{:08x}", Uuid::new_v4().as_fields().0)
}

/// Keeps the session to the collector alive and pushes events through it.
pub struct LinkManager<N, T> {
    network: N,
    transport: T,
    config: LinkConfig,
    state: LinkState,
}

impl<N: NetworkStack, T: Transport> LinkManager<N, T> {
    pub fn new(network: N, transport: T, config: LinkConfig) -> Self {
        let state = LinkState {
            network_connected: false,
            session_connected: false,
            last_network_attempt: None,
            last_reconnect_attempt: None,
            reconnect_backoff: config.reconnect_backoff,
        };

        LinkManager {
            network,
            transport,
            config,
            state,
        }
    }

    pub fn state(&self) -> &LinkState {
        &self.state
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Never waits for the network to come up: association is started at
    /// most once per backoff window and its outcome is read on later cycles.
    pub async fn maintain_connectivity(&mut self, now: Instant) {
        let was_networked = self.state.network_connected;
        self.state.network_connected = self.network.is_connected();

        if !self.state.network_connected {
            self.state.session_connected = false;

            if was_networked {
                warn!("network lost");
            }

            if self.backoff_elapsed(self.state.last_network_attempt, now) {
                self.state.last_network_attempt = Some(now);
                self.begin_network().await;
            }

            if !self.state.network_connected {
                return;
            }
        }

        let was_connected = self.state.session_connected;
        self.state.session_connected = self.transport.is_connected();

        if self.state.session_connected {
            return;
        }

        if was_connected {
            warn!("session to collector lost");
        }

        if !self.backoff_elapsed(self.state.last_reconnect_attempt, now) {
            return;
        }

        self.state.last_reconnect_attempt = Some(now);

        let client_id = session_client_id(&self.config.client_id_base);

        match self.transport.connect(&client_id).await {
            Ok(()) => {
                info!(%client_id, "session connected");
                self.announce().await;
            }
            Err(e) => {
                let retry_in = self.state.reconnect_backoff;
                warn!(%client_id, error = %e, ?retry_in, "session connect failed");
            }
        }

        self.state.session_connected = self.transport.is_connected();
    }

    fn backoff_elapsed(&self, last: Option<Instant>, now: Instant) -> bool {
        match last {
            Some(last) => now.saturating_duration_since(last) >= self.state.reconnect_backoff,
            None => true,
        }
    }

    async fn begin_network(&mut self) {
        info!("connecting to network");

        if let Err(e) = self.network.begin().await {
            warn!(error = %e, "network association failed");
        }

        self.state.network_connected = self.network.is_connected();

        if self.state.network_connected {
            info!("network connected");
        }
    }

    async fn announce(&mut self) {
        let channel = &self.config.channels.status;

        match self.transport.publish(channel, &self.config.announcement).await {
            Ok(()) => debug!(%channel, "announced"),
            Err(e) => warn!(%channel, error = %e, "announcement failed"),
        }
    }

    pub async fn deliver(&mut self, message: &PhoneOutgoingMessage) -> DeliveryResult {
        if !self.state.session_connected {
            return DeliveryResult::Skipped(SkipReason::NotConnected);
        }

        let payload = match message.encode(self.config.wire_format) {
            Ok(payload) => payload,
            Err(e) => return DeliveryResult::Failed(e.into()),
        };
        let channel = message.channel(&self.config.channels);

        match self.transport.publish(channel, &payload).await {
            Ok(()) => DeliveryResult::Delivered,
            Err(e) => DeliveryResult::Failed(e),
        }
    }

    pub async fn pump(&mut self) {
        if !self.state.session_connected {
            return;
        }

        if let Err(e) = self.transport.poll().await {
            debug!(error = %e, "transport poll failed");
        }
    }
}
