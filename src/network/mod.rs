pub mod link;
pub mod socket;
pub mod wifi;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    config::{Channels, WireFormat},
    dial::{DialEvent, HookPosition},
    error::{NetworkError, TransportError},
};

/// Hook transitions as the collector names them.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HookTransition {
    PickedUp,
    HungUp,
}

impl HookTransition {
    pub fn as_str(self) -> &'static str {
        match self {
            HookTransition::PickedUp => "picked_up",
            HookTransition::HungUp => "hung_up",
        }
    }
}

impl From<HookPosition> for HookTransition {
    fn from(position: HookPosition) -> Self {
        match position {
            HookPosition::OffHook => HookTransition::PickedUp,
            HookPosition::OnHook => HookTransition::HungUp,
        }
    }
}

/// Structured encoding of an outbound event.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PhoneOutgoingMessage {
    Dial { digit: u8 },
    Hook { state: HookTransition },
}

impl PhoneOutgoingMessage {
    /// Dial events worth sending. Invalid dials stay local diagnostics.
    pub fn from_event(event: &DialEvent) -> Option<Self> {
        match *event {
            DialEvent::DigitDialed(digit) => Some(PhoneOutgoingMessage::Dial { digit }),
            DialEvent::HookChanged(position) => Some(PhoneOutgoingMessage::Hook {
                state: position.into(),
            }),
            DialEvent::InvalidDial(_) => None,
        }
    }

    pub fn channel<'a>(&self, channels: &'a Channels) -> &'a str {
        match self {
            PhoneOutgoingMessage::Dial { .. } => &channels.digit,
            PhoneOutgoingMessage::Hook { .. } => &channels.hook,
        }
    }

    pub fn encode(&self, format: WireFormat) -> Result<String, serde_json::Error> {
        match (format, self) {
            (WireFormat::Plain, PhoneOutgoingMessage::Dial { digit }) => Ok(digit.to_string()),
            (WireFormat::Plain, PhoneOutgoingMessage::Hook { state }) => {
                Ok(state.as_str().to_string())
            }
            (WireFormat::Structured, message) => serde_json::to_string(message),
        }
    }
}

/// The wireless network underneath the session.
#[async_trait]
pub trait NetworkStack: Send {
    fn is_connected(&mut self) -> bool;

    /// Starts associating. Returns without waiting for the link to come up.
    async fn begin(&mut self) -> Result<(), NetworkError>;
}

/// A publish/subscribe session with the remote collector.
#[async_trait]
pub trait Transport: Send {
    fn is_connected(&self) -> bool;

    async fn connect(&mut self, client_id: &str) -> Result<(), TransportError>;

    async fn publish(&mut self, channel: &str, payload: &str) -> Result<(), TransportError>;

    /// Services keep-alives and drains inbound traffic without blocking.
    async fn poll(&mut self) -> Result<(), TransportError>;
}
