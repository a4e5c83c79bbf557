use std::{fmt, str::FromStr, time::Duration};

use crate::error::ConfigError;

pub const HOOK_SWITCH_PIN: u8 = 17;

/// Off-normal switch on the old latch wiring, now read as `Low` while the dial
/// is pulled away from rest.
pub const DIAL_REST_PIN: u8 = 22;
pub const DIAL_PULSE_PIN: u8 = 27;

/// Shortest break or make period a 10 pps dial produces, with tolerance.
/// Sampling any slower than this undercounts pulses.
pub const MIN_PULSE_WIDTH: Duration = Duration::from_millis(30);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(5);
pub const DEFAULT_ENDPOINT_PORT: u16 = 9001;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkMode {
    Console,
    Link,
}

impl FromStr for SinkMode {
    type Err = ();

    fn from_str(input: &str) -> Result<SinkMode, Self::Err> {
        match input.to_ascii_lowercase().as_str() {
            "console" => Ok(SinkMode::Console),
            "link" => Ok(SinkMode::Link),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireFormat {
    /// Bare payloads: `"7"`, `"picked_up"`.
    Plain,
    /// JSON records: `{"type":"dial","digit":7}`.
    Structured,
}

impl FromStr for WireFormat {
    type Err = ();

    fn from_str(input: &str) -> Result<WireFormat, Self::Err> {
        match input.to_ascii_lowercase().as_str() {
            "plain" => Ok(WireFormat::Plain),
            "structured" | "json" => Ok(WireFormat::Structured),
            _ => Err(()),
        }
    }
}

#[derive(Clone)]
pub struct NetworkCredentials {
    pub ssid: String,
    pub passphrase: String,
}

impl fmt::Debug for NetworkCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkCredentials")
            .field("ssid", &self.ssid)
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Channels {
    pub digit: String,
    pub hook: String,
    pub status: String,
}

impl Default for Channels {
    fn default() -> Self {
        Channels {
            digit: String::from("phone/dial"),
            hook: String::from("phone/hook"),
            status: String::from("phone/status"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EndpointConfig {
    pub address: String,
    pub port: u16,
    pub tls: bool,
    pub connect_timeout: Duration,
    pub publish_timeout: Duration,
}

impl EndpointConfig {
    /// `host:port`, used for route probing.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn url_for(&self, client_id: &str) -> String {
        let scheme = if self.tls { "wss" } else { "ws" };
        format!("{scheme}://{}/{client_id}", self.authority())
    }
}

/// Everything the link manager needs besides its two capabilities.
#[derive(Clone, Debug)]
pub struct LinkConfig {
    pub channels: Channels,
    pub client_id_base: String,
    pub announcement: String,
    pub wire_format: WireFormat,
    /// Minimum gap between attempts, for both the network and the session.
    pub reconnect_backoff: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            channels: Channels::default(),
            client_id_base: String::from("rotary-phone"),
            announcement: String::from("online"),
            wire_format: WireFormat::Plain,
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub sink: SinkMode,
    pub poll_interval: Duration,
    pub credentials: Option<NetworkCredentials>,
    pub endpoint: Option<EndpointConfig>,
    pub link: LinkConfig,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let sink = match var("EVENT_SINK") {
            Some(value) => parse_with(&value, "EVENT_SINK", "expected `console` or `link`")?,
            None => SinkMode::Link,
        };

        let wire_format = match var("WIRE_FORMAT") {
            Some(value) => {
                parse_with(&value, "WIRE_FORMAT", "expected `plain` or `structured`")?
            }
            None => WireFormat::Plain,
        };

        let poll_interval = millis(&var, "POLL_INTERVAL_MS")?.unwrap_or(DEFAULT_POLL_INTERVAL);
        if poll_interval.is_zero() || poll_interval >= MIN_PULSE_WIDTH {
            return Err(ConfigError::PollInterval {
                interval: poll_interval,
                limit: MIN_PULSE_WIDTH,
            });
        }

        let credentials = match (var("WIFI_SSID"), var("WIFI_PASSWORD")) {
            (Some(ssid), passphrase) => Some(NetworkCredentials {
                ssid,
                passphrase: passphrase.unwrap_or_default(),
            }),
            (None, Some(_)) => return Err(ConfigError::Missing("WIFI_SSID")),
            (None, None) => None,
        };

        let endpoint = match var("LINK_ENDPOINT_ADDRESS") {
            Some(address) => Some(EndpointConfig {
                address,
                port: match var("LINK_ENDPOINT_PORT") {
                    Some(value) => {
                        parse_with(&value, "LINK_ENDPOINT_PORT", "expected a port number")?
                    }
                    None => DEFAULT_ENDPOINT_PORT,
                },
                tls: match var("LINK_TLS") {
                    Some(value) => parse_with(&value, "LINK_TLS", "expected `true` or `false`")?,
                    None => false,
                },
                connect_timeout: millis(&var, "SESSION_CONNECT_TIMEOUT_MS")?
                    .unwrap_or(Duration::from_millis(800)),
                publish_timeout: millis(&var, "PUBLISH_TIMEOUT_MS")?
                    .unwrap_or(Duration::from_millis(200)),
            }),
            None if sink == SinkMode::Link => {
                return Err(ConfigError::Missing("LINK_ENDPOINT_ADDRESS"))
            }
            None => None,
        };

        let defaults = LinkConfig::default();
        let link = LinkConfig {
            channels: Channels {
                digit: var("DIAL_CHANNEL").unwrap_or(defaults.channels.digit),
                hook: var("HOOK_CHANNEL").unwrap_or(defaults.channels.hook),
                status: var("STATUS_CHANNEL").unwrap_or(defaults.channels.status),
            },
            client_id_base: var("CLIENT_ID_BASE").unwrap_or(defaults.client_id_base),
            announcement: var("ANNOUNCEMENT").unwrap_or(defaults.announcement),
            wire_format,
            reconnect_backoff: millis(&var, "RECONNECT_BACKOFF_MS")?
                .unwrap_or(defaults.reconnect_backoff),
        };

        Ok(RelayConfig {
            sink,
            poll_interval,
            credentials,
            endpoint,
            link,
        })
    }
}

fn parse_with<T: FromStr>(
    value: &str,
    key: &'static str,
    reason: &'static str,
) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason,
    })
}

fn millis<F>(var: &F, key: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|value| {
            parse_with::<u64>(&value, key, "expected milliseconds").map(Duration::from_millis)
        })
        .transpose()
}
