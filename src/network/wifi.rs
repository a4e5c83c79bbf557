use std::{
    net::{SocketAddr, UdpSocket},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    net::lookup_host,
    process::{Child, Command},
    time::timeout,
};
use tracing::{debug, warn};

use crate::{config::NetworkCredentials, error::NetworkError, network::NetworkStack};

const ASSOCIATION_PROGRAM: &str = "nmcli";
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(1);

/// The host's own network, as seen from the relay.
///
/// Being "connected" means the kernel has a route to the collector. The
/// collector's address is resolved in `begin` and kept until a route check
/// fails. When credentials are configured, association is handed to
/// NetworkManager and left running in the background.
pub struct HostNetwork {
    credentials: Option<NetworkCredentials>,
    route_target: String,
    resolved: Option<SocketAddr>,
    association_program: String,
    association: Option<Child>,
}

impl HostNetwork {
    pub fn create(credentials: Option<NetworkCredentials>, route_target: String) -> Self {
        HostNetwork {
            credentials,
            route_target,
            resolved: None,
            association_program: String::from(ASSOCIATION_PROGRAM),
            association: None,
        }
    }

    /// Runs `program device wifi connect <ssid> password <passphrase>`
    /// instead of `nmcli`.
    pub fn with_association_program(mut self, program: impl Into<String>) -> Self {
        self.association_program = program.into();
        self
    }

    fn reap_association(&mut self) {
        let Some(child) = &mut self.association else {
            return;
        };

        match child.try_wait() {
            Ok(Some(status)) if status.success() => {
                debug!("association finished");
                self.association = None;
            }
            Ok(Some(status)) => {
                warn!(%status, "association failed");
                self.association = None;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "lost track of association");
                self.association = None;
            }
        }
    }

    fn start_association(&mut self) -> Result<(), NetworkError> {
        let Some(credentials) = &self.credentials else {
            debug!("no credentials configured, waiting for the host to associate");
            return Ok(());
        };

        if self.association.is_some() {
            debug!("association still running");
            return Ok(());
        }

        let child = Command::new(&self.association_program)
            .args(["device", "wifi", "connect", credentials.ssid.as_str()])
            .args(["password", credentials.passphrase.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        debug!(ssid = %credentials.ssid, "association started");
        self.association = Some(child);

        Ok(())
    }

    async fn resolve(&mut self) -> Result<SocketAddr, NetworkError> {
        if let Some(addr) = self.resolved {
            return Ok(addr);
        }

        let failed = |reason: String| NetworkError::Resolve {
            target: self.route_target.clone(),
            reason,
        };

        let mut addrs = timeout(RESOLVE_TIMEOUT, lookup_host(self.route_target.as_str()))
            .await
            .map_err(|_| failed(format!("no answer within {RESOLVE_TIMEOUT:?}")))?
            .map_err(|e| failed(e.to_string()))?;
        let addr = addrs
            .next()
            .ok_or_else(|| failed(String::from("no addresses")))?;

        debug!(endpoint = %self.route_target, %addr, "collector resolved");
        self.resolved = Some(addr);

        Ok(addr)
    }
}

/// Connecting a UDP socket only asks the kernel for a route; nothing is sent.
fn has_route(addr: SocketAddr) -> bool {
    let local = match addr {
        SocketAddr::V4(_) => "0.0.0.0:0",
        SocketAddr::V6(_) => "[::]:0",
    };

    UdpSocket::bind(local)
        .and_then(|socket| socket.connect(addr))
        .is_ok()
}

#[async_trait]
impl NetworkStack for HostNetwork {
    fn is_connected(&mut self) -> bool {
        self.reap_association();

        let Some(addr) = self.resolved else {
            return false;
        };

        if has_route(addr) {
            true
        } else {
            self.resolved = None;
            false
        }
    }

    async fn begin(&mut self) -> Result<(), NetworkError> {
        self.start_association()?;
        self.resolve().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOOPBACK: &str = "127.0.0.1:9001";

    fn credentials() -> Option<NetworkCredentials> {
        Some(NetworkCredentials {
            ssid: String::from("lobby"),
            passphrase: String::from("hunter22"),
        })
    }

    async fn wait_for_reap(network: &mut HostNetwork) {
        for _ in 0..250 {
            network.is_connected();
            if network.association.is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        panic!("association was never reaped");
    }

    #[test]
    fn loopback_always_has_a_route() {
        assert!(has_route(LOOPBACK.parse().unwrap()));
    }

    #[test]
    fn ipv6_targets_bind_an_ipv6_socket() {
        if UdpSocket::bind("[::1]:0").is_err() {
            // Host without IPv6.
            return;
        }

        assert!(has_route("[::1]:9001".parse().unwrap()));
    }

    #[tokio::test]
    async fn ipv6_collectors_are_reachable() {
        if UdpSocket::bind("[::1]:0").is_err() {
            return;
        }
        let mut network = HostNetwork::create(None, String::from("[::1]:9001"));

        network.begin().await.unwrap();

        assert!(network.resolved.is_some_and(|addr| addr.is_ipv6()));
        assert!(network.is_connected());
    }

    #[tokio::test]
    async fn down_until_the_collector_is_resolved() {
        let mut network = HostNetwork::create(None, String::from(LOOPBACK));

        assert!(!network.is_connected());

        network.begin().await.unwrap();

        assert!(network.association.is_none());
        assert!(network.is_connected());
        assert!(network.is_connected());
    }

    #[tokio::test]
    async fn unresolvable_targets_stay_down() {
        let mut network = HostNetwork::create(None, String::from("not a host"));

        let result = network.begin().await;

        assert!(matches!(result, Err(NetworkError::Resolve { .. })));
        assert!(network.resolved.is_none());
        assert!(!network.is_connected());
    }

    #[tokio::test]
    async fn failed_route_checks_drop_the_cached_address() {
        let mut network = HostNetwork::create(None, String::from(LOOPBACK));
        network.resolved = Some("192.0.2.1:9".parse().unwrap());

        if network.is_connected() {
            // Host with a default route.
            return;
        }

        assert!(network.resolved.is_none());
        network.begin().await.unwrap();
        assert_eq!(network.resolved, Some(LOOPBACK.parse().unwrap()));
    }

    #[tokio::test]
    async fn running_association_is_not_restarted() {
        let mut network = HostNetwork::create(credentials(), String::from(LOOPBACK))
            .with_association_program("yes");

        network.begin().await.unwrap();
        let first = network.association.as_ref().and_then(Child::id);
        assert!(first.is_some());

        network.begin().await.unwrap();
        network.is_connected();

        assert_eq!(network.association.as_ref().and_then(Child::id), first);
    }

    #[tokio::test]
    async fn finished_association_is_reaped() {
        let mut network = HostNetwork::create(credentials(), String::from(LOOPBACK))
            .with_association_program("true");

        network.begin().await.unwrap();
        assert!(network.association.is_some());

        wait_for_reap(&mut network).await;

        network.begin().await.unwrap();
        assert!(network.association.is_some());
    }

    #[tokio::test]
    async fn failed_association_is_reaped() {
        let mut network = HostNetwork::create(credentials(), String::from(LOOPBACK))
            .with_association_program("false");

        network.begin().await.unwrap();

        wait_for_reap(&mut network).await;
        assert!(network.is_connected());
    }

    #[tokio::test]
    async fn missing_association_program_is_an_error() {
        let mut network = HostNetwork::create(credentials(), String::from(LOOPBACK))
            .with_association_program("/nonexistent/association-tool");

        let result = network.begin().await;

        assert!(matches!(result, Err(NetworkError::Association(_))));
        assert!(network.association.is_none());
    }
}
