use std::{
    sync::mpsc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use phone_dial_relay::{
    config::{LinkConfig, WireFormat},
    control::DialLoop,
    dial::{DialEvent, HookPosition},
    error::{NetworkError, TransportError},
    hardware::emulated::{self, EmulatorCommand},
    network::{link::LinkManager, NetworkStack, Transport},
    sink::LinkSink,
};

struct AlwaysUp;

#[async_trait]
impl NetworkStack for AlwaysUp {
    fn is_connected(&mut self) -> bool {
        true
    }

    async fn begin(&mut self) -> Result<(), NetworkError> {
        Ok(())
    }
}

/// A host that never gets a route, however often association is started.
#[derive(Default)]
struct Offline {
    begins: u32,
}

#[async_trait]
impl NetworkStack for Offline {
    fn is_connected(&mut self) -> bool {
        false
    }

    async fn begin(&mut self) -> Result<(), NetworkError> {
        self.begins += 1;
        Ok(())
    }
}

/// A collector that can be switched off and on mid-test.
#[derive(Default)]
struct Collector {
    reachable: bool,
    connected: bool,
    connects: u32,
    received: Vec<(String, String)>,
}

#[async_trait]
impl Transport for Collector {
    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self, _client_id: &str) -> Result<(), TransportError> {
        self.connects += 1;
        self.connected = self.reachable;
        if self.connected {
            Ok(())
        } else {
            Err(TransportError::Closed)
        }
    }

    async fn publish(&mut self, channel: &str, payload: &str) -> Result<(), TransportError> {
        self.received.push((channel.to_string(), payload.to_string()));
        Ok(())
    }

    async fn poll(&mut self) -> Result<(), TransportError> {
        if !self.reachable {
            self.connected = false;
        }
        Ok(())
    }
}

type Relay<N = AlwaysUp> = DialLoop<emulated::Hardware, LinkSink<N, Collector>>;

fn relay(
    collector: Collector,
    wire_format: WireFormat,
) -> (Relay, mpsc::Sender<EmulatorCommand>) {
    relay_over(AlwaysUp, collector, wire_format)
}

fn relay_over<N: NetworkStack>(
    network: N,
    collector: Collector,
    wire_format: WireFormat,
) -> (Relay<N>, mpsc::Sender<EmulatorCommand>) {
    let (sender, receiver) = mpsc::channel();
    let link = LinkManager::new(
        network,
        collector,
        LinkConfig {
            wire_format,
            ..LinkConfig::default()
        },
    );

    (
        DialLoop::new(
            emulated::Hardware::from_receiver(receiver),
            LinkSink::new(link),
            Duration::from_millis(5),
        ),
        sender,
    )
}

async fn run_for<N: NetworkStack>(
    relay: &mut Relay<N>,
    start: Instant,
    cycles: u32,
) -> Vec<DialEvent> {
    let mut events = Vec::new();
    for cycle in 0..cycles {
        events.extend(relay.cycle(start + Duration::from_millis(5 * cycle as u64)).await);
    }
    events
}

fn pair(channel: &str, payload: &str) -> (String, String) {
    (channel.to_string(), payload.to_string())
}

#[tokio::test]
async fn pick_up_dial_and_hang_up() {
    let collector = Collector {
        reachable: true,
        ..Default::default()
    };
    let (mut relay, dial) = relay(collector, WireFormat::Plain);

    dial.send(EmulatorCommand::ToggleHook).unwrap();
    for command in emulated::parse_commands("70").unwrap() {
        dial.send(command).unwrap();
    }
    dial.send(EmulatorCommand::Pulses(13)).unwrap();

    let start = Instant::now();
    let events = run_for(&mut relay, start, 1_500).await;
    dial.send(EmulatorCommand::ToggleHook).unwrap();
    let hang_up = run_for(&mut relay, start + Duration::from_secs(10), 1).await;
    let events = [events, hang_up].concat();

    assert_eq!(
        events,
        vec![
            DialEvent::HookChanged(HookPosition::OffHook),
            DialEvent::DigitDialed(7),
            DialEvent::DigitDialed(0),
            DialEvent::InvalidDial(13),
            DialEvent::HookChanged(HookPosition::OnHook),
        ]
    );

    assert_eq!(
        relay.sink().link().transport().received,
        vec![
            pair("phone/status", "online"),
            pair("phone/hook", "picked_up"),
            pair("phone/dial", "7"),
            pair("phone/dial", "0"),
            pair("phone/hook", "hung_up"),
        ]
    );
}

#[tokio::test]
async fn structured_records_on_the_wire() {
    let collector = Collector {
        reachable: true,
        ..Default::default()
    };
    let (mut relay, dial) = relay(collector, WireFormat::Structured);

    dial.send(EmulatorCommand::ToggleHook).unwrap();
    dial.send(EmulatorCommand::Pulses(2)).unwrap();
    run_for(&mut relay, Instant::now(), 400).await;

    assert_eq!(
        relay.sink().link().transport().received[1..],
        [
            pair("phone/hook", r#"{"type":"hook","state":"picked_up"}"#),
            pair("phone/dial", r#"{"type":"dial","digit":2}"#),
        ]
    );
}

#[tokio::test]
async fn decoding_continues_while_the_collector_is_away() {
    let (mut relay, dial) = relay(Collector::default(), WireFormat::Plain);

    for command in emulated::parse_commands("12").unwrap() {
        dial.send(command).unwrap();
    }
    let events = run_for(&mut relay, Instant::now(), 800).await;

    assert_eq!(
        events,
        vec![DialEvent::DigitDialed(1), DialEvent::DigitDialed(2)]
    );

    let link = relay.sink().link();
    assert!(link.transport().received.is_empty());
    assert!(!link.state().session_connected);
    // 4 s of cycles with the default 5 s backoff: only the first attempt.
    assert_eq!(link.transport().connects, 1);
}

#[tokio::test]
async fn dialing_is_not_held_up_by_a_missing_network() {
    let collector = Collector {
        reachable: true,
        ..Default::default()
    };
    let (mut relay, dial) = relay_over(Offline::default(), collector, WireFormat::Plain);

    for command in emulated::parse_commands("404").unwrap() {
        dial.send(command).unwrap();
    }
    let started = Instant::now();
    let events = run_for(&mut relay, started, 2_400).await;

    assert_eq!(
        events,
        vec![
            DialEvent::DigitDialed(4),
            DialEvent::DigitDialed(0),
            DialEvent::DigitDialed(4),
        ]
    );
    // 12 s of simulated cycles must not cost anything near that in real time.
    assert!(started.elapsed() < Duration::from_secs(3));

    let link = relay.sink().link();
    // One association attempt per 5 s backoff window: at 0, 5 and 10 s.
    assert_eq!(link.network().begins, 3);
    assert_eq!(link.transport().connects, 0);
    assert!(link.transport().received.is_empty());
    assert!(!link.state().network_connected);
}
