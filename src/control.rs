use std::{
    future::Future,
    time::{Duration, Instant},
};

use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::{
    dial::{DialDecoder, DialEvent},
    hardware::PhoneHardware,
    sink::EventSink,
};

/// The polling loop: keep the link up, sample the dial, hand off events.
pub struct DialLoop<H, S> {
    hardware: H,
    decoder: DialDecoder,
    sink: S,
    poll_interval: Duration,
}

impl<H: PhoneHardware, S: EventSink> DialLoop<H, S> {
    pub fn new(hardware: H, sink: S, poll_interval: Duration) -> Self {
        DialLoop {
            hardware,
            decoder: DialDecoder::new(),
            sink,
            poll_interval,
        }
    }

    pub fn decoder(&self) -> &DialDecoder {
        &self.decoder
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// One cycle. Connectivity is settled before sampling so an event is never
    /// delivered against link state older than the cycle that produced it.
    pub async fn cycle(&mut self, now: Instant) -> Vec<DialEvent> {
        self.sink.maintain(now).await;

        self.hardware.update(now);
        let events = self.decoder.sample(self.hardware.sample(), now);

        for event in &events {
            self.sink.emit(event).await;
        }

        self.sink.pump().await;

        events
    }

    /// Cycles every poll interval until Ctrl-C.
    pub async fn run(&mut self) {
        self.run_until(tokio::signal::ctrl_c()).await;
    }

    /// Cycles every poll interval until `shutdown` resolves. A cycle in
    /// flight is abandoned.
    pub async fn run_until<F: Future>(&mut self, shutdown: F) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutting down");
                    break;
                }
                _ = async {
                    ticker.tick().await;
                    self.cycle(Instant::now()).await;
                } => {}
            }
        }
    }
}
