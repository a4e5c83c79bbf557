use std::time::Instant;

use tracing::{debug, trace};

use crate::hardware::{LineLevel, LineSample};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookPosition {
    OnHook,
    OffHook,
}

impl HookPosition {
    /// The cradle switch is pulled up, so a resting handset reads `High`.
    pub fn from_line(level: LineLevel) -> Self {
        match level {
            LineLevel::High => HookPosition::OnHook,
            LineLevel::Low => HookPosition::OffHook,
        }
    }

    pub fn is_off_hook(self) -> bool {
        self == HookPosition::OffHook
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DialEvent {
    HookChanged(HookPosition),
    DigitDialed(u8),
    /// The dial returned to rest after more than ten pulses.
    InvalidDial(u32),
}

/// Maps a completed pulse train to the digit it stands for. Ten pulses is `0`.
pub fn digit_for_pulses(pulses: u32) -> Option<u8> {
    match pulses {
        1..=9 => Some(pulses as u8),
        10 => Some(0),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DialSession {
    active: bool,
    pulse_count: u32,
    last_line_state: LineLevel,
    last_pulse_at: Option<Instant>,
}

impl Default for DialSession {
    fn default() -> Self {
        DialSession {
            active: false,
            pulse_count: 0,
            last_line_state: LineLevel::High,
            last_pulse_at: None,
        }
    }
}

impl DialSession {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn pulse_count(&self) -> u32 {
        self.pulse_count
    }

    pub fn last_pulse_at(&self) -> Option<Instant> {
        self.last_pulse_at
    }
}

#[derive(Clone, Copy, Debug)]
pub struct HookState {
    current: HookPosition,
}

impl Default for HookState {
    fn default() -> Self {
        HookState {
            current: HookPosition::OnHook,
        }
    }
}

impl HookState {
    pub fn current(&self) -> HookPosition {
        self.current
    }
}

/// Turns raw line samples into dial and hook events.
///
/// A session opens when the dial leaves its rest position, counts falling
/// edges on the pulse contact, and closes when the dial comes back to rest.
/// Only the return to rest ends a session; there is no inter-pulse timeout.
#[derive(Debug, Default)]
pub struct DialDecoder {
    session: DialSession,
    hook: HookState,
}

impl DialDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> &DialSession {
        &self.session
    }

    pub fn hook(&self) -> &HookState {
        &self.hook
    }

    pub fn sample(&mut self, lines: LineSample, now: Instant) -> Vec<DialEvent> {
        let mut events = Vec::new();

        let hook = HookPosition::from_line(lines.hook);
        if hook != self.hook.current {
            events.push(DialEvent::HookChanged(hook));
            self.hook.current = hook;
        }

        if lines.dial.is_low() && !self.session.active {
            debug!("dial lifted, ready for number");
            self.session.active = true;
            self.session.pulse_count = 0;
        }

        if self.session.active
            && self.session.last_line_state.is_high()
            && lines.pulse.is_low()
        {
            self.session.pulse_count += 1;
            self.session.last_pulse_at = Some(now);
            trace!(pulses = self.session.pulse_count, "pulse detected");
        }

        if lines.dial.is_high() && self.session.active {
            let pulses = self.session.pulse_count;

            match digit_for_pulses(pulses) {
                Some(digit) => events.push(DialEvent::DigitDialed(digit)),
                None if pulses > 0 => events.push(DialEvent::InvalidDial(pulses)),
                None => debug!("dial returned to rest without pulses"),
            }

            self.session.active = false;
            self.session.pulse_count = 0;
        }

        self.session.last_line_state = lines.pulse;

        events
    }
}
