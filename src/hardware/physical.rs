use std::time::Instant;

use anyhow::Context;
use debouncr::{debounce_2, Debouncer, Repeat2};
use rppal::gpio::{Gpio, InputPin};

use crate::config::{DIAL_PULSE_PIN, DIAL_REST_PIN, HOOK_SWITCH_PIN};
use crate::hardware::{Line, LineLevel, PhoneHardware};

/// Raspberry Pi wiring. Each input is pulled up and must agree on two
/// consecutive reads before its level changes.
pub struct Hardware {
    hook_switch: InputPin,
    hook_switch_debounce: Debouncer<u8, Repeat2>,

    dial_rest: InputPin,
    dial_rest_debounce: Debouncer<u8, Repeat2>,
    dial_pulse: InputPin,
    dial_pulse_debounce: Debouncer<u8, Repeat2>,
}

impl PhoneHardware for Hardware {
    fn create() -> anyhow::Result<Self> {
        let gpio = Gpio::new().context("failed to initialize GPIO")?;

        let input = |pin: u8| -> anyhow::Result<InputPin> {
            Ok(gpio
                .get(pin)
                .with_context(|| format!("failed to get pin {pin}"))?
                .into_input_pullup())
        };

        Ok(Hardware {
            hook_switch: input(HOOK_SWITCH_PIN)?,
            hook_switch_debounce: debounce_2(true),

            dial_rest: input(DIAL_REST_PIN)?,
            dial_rest_debounce: debounce_2(true),
            dial_pulse: input(DIAL_PULSE_PIN)?,
            dial_pulse_debounce: debounce_2(true),
        })
    }

    fn update(&mut self, _now: Instant) {
        self.hook_switch_debounce.update(self.hook_switch.is_high());

        self.dial_rest_debounce.update(self.dial_rest.is_high());
        self.dial_pulse_debounce.update(self.dial_pulse.is_high());
    }

    fn read_line(&self, line: Line) -> LineLevel {
        let debounce = match line {
            Line::Pulse => &self.dial_pulse_debounce,
            Line::Dial => &self.dial_rest_debounce,
            Line::Hook => &self.hook_switch_debounce,
        };

        LineLevel::from_high(debounce.is_high())
    }
}
