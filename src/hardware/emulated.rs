//! A rotary dial simulated from console input.
//!
//! Commands arrive one line at a time on stdin:
//!
//! * a run of digits (`5551234`) dials each digit as a real pulse train,
//! * `h` or `hook` lifts or replaces the handset,
//! * `n<count>` (for example `n13`) drives an arbitrary pulse train, which is
//!   how noise on the pulse contact looks to the decoder.
//!
//! The simulated lines follow the same pull-up conventions as the physical
//! wiring, so the decoder cannot tell the difference.

use std::{
    collections::VecDeque,
    io::BufRead,
    str::FromStr,
    sync::mpsc::{self, Receiver, Sender},
    thread,
    time::{Duration, Instant},
};

use tracing::warn;

use crate::hardware::{Line, LineLevel, LineSample, PhoneHardware};

/// Time the dial spends being wound before the first pulse.
const WIND_UP: Duration = Duration::from_millis(150);
/// 10 pps with a 60/40 break-make ratio.
const PULSE_BREAK: Duration = Duration::from_millis(60);
const PULSE_MAKE: Duration = Duration::from_millis(40);
/// Pause at rest between consecutive digits.
const INTER_DIGIT: Duration = Duration::from_millis(300);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmulatorCommand {
    ToggleHook,
    Pulses(u32),
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

/// Parses one console line into the commands it stands for.
pub fn parse_commands(input: &str) -> Result<Vec<EmulatorCommand>, UnknownCommand> {
    let input = input.trim();

    if input.is_empty() {
        return Ok(Vec::new());
    }

    if input.eq_ignore_ascii_case("h") || input.eq_ignore_ascii_case("hook") {
        return Ok(vec![EmulatorCommand::ToggleHook]);
    }

    if let Some(count) = input.strip_prefix('n') {
        return u32::from_str(count)
            .map(|count| vec![EmulatorCommand::Pulses(count)])
            .map_err(|_| UnknownCommand(input.to_string()));
    }

    input
        .chars()
        .filter(|c| !matches!(c, '-' | ' ' | '(' | ')'))
        .map(|c| match c.to_digit(10) {
            Some(0) => Ok(EmulatorCommand::Pulses(10)),
            Some(digit) => Ok(EmulatorCommand::Pulses(digit)),
            None => Err(UnknownCommand(input.to_string())),
        })
        .collect()
}

#[derive(Clone, Copy, Debug)]
struct Segment {
    pulse: LineLevel,
    dial: LineLevel,
    duration: Duration,
}

fn pulse_train(pulses: u32) -> impl Iterator<Item = Segment> {
    let wind_up = Segment {
        pulse: LineLevel::High,
        dial: LineLevel::Low,
        duration: WIND_UP,
    };
    let pulses = (0..pulses).flat_map(|_| {
        [
            Segment {
                pulse: LineLevel::Low,
                dial: LineLevel::Low,
                duration: PULSE_BREAK,
            },
            Segment {
                pulse: LineLevel::High,
                dial: LineLevel::Low,
                duration: PULSE_MAKE,
            },
        ]
    });
    let rest = Segment {
        pulse: LineLevel::High,
        dial: LineLevel::High,
        duration: INTER_DIGIT,
    };

    std::iter::once(wind_up)
        .chain(pulses)
        .chain(std::iter::once(rest))
}

pub struct Hardware {
    command_receiver: Receiver<EmulatorCommand>,

    script: VecDeque<Segment>,
    segment_ends: Option<Instant>,

    lines: LineSample,
}

impl Hardware {
    /// Builds an emulator fed from `command_receiver` instead of stdin.
    pub fn from_receiver(command_receiver: Receiver<EmulatorCommand>) -> Self {
        Hardware {
            command_receiver,
            script: VecDeque::new(),
            segment_ends: None,
            lines: LineSample::IDLE,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.script.is_empty() && self.segment_ends.is_none()
    }

    fn read_console(command_sender: Sender<EmulatorCommand>) {
        let stdin = std::io::stdin();

        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };

            match parse_commands(&line) {
                Ok(commands) => {
                    for command in commands {
                        if command_sender.send(command).is_err() {
                            return;
                        }
                    }
                }
                Err(UnknownCommand(input)) => {
                    warn!(%input, "unknown command, expected digits, `h` or `n<count>`")
                }
            }
        }
    }
}

impl PhoneHardware for Hardware {
    fn create() -> anyhow::Result<Self> {
        let (command_sender, command_receiver) = mpsc::channel();

        thread::Builder::new()
            .name(String::from("dial-console"))
            .spawn(move || Self::read_console(command_sender))?;

        Ok(Self::from_receiver(command_receiver))
    }

    fn update(&mut self, now: Instant) {
        while let Ok(command) = self.command_receiver.try_recv() {
            match command {
                EmulatorCommand::ToggleHook => {
                    self.lines.hook = match self.lines.hook {
                        LineLevel::High => LineLevel::Low,
                        LineLevel::Low => LineLevel::High,
                    };
                }
                EmulatorCommand::Pulses(count) => self.script.extend(pulse_train(count)),
            }
        }

        if let Some(ends) = self.segment_ends {
            if now < ends {
                return;
            }
        }

        // One segment per update, so every level is seen at least once even
        // when updates arrive late.
        match self.script.pop_front() {
            Some(segment) => {
                self.lines.pulse = segment.pulse;
                self.lines.dial = segment.dial;
                self.segment_ends = Some(now + segment.duration);
            }
            None => {
                self.lines.pulse = LineLevel::High;
                self.lines.dial = LineLevel::High;
                self.segment_ends = None;
            }
        }
    }

    fn read_line(&self, line: Line) -> LineLevel {
        match line {
            Line::Pulse => self.lines.pulse,
            Line::Dial => self.lines.dial,
            Line::Hook => self.lines.hook,
        }
    }
}
