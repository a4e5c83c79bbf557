use std::time::Instant;

pub mod emulated;
#[cfg(feature = "real")]
pub mod physical;

#[cfg(not(feature = "real"))]
pub use emulated::Hardware;
#[cfg(feature = "real")]
pub use physical::Hardware;

/// Electrical level of a pulled-up input. Idle wiring reads `High`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineLevel {
    High,
    Low,
}

impl LineLevel {
    pub fn from_high(high: bool) -> Self {
        if high {
            LineLevel::High
        } else {
            LineLevel::Low
        }
    }

    pub fn is_high(self) -> bool {
        self == LineLevel::High
    }

    pub fn is_low(self) -> bool {
        self == LineLevel::Low
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Line {
    /// Make-break contact, one break per unit of the dialed digit.
    Pulse,
    /// Off-normal switch: `Low` while the dial is pulled away from rest.
    Dial,
    /// Cradle switch: `Low` while the handset is lifted.
    Hook,
}

/// One reading of all three lines, taken together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineSample {
    pub pulse: LineLevel,
    pub dial: LineLevel,
    pub hook: LineLevel,
}

impl LineSample {
    pub const IDLE: LineSample = LineSample {
        pulse: LineLevel::High,
        dial: LineLevel::High,
        hook: LineLevel::High,
    };
}

pub trait PhoneHardware {
    fn create() -> anyhow::Result<Self>
    where
        Self: Sized;

    fn update(&mut self, now: Instant);

    fn read_line(&self, line: Line) -> LineLevel;

    fn sample(&self) -> LineSample {
        LineSample {
            pulse: self.read_line(Line::Pulse),
            dial: self.read_line(Line::Dial),
            hook: self.read_line(Line::Hook),
        }
    }
}
