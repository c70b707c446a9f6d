use std::fmt::Display;

/// A test condition code: supply voltage percentage (or scan variant) plus the
/// back-bias voltage, e.g. 103 = 100% supply with 3V back bias, 90 = 90% supply
/// without back bias, 203 = tuned/masked scan with 3V back bias.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Condition(u8);

impl Condition {
    /// Used by tests which do not vary any condition
    pub const UNCONDITIONED: Condition = Condition(0);

    pub const fn new(code: u8) -> Self {
        Self(code)
    }

    pub fn code(&self) -> u8 {
        self.0
    }

    /// Integer division is deliberate: 103 -> 100, 90 -> 90, 203 -> 200
    pub fn variant(&self) -> u8 {
        (self.0 / 10) * 10
    }

    pub fn back_bias(&self) -> u8 {
        self.0 - self.variant()
    }

    /// Supply voltage in percent of nominal (digital scan conditions)
    pub fn voltage_percent(&self) -> u8 {
        self.variant()
    }

    /// 200-series codes mark tuned thresholds or masked noise scans
    pub fn is_tuned(&self) -> bool {
        self.variant() == 200
    }
}

impl From<u8> for Condition {
    fn from(code: u8) -> Self {
        Self(code)
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
