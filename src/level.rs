//! Severity levels and level bitmasks for audit log entries.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CourierLevel {
    /// Abnormal termination of a unit of work that may need operator action.
    Error = 0x01,
    /// Something abnormal happened but processing continues.
    Warning = 0x02,
    /// Routine information for review.
    Info = 0x04,
}

impl Default for CourierLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl CourierLevel {
    pub const ALL: [CourierLevel; 3] = [Self::Error, Self::Warning, Self::Info];

    /// Bit used for this level inside a [`LevelMask`].
    pub const fn bit(self) -> u8 {
        self as u8
    }

    /// Lowercase name written into log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }

    /// Resolve a raw level value, returning `None` for unknown bits.
    pub fn from_bits(bits: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.bit() == bits)
    }
}

/// Render a raw level value, using `unknown` for values outside the enumeration.
pub fn level_name(bits: u8) -> &'static str {
    CourierLevel::from_bits(bits).map_or("unknown", CourierLevel::name)
}

impl fmt::Display for CourierLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LevelParseError {
    #[error("Unrecognized level: {0}")]
    UnknownName(String),
    #[error("Incorrect {0} value")]
    InvalidMask(u8),
}

impl FromStr for CourierLevel {
    type Err = LevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warning" | "warn" => Ok(Self::Warning),
            "info" => Ok(Self::Info),
            other => Err(LevelParseError::UnknownName(other.to_owned())),
        }
    }
}

/// Bitmask of levels a logger is interested in.
///
/// An empty mask (`0`) admits every level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LevelMask(u8);

impl LevelMask {
    const KNOWN_BITS: u8 = 0x01 | 0x02 | 0x04;

    pub const ALL: LevelMask = LevelMask(0);

    /// Build a mask from a raw bitmap.
    ///
    /// `0` is accepted and means "all levels". Any other value must contain at
    /// least one known level bit.
    pub fn from_bits(bits: u8) -> Result<Self, LevelParseError> {
        if bits != 0 && bits & Self::KNOWN_BITS == 0 {
            return Err(LevelParseError::InvalidMask(bits));
        }
        Ok(Self(bits))
    }

    /// Build a mask from level names such as `["error", "warning"]`.
    pub fn from_names<I, S>(names: I) -> Result<Self, LevelParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().try_fold(Self(0), |mask, name| {
            let level: CourierLevel = name.as_ref().parse()?;
            Ok(mask.with(level))
        })
    }

    pub fn with(self, level: CourierLevel) -> Self {
        Self(self.0 | level.bit())
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn admits(self, level: CourierLevel) -> bool {
        self.0 == 0 || self.0 & level.bit() != 0
    }
}

impl From<CourierLevel> for LevelMask {
    fn from(level: CourierLevel) -> Self {
        Self(level.bit())
    }
}

impl FromStr for LevelMask {
    type Err = LevelParseError;

    /// Parse either a numeric bitmap (`"3"`) or a comma separated list of
    /// level names (`"error, warning"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Self::ALL);
        }
        if let Ok(bits) = trimmed.parse::<u8>() {
            return Self::from_bits(bits);
        }
        Self::from_names(trimmed.split(',').filter(|part| !part.trim().is_empty()))
    }
}
