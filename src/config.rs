//! Input bindings and the textual configuration grammar.
//!
//! `THRESH[, FIELD DELTA]*`, e.g. `"10, DST 1, DST -1"`: the first argument
//! is the per-second split threshold, each following argument binds one input
//! port to an address field and a signed delta.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Which address of a unit is counted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressField {
    Source,
    Destination,
}

impl AddressField {
    pub fn as_str(self) -> &'static str {
        match self {
            AddressField::Source => "SRC",
            AddressField::Destination => "DST",
        }
    }
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressField {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SRC" | "SOURCE" => Ok(AddressField::Source),
            "DST" | "DESTINATION" => Ok(AddressField::Destination),
            _ => Err(ConfigError::InvalidField(s.to_string())),
        }
    }
}

/// Static configuration of one input port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputBinding {
    pub field: AddressField,
    pub delta: i64,
}

impl InputBinding {
    pub fn new(field: AddressField, delta: i64) -> Self {
        Self { field, delta }
    }
}

impl fmt::Display for InputBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.delta)
    }
}

impl FromStr for InputBinding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let (Some(field), Some(delta), None) = (words.next(), words.next(), words.next()) else {
            return Err(ConfigError::MalformedBinding(s.trim().to_string()));
        };
        let field = field.parse()?;
        let delta = delta
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidDelta(delta.to_string()))?;
        Ok(Self { field, delta })
    }
}

/// Parses a threshold token: a non-negative integer that fits in `u32`.
pub fn parse_threshold(s: &str) -> Result<u32, ConfigError> {
    let s = s.trim();
    let value = s
        .parse::<i64>()
        .map_err(|_| ConfigError::InvalidThreshold(s.to_string()))?;
    if value < 0 {
        return Err(ConfigError::NegativeThreshold(value));
    }
    u32::try_from(value).map_err(|_| ConfigError::ThresholdTooLarge(value))
}

/// Threshold plus one binding per input port.
///
/// Parsing accepts a threshold with no bindings; building an engine from such
/// a config fails with [`ConfigError::NoInputs`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorConfig {
    pub threshold: u32,
    pub inputs: Vec<InputBinding>,
}

impl MonitorConfig {
    /// Builds a config from a signed threshold, rejecting negative values and
    /// an empty binding list.
    pub fn new(threshold: i64, inputs: Vec<InputBinding>) -> Result<Self, ConfigError> {
        if threshold < 0 {
            return Err(ConfigError::NegativeThreshold(threshold));
        }
        let threshold =
            u32::try_from(threshold).map_err(|_| ConfigError::ThresholdTooLarge(threshold))?;
        let config = Self { threshold, inputs };
        config.validate()?;
        Ok(config)
    }

    /// Checks the rules parsing alone does not enforce.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inputs.is_empty() {
            return Err(ConfigError::NoInputs);
        }
        Ok(())
    }
}

impl fmt::Display for MonitorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.threshold)?;
        for input in &self.inputs {
            write!(f, ", {input}")?;
        }
        Ok(())
    }
}

impl FromStr for MonitorConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut args = s.split(',').map(str::trim);
        let threshold = match args.next() {
            Some(t) if !t.is_empty() => parse_threshold(t)?,
            _ => return Err(ConfigError::EmptyConfig),
        };
        let inputs = args
            .filter(|a| !a.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<InputBinding>, _>>()?;
        Ok(Self { threshold, inputs })
    }
}
