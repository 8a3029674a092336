//! Error types for configuration, handler access and packet processing.

use crate::engine::Handler;

/// Errors raised while parsing or validating a monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration is empty: a threshold is required")]
    EmptyConfig,

    #[error("threshold must be an integer, got {0:?}")]
    InvalidThreshold(String),

    #[error("threshold must be non-negative, got {0}")]
    NegativeThreshold(i64),

    #[error("threshold {0} does not fit in 32 bits")]
    ThresholdTooLarge(i64),

    #[error("address field must be SRC or DST, got {0:?}")]
    InvalidField(String),

    #[error("delta must be a signed integer, got {0:?}")]
    InvalidDelta(String),

    #[error("input binding must be `FIELD DELTA`, got {0:?}")]
    MalformedBinding(String),

    #[error("at least one input binding is required")]
    NoInputs,
}

/// Errors raised by the named administrative handlers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    #[error("no handler named {0:?}")]
    UnknownHandler(String),

    #[error("handler `{0}` is write-only")]
    NotReadable(Handler),

    #[error("handler `{0}` is read-only")]
    NotWritable(Handler),

    #[error("reset value must be an integer, got {0:?}")]
    InvalidResetValue(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised when viewing raw bytes as an IPv4 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("packet too short for an IPv4 header: {0} bytes")]
    Truncated(usize),

    #[error("not an IPv4 packet: version {0}")]
    NotIpv4(u8),
}

/// Errors raised while pushing a unit through the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProcessError {
    #[error("input port {port} does not exist (monitor has {inputs} inputs)")]
    NoSuchInput { port: usize, inputs: usize },
}
