//! The monitor: input bindings in front of a cluster table, plus the named
//! administrative handlers.
//!
//! The engine is single-threaded run-to-completion: `process` and the
//! handlers take `&mut self` and never block. Hosts that dispatch from several
//! threads wrap it in [`SharedMonitor`].

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{parse_threshold, InputBinding, MonitorConfig};
use crate::error::{ConfigError, HandlerError, ProcessError};
use crate::packet::Unit;
use crate::table::{ClusterTable, TableStats};

// =============================================================================
// Handlers
// =============================================================================

/// Named administrative handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Handler {
    /// Read: per-cluster effective counts.
    Look,
    /// Read-write: per-second split threshold.
    Thresh,
    /// Write: reset every counter to the written value.
    Reset,
    /// Read: Unix second of the last reset.
    Since,
}

impl Handler {
    pub const ALL: [Handler; 4] = [Handler::Look, Handler::Thresh, Handler::Reset, Handler::Since];

    pub fn name(self) -> &'static str {
        match self {
            Handler::Look => "look",
            Handler::Thresh => "thresh",
            Handler::Reset => "reset",
            Handler::Since => "since",
        }
    }

    pub fn is_readable(self) -> bool {
        !matches!(self, Handler::Reset)
    }

    pub fn is_writable(self) -> bool {
        matches!(self, Handler::Thresh | Handler::Reset)
    }
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Handler {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Handler::ALL
            .into_iter()
            .find(|h| h.name() == s)
            .ok_or_else(|| HandlerError::UnknownHandler(s.to_string()))
    }
}

// =============================================================================
// Engine
// =============================================================================

pub struct MonitorEngine<C: Clock = SystemClock> {
    table: ClusterTable,
    inputs: Vec<InputBinding>,
    clock: C,
}

impl<C: Clock> MonitorEngine<C> {
    /// Builds an engine from a validated config. Fails without retaining any
    /// state if the config has no inputs.
    pub fn new(config: MonitorConfig, clock: C) -> Result<Self, ConfigError> {
        if let Err(err) = config.validate() {
            warn!(error = %err, "monitor configuration rejected");
            return Err(err);
        }
        info!(
            threshold = config.threshold,
            inputs = config.inputs.len(),
            "monitor configured"
        );
        let now = clock.now_unix_sec();
        Ok(Self {
            table: ClusterTable::new(config.threshold, now),
            inputs: config.inputs,
            clock,
        })
    }

    /// Builds an engine from bindings and a signed threshold.
    pub fn configure(
        inputs: Vec<InputBinding>,
        threshold: i64,
        clock: C,
    ) -> Result<Self, ConfigError> {
        let config = MonitorConfig::new(threshold, inputs).inspect_err(|err| {
            warn!(error = %err, "monitor configuration rejected");
        })?;
        Self::new(config, clock)
    }

    /// Builds an engine from the textual grammar, e.g. `"10, DST 1, DST -1"`.
    pub fn from_conf(conf: &str, clock: C) -> Result<Self, ConfigError> {
        let config = conf.parse::<MonitorConfig>().inspect_err(|err| {
            warn!(error = %err, conf, "monitor configuration rejected");
        })?;
        Self::new(config, clock)
    }

    /// Number of input ports; one per binding.
    #[inline]
    pub fn ninputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn inputs(&self) -> &[InputBinding] {
        &self.inputs
    }

    /// Counts `unit` on input `port`, annotates it with its ordinal and
    /// returns the ordinal.
    pub fn process<U: Unit + ?Sized>(
        &mut self,
        port: usize,
        unit: &mut U,
    ) -> Result<u32, ProcessError> {
        let binding = *self.inputs.get(port).ok_or(ProcessError::NoSuchInput {
            port,
            inputs: self.inputs.len(),
        })?;
        let addr = unit.address(binding.field);
        let ordinal = self.table.update(addr, binding.delta, self.clock.now_unix_sec());
        unit.set_ordinal(ordinal);
        Ok(ordinal)
    }

    /// Effective count of the cluster `addr` resolves to.
    pub fn lookup(&self, addr: Ipv4Addr) -> i64 {
        self.table.lookup(addr)
    }

    #[inline]
    pub fn threshold(&self) -> u32 {
        self.table.threshold()
    }

    /// Sets the split threshold. A negative value is rejected and the previous
    /// threshold kept.
    pub fn set_threshold(&mut self, threshold: i64) -> Result<(), ConfigError> {
        if threshold < 0 {
            warn!(threshold, "negative threshold rejected");
            return Err(ConfigError::NegativeThreshold(threshold));
        }
        let threshold =
            u32::try_from(threshold).map_err(|_| ConfigError::ThresholdTooLarge(threshold))?;
        info!(old = self.table.threshold(), new = threshold, "threshold changed");
        self.table.set_threshold(threshold);
        Ok(())
    }

    /// Drops every subdivision and sets every counter to `value`.
    pub fn reset(&mut self, value: i64) {
        let now = self.clock.now_unix_sec();
        info!(value, since = now, "monitor reset");
        self.table.reset(value, now);
    }

    /// Unix second of the last reset.
    #[inline]
    pub fn since(&self) -> u64 {
        self.table.since()
    }

    pub fn elapsed_since_reset(&self) -> u64 {
        self.clock.now_unix_sec().saturating_sub(self.table.since())
    }

    /// Textual dump of every resolved cluster, zero counts included.
    pub fn look(&self) -> String {
        self.table.print()
    }

    pub fn stats(&self) -> TableStats {
        self.table.stats()
    }

    pub fn table(&self) -> &ClusterTable {
        &self.table
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn read_handler(&self, name: &str) -> Result<String, HandlerError> {
        let handler: Handler = name.parse()?;
        match handler {
            Handler::Look => Ok(self.look()),
            Handler::Thresh => Ok(self.threshold().to_string()),
            Handler::Since => Ok(self.since().to_string()),
            Handler::Reset => Err(HandlerError::NotReadable(handler)),
        }
    }

    pub fn write_handler(&mut self, name: &str, value: &str) -> Result<(), HandlerError> {
        let handler: Handler = name.parse()?;
        match handler {
            Handler::Thresh => {
                let threshold = parse_threshold(value).inspect_err(|err| {
                    warn!(error = %err, "threshold write rejected");
                })?;
                self.set_threshold(i64::from(threshold))?;
                Ok(())
            }
            Handler::Reset => {
                let value = value.trim();
                let value = if value.is_empty() {
                    0
                } else {
                    value
                        .parse::<i64>()
                        .map_err(|_| HandlerError::InvalidResetValue(value.to_string()))?
                };
                self.reset(value);
                Ok(())
            }
            Handler::Look | Handler::Since => Err(HandlerError::NotWritable(handler)),
        }
    }
}

impl FromStr for MonitorEngine<SystemClock> {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_conf(s, SystemClock)
    }
}

impl<C: Clock> fmt::Debug for MonitorEngine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorEngine")
            .field("threshold", &self.threshold())
            .field("inputs", &self.inputs)
            .field("since", &self.since())
            .field("stats", &self.stats())
            .finish()
    }
}

// =============================================================================
// Shared access
// =============================================================================

/// Serialises every call on one engine behind a mutex.
pub struct SharedMonitor<C: Clock = SystemClock> {
    inner: Mutex<MonitorEngine<C>>,
}

impl<C: Clock> SharedMonitor<C> {
    pub fn new(engine: MonitorEngine<C>) -> Self {
        Self {
            inner: Mutex::new(engine),
        }
    }

    pub fn process<U: Unit + ?Sized>(
        &self,
        port: usize,
        unit: &mut U,
    ) -> Result<u32, ProcessError> {
        self.inner.lock().process(port, unit)
    }

    pub fn read_handler(&self, name: &str) -> Result<String, HandlerError> {
        self.inner.lock().read_handler(name)
    }

    pub fn write_handler(&self, name: &str, value: &str) -> Result<(), HandlerError> {
        self.inner.lock().write_handler(name, value)
    }

    /// Runs `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut MonitorEngine<C>) -> R) -> R {
        let mut engine = self.inner.lock();
        f(&mut *engine)
    }

    pub fn into_inner(self) -> MonitorEngine<C> {
        self.inner.into_inner()
    }
}
