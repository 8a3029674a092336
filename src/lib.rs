//! # ip-cluster-monitor
//!
//! Adaptive per-second traffic counter over clusters of IPv4 addresses.
//!
//! Addresses are first clustered by their leading byte. A cluster whose count
//! grows by more than `THRESH` within one second is subdivided on the next
//! byte, down to full 4-byte addresses. Each processed unit is annotated with
//! the running count of its cluster, which a downstream stage can use to drop
//! traffic.
//!
//! ## Example
//!
//! ```rust
//! use std::net::Ipv4Addr;
//! use ip_cluster_monitor::{Ipv4Packet, ManualClock, MonitorEngine};
//!
//! // Count SYNs up and SYN-ACKs down by destination; split above 10/s.
//! let clock = ManualClock::new(0);
//! let mut monitor = MonitorEngine::from_conf("10, DST 1, DST -1", &clock).unwrap();
//!
//! let mut syn = Ipv4Packet::new(Ipv4Addr::new(1, 2, 3, 4), Ipv4Addr::new(10, 0, 0, 1));
//! assert_eq!(monitor.process(0, &mut syn), Ok(1));
//! assert_eq!(syn.ordinal(), Some(1));
//!
//! assert_eq!(monitor.lookup(Ipv4Addr::new(10, 0, 0, 1)), 1);
//! let look = monitor.read_handler("look").unwrap();
//! assert_eq!(look.lines().count(), 256);
//! assert_eq!(look.lines().nth(10), Some("10.*.*.*\t1"));
//! ```

mod clock;
mod config;
mod engine;
mod error;
mod packet;
mod table;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{parse_threshold, AddressField, InputBinding, MonitorConfig};
pub use engine::{Handler, MonitorEngine, SharedMonitor};
pub use error::{ConfigError, HandlerError, PacketError, ProcessError};
pub use packet::{Ipv4Packet, Unit};
pub use table::{ClusterTable, SplitPolicy, TableStats, FANOUT, MAX_DEPTH};

#[cfg(test)]
mod proptests;
