//! Rate-split cluster trie.
//!
//! Every IPv4 address resolves to exactly one leaf counter. The root node is
//! indexed by the first address byte; when a leaf's value grows by more than
//! the threshold inside a single one-second window, the leaf is replaced by a
//! child node indexed by the next byte. At most four levels exist.
//!
//! Counts recorded before a split are kept once in the child's `base`, so the
//! effective count of an address is the sum of `base` along its path plus the
//! value of the leaf it resolves to.

use std::fmt::Write as _;
use std::net::Ipv4Addr;

use smallvec::SmallVec;
use tracing::debug;

// =============================================================================
// Configuration
// =============================================================================

/// Slots per node, one per possible address byte.
pub const FANOUT: usize = 256;

/// Trie levels, one per IPv4 address byte.
pub const MAX_DEPTH: usize = 4;

// =============================================================================
// Leaf counter
// =============================================================================

/// Terminal counter for one address cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Counter {
    pub(crate) value: i64,
    /// Value when the current window opened.
    window_start: i64,
    /// Second of the most recent update; `None` until first touched.
    last_update: Option<u64>,
}

impl Counter {
    #[inline]
    fn new(value: i64) -> Self {
        Self {
            value,
            window_start: value,
            last_update: None,
        }
    }
}

// =============================================================================
// Split policy
// =============================================================================

/// Decides, per update, whether a leaf has grown fast enough to subdivide.
///
/// Windows are fixed one-second buckets keyed by the Unix second. The first
/// update in a new window only opens the window; growth past `threshold`
/// within an already open window triggers the split.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitPolicy {
    threshold: u32,
}

impl SplitPolicy {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    #[inline]
    pub fn threshold(self) -> u32 {
        self.threshold
    }

    /// Applies `delta` to `counter` and reports whether it should split.
    ///
    /// `can_split` is false for leaves already keyed by all four bytes.
    pub(crate) fn on_update(
        self,
        counter: &mut Counter,
        delta: i64,
        now: u64,
        can_split: bool,
    ) -> bool {
        if counter.last_update == Some(now) {
            counter.value = counter.value.saturating_add(delta);
            let increase = counter.value.saturating_sub(counter.window_start);
            can_split && increase > i64::from(self.threshold)
        } else {
            counter.window_start = counter.value;
            counter.value = counter.value.saturating_add(delta);
            counter.last_update = Some(now);
            false
        }
    }
}

// =============================================================================
// Nodes
// =============================================================================

#[derive(Clone, Debug)]
pub(crate) enum Slot {
    Leaf(Counter),
    Split(Box<ClusterNode>),
}

/// One level of the trie: 256 slots plus the parent's count at split time.
#[derive(Clone, Debug)]
pub(crate) struct ClusterNode {
    pub(crate) base: i64,
    pub(crate) slots: Box<[Slot]>,
}

impl ClusterNode {
    fn filled(base: i64, value: i64) -> Self {
        let slots: Vec<Slot> = (0..FANOUT).map(|_| Slot::Leaf(Counter::new(value))).collect();
        Self {
            base,
            slots: slots.into_boxed_slice(),
        }
    }

    #[inline]
    fn slot(&self, byte: u8) -> &Slot {
        debug_assert_eq!(self.slots.len(), FANOUT);
        &self.slots[usize::from(byte)]
    }
}

// =============================================================================
// Table
// =============================================================================

/// Shape of the trie, for observing growth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TableStats {
    pub nodes: usize,
    pub leaves: usize,
    /// Deepest level any address resolves at (1..=4).
    pub max_depth: usize,
}

/// Owns the trie and the split policy.
#[derive(Clone, Debug)]
pub struct ClusterTable {
    pub(crate) root: ClusterNode,
    policy: SplitPolicy,
    since: u64,
}

impl ClusterTable {
    /// Creates a table with every first-byte cluster at zero.
    pub fn new(threshold: u32, now: u64) -> Self {
        Self {
            root: ClusterNode::filled(0, 0),
            policy: SplitPolicy::new(threshold),
            since: now,
        }
    }

    #[inline]
    pub fn threshold(&self) -> u32 {
        self.policy.threshold()
    }

    pub fn set_threshold(&mut self, threshold: u32) {
        self.policy = SplitPolicy::new(threshold);
    }

    /// Second of the last reset (or construction).
    #[inline]
    pub fn since(&self) -> u64 {
        self.since
    }

    /// Adds `delta` to the cluster `addr` resolves to and returns the
    /// cluster's ordinal.
    ///
    /// If this update makes the leaf split, the update is still recorded at
    /// the leaf's level; the finer clusters take effect for later updates.
    /// Negative leaf values report ordinal 0.
    pub fn update(&mut self, addr: Ipv4Addr, delta: i64, now: u64) -> u32 {
        let octets = addr.octets();
        let policy = self.policy;
        let mut node = &mut self.root;
        let mut depth = 0;
        loop {
            let slot = &mut node.slots[usize::from(octets[depth])];
            match slot {
                Slot::Split(child) => {
                    debug_assert!(depth + 1 < MAX_DEPTH, "split slot at the last level");
                    node = &mut **child;
                    depth += 1;
                }
                Slot::Leaf(counter) => {
                    let can_split = depth + 1 < MAX_DEPTH;
                    let split = policy.on_update(counter, delta, now, can_split);
                    let value = counter.value;
                    if split {
                        debug!(
                            prefix = %format_prefix(&octets[..=depth]),
                            depth = depth + 1,
                            value,
                            "cluster subdivided"
                        );
                        *slot = Slot::Split(Box::new(ClusterNode::filled(value, 0)));
                    }
                    return ordinal(value);
                }
            }
        }
    }

    /// Effective count of the cluster `addr` currently resolves to.
    pub fn lookup(&self, addr: Ipv4Addr) -> i64 {
        let octets = addr.octets();
        let mut node = &self.root;
        let mut total = node.base;
        let mut depth = 0;
        // A fourth-level slot is always a leaf, so `depth` stays below 4.
        while let Slot::Split(child) = node.slot(octets[depth]) {
            node = &**child;
            total = total.saturating_add(node.base);
            depth += 1;
        }
        match node.slot(octets[depth]) {
            Slot::Leaf(counter) => total.saturating_add(counter.value),
            Slot::Split(_) => unreachable!("loop above descends through every split slot"),
        }
    }

    /// Number of levels walked before `addr` reaches its leaf (1..=4).
    pub fn resolved_depth(&self, addr: Ipv4Addr) -> usize {
        let mut node = &self.root;
        let mut depth = 1;
        for &byte in addr.octets().iter() {
            match node.slot(byte) {
                Slot::Split(child) => {
                    node = &**child;
                    depth += 1;
                }
                Slot::Leaf(_) => break,
            }
        }
        depth.min(MAX_DEPTH)
    }

    /// Drops every subdivision and sets every first-byte cluster to `value`.
    pub fn reset(&mut self, value: i64, now: u64) {
        self.root = ClusterNode::filled(0, value);
        self.since = now;
    }

    /// One line per resolved cluster, zero counts included, in address
    /// order: `192.168.*.*\t42`.
    pub fn print(&self) -> String {
        let mut out = String::new();
        let mut prefix: SmallVec<[u8; MAX_DEPTH]> = SmallVec::new();
        Self::print_node(&self.root, &mut prefix, 0, &mut out);
        out
    }

    fn print_node(
        node: &ClusterNode,
        prefix: &mut SmallVec<[u8; MAX_DEPTH]>,
        base: i64,
        out: &mut String,
    ) {
        let base = base.saturating_add(node.base);
        for (byte, slot) in node.slots.iter().enumerate() {
            prefix.push(byte as u8);
            match slot {
                Slot::Split(child) => Self::print_node(child, prefix, base, out),
                Slot::Leaf(counter) => {
                    let count = base.saturating_add(counter.value);
                    let _ = writeln!(out, "{}\t{}", format_prefix(prefix), count);
                }
            }
            prefix.pop();
        }
    }

    pub fn stats(&self) -> TableStats {
        let mut stats = TableStats::default();
        let mut stack: Vec<(&ClusterNode, usize)> = vec![(&self.root, 1)];
        while let Some((node, depth)) = stack.pop() {
            stats.nodes += 1;
            for slot in node.slots.iter() {
                match slot {
                    Slot::Split(child) => stack.push((&**child, depth + 1)),
                    Slot::Leaf(_) => {
                        stats.leaves += 1;
                        stats.max_depth = stats.max_depth.max(depth);
                    }
                }
            }
        }
        stats
    }
}

#[inline]
fn ordinal(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Dotted prefix padded with `*` to four components.
fn format_prefix(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(15);
    for i in 0..MAX_DEPTH {
        if i > 0 {
            s.push('.');
        }
        match bytes.get(i) {
            Some(b) => {
                let _ = write!(s, "{b}");
            }
            None => s.push('*'),
        }
    }
    s
}
