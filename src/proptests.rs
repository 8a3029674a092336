use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::net::Ipv4Addr;

use crate::table::{ClusterNode, Slot};

fn validate_node(node: &ClusterNode, level: usize) {
    assert!(level < MAX_DEPTH, "node below the last address byte");
    assert_eq!(node.slots.len(), FANOUT, "node must have one slot per byte");
    for slot in node.slots.iter() {
        if let Slot::Split(child) = slot {
            assert!(level + 1 < MAX_DEPTH, "last-level slot must stay a leaf");
            validate_node(child, level + 1);
        }
    }
}

fn validate_table(t: &ClusterTable) {
    validate_node(&t.root, 0);
    let stats = t.stats();
    assert!((1..=MAX_DEPTH).contains(&stats.max_depth));
    assert_eq!(stats.leaves, stats.nodes * FANOUT - (stats.nodes - 1));
}

/// Small alphabet per byte so that clusters collide and split often.
fn addr_strategy() -> impl Strategy<Value = Ipv4Addr> {
    (0u8..3, 0u8..3, 0u8..3, 0u8..3).prop_map(|(a, b, c, d)| Ipv4Addr::new(a, b, c, d))
}

fn probes() -> Vec<Ipv4Addr> {
    let mut out = Vec::with_capacity(81);
    for a in 0..3 {
        for b in 0..3 {
            for c in 0..3 {
                for d in 0..3 {
                    out.push(Ipv4Addr::new(a, b, c, d));
                }
            }
        }
    }
    out
}

fn same_cluster(a: Ipv4Addr, b: Ipv4Addr, depth: usize) -> bool {
    a.octets()[..depth] == b.octets()[..depth]
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 40)]
    Update {
        #[proptest(strategy = "addr_strategy()")]
        addr: Ipv4Addr,
        #[proptest(strategy = "-2i64..=4")]
        delta: i64,
        #[proptest(strategy = "prop::bool::weighted(0.1)")]
        next_second: bool,
    },
    #[proptest(weight = 1)]
    Reset(#[proptest(strategy = "-3i64..=3")] i64),
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    /// Every update moves exactly the cluster it resolved to by `delta`;
    /// splits never change an observable count.
    #[test]
    fn prop_update_moves_only_its_cluster(
        threshold in 0u32..6,
        ops in prop::collection::vec(any::<Op>(), 0..=300),
    ) {
        let probes = probes();
        let mut now = 1_000u64;
        let mut t = ClusterTable::new(threshold, now);

        for op in ops {
            match op {
                Op::Update { addr, delta, next_second } => {
                    if next_second {
                        now += 1;
                    }
                    let depth = t.resolved_depth(addr);
                    let before: Vec<i64> = probes.iter().map(|&p| t.lookup(p)).collect();
                    let depths: Vec<usize> = probes.iter().map(|&p| t.resolved_depth(p)).collect();

                    t.update(addr, delta, now);

                    for (i, &p) in probes.iter().enumerate() {
                        let expected = if same_cluster(p, addr, depth) {
                            before[i] + delta
                        } else {
                            before[i]
                        };
                        prop_assert_eq!(t.lookup(p), expected, "{} after update of {}", p, addr);
                        prop_assert!(
                            t.resolved_depth(p) >= depths[i],
                            "refinement reverted for {}",
                            p
                        );
                    }
                }
                Op::Reset(value) => {
                    now += 1;
                    t.reset(value, now);
                    prop_assert_eq!(t.since(), now);
                    for &p in &probes {
                        prop_assert_eq!(t.lookup(p), value);
                        prop_assert_eq!(t.resolved_depth(p), 1);
                    }
                }
            }
        }

        validate_table(&t);
    }

    #[test]
    fn prop_reads_do_not_mutate(
        ops in prop::collection::vec((addr_strategy(), 1i64..=3), 0..=200),
        probe in addr_strategy(),
    ) {
        let mut t = ClusterTable::new(2, 0);
        for (addr, delta) in ops {
            t.update(addr, delta, 0);
        }
        let stats = t.stats();
        let report = t.print();
        let first = t.lookup(probe);
        for _ in 0..3 {
            prop_assert_eq!(t.lookup(probe), first);
            prop_assert_eq!(t.print(), report.clone());
            prop_assert_eq!(t.stats(), stats);
        }
    }

    /// Without negative deltas, the ordinal never exceeds the effective count
    /// and the effective count only grows.
    #[test]
    fn prop_ordinal_bounded_by_effective_count(
        threshold in 0u32..4,
        ops in prop::collection::vec((addr_strategy(), 0i64..=3, any::<bool>()), 1..=200),
    ) {
        let mut t = ClusterTable::new(threshold, 0);
        let mut now = 0u64;
        for (addr, delta, tick) in ops {
            if tick {
                now += 1;
            }
            let before = t.lookup(addr);
            let ordinal = t.update(addr, delta, now);
            let after = t.lookup(addr);
            prop_assert!(after >= before);
            prop_assert!(i64::from(ordinal) <= after);
        }
    }

    #[test]
    fn prop_config_display_round_trips(
        threshold in any::<u32>(),
        inputs in prop::collection::vec(
            (prop::bool::ANY, any::<i64>()).prop_map(|(src, delta)| {
                let field = if src { AddressField::Source } else { AddressField::Destination };
                InputBinding::new(field, delta)
            }),
            1..8,
        ),
    ) {
        let config = MonitorConfig { threshold, inputs };
        prop_assert_eq!(config.to_string().parse::<MonitorConfig>(), Ok(config));
    }
}

#[test]
fn randomized_soak_stays_bounded() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut t = ClusterTable::new(5, 0);
    let mut now = 0u64;
    for i in 0..200_000u32 {
        if i % 1_000 == 0 {
            now += 1;
        }
        // Hot /16 plus uniform background traffic.
        let addr = if rng.gen_bool(0.7) {
            Ipv4Addr::new(203, 0, rng.gen_range(0..4), rng.gen())
        } else {
            Ipv4Addr::from(rng.gen::<u32>())
        };
        t.update(addr, 1, now);
    }

    validate_table(&t);
    let stats = t.stats();
    assert_eq!(stats.max_depth, MAX_DEPTH);
    assert!(t.resolved_depth(Ipv4Addr::new(203, 0, 1, 1)) == MAX_DEPTH);

    let total: i64 = (0..=255u8).map(|b| t.lookup(Ipv4Addr::new(b, 0, 0, 0))).sum();
    // First-byte counts only drop below the total once a cluster has split.
    assert!(total <= 200_000);

    t.reset(0, now);
    validate_table(&t);
    assert_eq!(t.stats().nodes, 1);
}

#[test]
fn threshold_zero_splits_on_second_update_in_each_cluster() {
    let mut t = ClusterTable::new(0, 0);
    for first in [1u8, 2, 3] {
        let addr = Ipv4Addr::new(first, 0, 0, 0);
        t.update(addr, 1, 10);
        assert_eq!(t.resolved_depth(addr), 1);
        t.update(addr, 1, 10);
        assert_eq!(t.resolved_depth(addr), 2);
    }
    assert_eq!(t.stats().nodes, 4);
}
