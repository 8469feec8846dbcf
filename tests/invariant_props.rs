//! Property tests: structural invariants must survive arbitrary operation
//! sequences, and failed operations must be invisible.

use std::collections::HashMap;

use proptest::prelude::*;

use liqtree::{LiqNode, LiqRange, LiquidityTree, UnsignedDecimal};

const DEPTH: u32 = 4;
const WIDTH: i64 = 16;

#[derive(Debug, Clone)]
enum Op {
    AddM(i64, i64, u64),
    RemoveM(i64, i64, u64),
    AddT(i64, i64, u64, u64, u64),
    RemoveT(i64, i64, u64, u64, u64),
    AddWideM(u64),
    RemoveWideM(u64),
    AddWideT(u64, u64, u64),
    RemoveWideT(u64, u64, u64),
    Advance(u64, u64),
    Query(i64, i64),
}

fn tick_pair() -> impl Strategy<Value = (i64, i64)> {
    (0..WIDTH, 0..WIDTH).prop_map(|(a, b)| (a.min(b), a.max(b)))
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (tick_pair(), 0..10_000u64).prop_map(|((l, h), q)| Op::AddM(l, h, q)),
        (tick_pair(), 0..10_000u64).prop_map(|((l, h), q)| Op::RemoveM(l, h, q)),
        (tick_pair(), 0..100u64, 0..1_000u64, 0..1_000u64)
            .prop_map(|((l, h), q, x, y)| Op::AddT(l, h, q, x, y)),
        (tick_pair(), 0..100u64, 0..1_000u64, 0..1_000u64)
            .prop_map(|((l, h), q, x, y)| Op::RemoveT(l, h, q, x, y)),
        (0..10_000u64).prop_map(Op::AddWideM),
        (0..10_000u64).prop_map(Op::RemoveWideM),
        (0..100u64, 0..1_000u64, 0..1_000u64).prop_map(|(q, x, y)| Op::AddWideT(q, x, y)),
        (0..100u64, 0..1_000u64, 0..1_000u64).prop_map(|(q, x, y)| Op::RemoveWideT(q, x, y)),
        (0..1_000_000u64, 0..1_000_000u64).prop_map(|(x, y)| Op::Advance(x, y)),
        tick_pair().prop_map(|(l, h)| Op::Query(l, h)),
    ]
}

fn n(v: u64) -> UnsignedDecimal {
    UnsignedDecimal::from_u64(v)
}

fn q64_times(v: u64) -> UnsignedDecimal {
    &UnsignedDecimal::q64() * &n(v)
}

fn apply(tree: &mut LiquidityTree, op: &Op) -> bool {
    match op.clone() {
        Op::AddM(l, h, q) => tree.add_m_liq(LiqRange::new(l, h), n(q)).is_ok(),
        Op::RemoveM(l, h, q) => tree.remove_m_liq(LiqRange::new(l, h), n(q)).is_ok(),
        Op::AddT(l, h, q, x, y) => tree
            .add_t_liq(LiqRange::new(l, h), n(q), n(x), n(y))
            .is_ok(),
        Op::RemoveT(l, h, q, x, y) => tree
            .remove_t_liq(LiqRange::new(l, h), n(q), n(x), n(y))
            .is_ok(),
        Op::AddWideM(q) => tree.add_wide_m_liq(n(q)).is_ok(),
        Op::RemoveWideM(q) => tree.remove_wide_m_liq(n(q)).is_ok(),
        Op::AddWideT(q, x, y) => tree.add_wide_t_liq(n(q), n(x), n(y)).is_ok(),
        Op::RemoveWideT(q, x, y) => tree.remove_wide_t_liq(n(q), n(x), n(y)).is_ok(),
        Op::Advance(x, y) => {
            tree.advance_fee_rates(q64_times(x), q64_times(y));
            true
        }
        Op::Query(l, h) => tree.query_accumulated_fee_rates(LiqRange::new(l, h)).is_ok(),
    }
}

fn check_invariants(tree: &LiquidityTree) {
    let nodes: HashMap<_, _> = tree.populated_nodes().map(|(k, v)| (k, v.clone())).collect();
    let zero = LiqNode::default();
    for (key, node) in &nodes {
        assert!(
            node.t_liq <= node.m_liq,
            "t_liq > m_liq at key {:?}",
            key
        );
        if key.is_leaf() {
            assert_eq!(node.subtree_m_liq, node.m_liq, "leaf aggregate at {:?}", key);
            continue;
        }
        let (left, right) = key.children();
        let ln = nodes.get(&left).unwrap_or(&zero);
        let rn = nodes.get(&right).unwrap_or(&zero);

        let expected_m = &(&ln.subtree_m_liq + &rn.subtree_m_liq)
            + &(&node.m_liq * &UnsignedDecimal::from_u64(key.range()));
        assert_eq!(node.subtree_m_liq, expected_m, "m aggregate at {:?}", key);

        let expected_x = &(&ln.token_x_subtree_borrowed + &rn.token_x_subtree_borrowed)
            + &node.token_x_borrowed;
        assert_eq!(
            node.token_x_subtree_borrowed, expected_x,
            "x borrow aggregate at {:?}",
            key
        );
        let expected_y = &(&ln.token_y_subtree_borrowed + &rn.token_y_subtree_borrowed)
            + &node.token_y_borrowed;
        assert_eq!(
            node.token_y_subtree_borrowed, expected_y,
            "y borrow aggregate at {:?}",
            key
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn aggregates_survive_random_operations(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut tree = LiquidityTree::new(DEPTH);
        for op in &ops {
            apply(&mut tree, op);
        }
        check_invariants(&tree);
    }

    #[test]
    fn failed_operations_leave_no_trace(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut tree = LiquidityTree::new(DEPTH);
        for op in &ops {
            let before = tree.clone();
            if !apply(&mut tree, op) {
                prop_assert_eq!(&tree, &before, "failed {:?} mutated the tree", op);
            }
        }
    }

    #[test]
    fn split_add_matches_whole_add(
        (low, high) in tick_pair().prop_filter("splittable, not full span", |(l, h)| h > l && !(*l == 0 && *h == WIDTH - 1)),
        liq in 1..10_000u64,
        split_seed in any::<u64>(),
    ) {
        let split_at = low + (split_seed % (high - low) as u64) as i64; // in [low, high)
        let mut whole = LiquidityTree::new(DEPTH);
        whole.add_m_liq(LiqRange::new(low, high), n(liq)).unwrap();

        let mut split = LiquidityTree::new(DEPTH);
        split.add_m_liq(LiqRange::new(low, split_at), n(liq)).unwrap();
        split.add_m_liq(LiqRange::new(split_at + 1, high), n(liq)).unwrap();

        // identical per-tick totals and identical root aggregate
        for tick in 0..WIDTH {
            let mut whole_total = UnsignedDecimal::zero();
            let mut split_total = UnsignedDecimal::zero();
            let mut size = 1i64;
            while size <= WIDTH {
                let aligned = tick - tick.rem_euclid(size);
                let range = LiqRange::new(aligned, aligned + size - 1);
                whole_total += &whole.node_snapshot(range).unwrap().m_liq;
                split_total += &split.node_snapshot(range).unwrap().m_liq;
                size *= 2;
            }
            prop_assert_eq!(whole_total, split_total, "tick {}", tick);
        }
        let full = LiqRange::new(0, WIDTH - 1);
        prop_assert_eq!(
            whole.node_snapshot(full).unwrap().subtree_m_liq,
            split.node_snapshot(full).unwrap().subtree_m_liq
        );
        check_invariants(&whole);
        check_invariants(&split);
    }
}
