//! Range-walk planner.
//!
//! Every range-scoped operation (the four liquidity mutators and the fee
//! query) visits the same nodes in the same order: the minimal covering set
//! of the requested range plus the ancestors whose aggregates depend on it.
//! The planner computes that visit list purely from key arithmetic, without
//! touching node state, so the executors can validate, journal, and apply in
//! a single uniform loop.

use super::key::{range_bounds, NodeKey};

/// What an operation does at a visited node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Member of the minimal covering set: receives the direct per-tick
    /// delta (or, for the fee query, contributes its subtree earnings rate).
    Cover,
    /// Ancestor on the walk toward the root: its subtree aggregates are
    /// recomputed from its children (query: contributes its node-only rate).
    Propagate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub key: NodeKey,
    pub kind: StepKind,
}

impl Step {
    fn cover(key: NodeKey) -> Self {
        Step { key, kind: StepKind::Cover }
    }

    fn propagate(key: NodeKey) -> Self {
        Step { key, kind: StepKind::Propagate }
    }
}

/// Plan the visit order for the internal tick range `[low_tick, high_tick]`.
///
/// Callers guarantee the range is valid and is not the full tree span, so
/// the peak sits strictly below the root except in the boundary-collapse
/// cases where the walk never ascends past it incorrectly. Each key appears
/// at most once; children always precede the propagate step that reads them.
pub fn plan_range_walk(low_tick: u64, high_tick: u64, root: NodeKey) -> Vec<Step> {
    let (low, high, peak, stop_range) = range_bounds(low_tick, high_tick);
    let mut steps = Vec::new();

    let mut frontier = if low == high {
        // The peak is the sole covering node. Its parent still needs a
        // recompute, then the generic climb takes over.
        steps.push(Step::cover(low));
        let (parent, _) = low.generic_up();
        steps.push(Step::propagate(parent));
        parent
    } else {
        let left_ran = low.range() < stop_range;
        if left_ran {
            // The low boundary key is always a right child (it is the
            // maximal block starting at `low`), so the first hop is a
            // right_up with no sibling delta.
            steps.push(Step::cover(low));
            let (mut current, _) = low.right_up();
            steps.push(Step::propagate(current));
            while current.range() < stop_range {
                if current.is_left() {
                    steps.push(Step::cover(current.right_sibling()));
                }
                let (parent, _) = current.generic_up();
                steps.push(Step::propagate(parent));
                current = parent;
            }
        }
        let right_ran = high.range() < stop_range;
        if right_ran {
            // Mirror image: the high boundary key is always a left child.
            steps.push(Step::cover(high));
            let (mut current, _) = high.left_up();
            steps.push(Step::propagate(current));
            while current.range() < stop_range {
                if current.is_right() {
                    steps.push(Step::cover(current.left_sibling()));
                }
                let (parent, _) = current.generic_up();
                steps.push(Step::propagate(parent));
                current = parent;
            }
        }
        if left_ran && right_ran {
            // Both legs stopped at the peak's children; join them here.
            steps.push(Step::propagate(peak));
            peak
        } else {
            // A single leg climbed into the peak already.
            peak
        }
    };

    while frontier != root {
        let (parent, _) = frontier.generic_up();
        steps.push(Step::propagate(parent));
        frontier = parent;
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::key::NodeKey;

    fn key(range: u64, base: u64) -> NodeKey {
        NodeKey::from_parts(range, base)
    }

    fn root16() -> NodeKey {
        key(16, 16)
    }

    fn covers(steps: &[Step]) -> Vec<NodeKey> {
        steps
            .iter()
            .filter(|s| s.kind == StepKind::Cover)
            .map(|s| s.key)
            .collect()
    }

    #[test]
    fn no_duplicate_visits() {
        for low in 16u64..32 {
            for high in low..32 {
                if (low, high) == (16, 31) {
                    continue; // full span goes through the wide variants
                }
                let steps = plan_range_walk(low, high, root16());
                let mut keys: Vec<_> = steps.iter().map(|s| s.key).collect();
                keys.sort();
                keys.dedup();
                assert_eq!(keys.len(), steps.len(), "dup visit for [{low},{high}]");
            }
        }
    }

    #[test]
    fn cover_set_partitions_the_range() {
        for low in 16u64..32 {
            for high in low..32 {
                if (low, high) == (16, 31) {
                    continue;
                }
                let steps = plan_range_walk(low, high, root16());
                let mut covered = 0u64;
                for cover in covers(&steps) {
                    for t in cover.base()..cover.base() + cover.range() {
                        assert!(
                            (low..=high).contains(&t),
                            "[{low},{high}] covers stray tick {t}"
                        );
                        covered += 1;
                    }
                }
                assert_eq!(covered, high - low + 1, "gap or overlap in [{low},{high}]");
            }
        }
    }

    #[test]
    fn propagate_steps_follow_their_children() {
        for low in 16u64..32 {
            for high in low..32 {
                if (low, high) == (16, 31) {
                    continue;
                }
                let steps = plan_range_walk(low, high, root16());
                for (i, step) in steps.iter().enumerate() {
                    if step.kind != StepKind::Propagate {
                        continue;
                    }
                    let (l, r) = step.key.children();
                    for child in [l, r] {
                        if let Some(pos) = steps.iter().position(|s| s.key == child) {
                            assert!(pos < i, "child visited after parent in [{low},{high}]");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn single_leaf_walk_is_leaf_plus_rootward_merge() {
        let steps = plan_range_walk(21, 21, root16());
        assert_eq!(covers(&steps), vec![key(1, 21)]);
        let props: Vec<_> = steps
            .iter()
            .filter(|s| s.kind == StepKind::Propagate)
            .map(|s| s.key)
            .collect();
        assert_eq!(props, vec![key(2, 20), key(4, 20), key(8, 16), root16()]);
    }

    #[test]
    fn root_child_range_is_a_single_cover() {
        // [0, width/2 - 1]: the peak itself is the sole covering node.
        let steps = plan_range_walk(16, 23, root16());
        assert_eq!(covers(&steps), vec![key(8, 16)]);
        assert_eq!(steps.last().unwrap().key, root16());
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn ends_at_root_exactly_once() {
        for low in 16u64..32 {
            for high in low..32 {
                if (low, high) == (16, 31) {
                    continue;
                }
                let steps = plan_range_walk(low, high, root16());
                let last = steps.last().unwrap();
                assert_eq!(last.key, root16());
                assert_eq!(last.kind, StepKind::Propagate);
            }
        }
    }
}
