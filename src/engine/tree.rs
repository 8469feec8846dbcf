//! The liquidity tree engine: range mutators, wide variants, lazy fee
//! settlement, and the accumulated-fee-rate query.

use std::collections::HashMap;

use tracing::debug;

use crate::config::{FeeMode, TreeConfig};
use crate::domain::{LiqRange, UnsignedDecimal};
use crate::error::LiqTreeError;

use super::key::NodeKey;
use super::node::LiqNode;
use super::walk::{plan_range_walk, Step, StepKind};

/// Whether a mutator adds to or removes from the tracked amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dir {
    Add,
    Remove,
}

/// Pristine node snapshots captured before an operation first touches each
/// node. Restoring the journal undoes every mutation of a failed call,
/// including fee settlements, so errors never leave partial state behind.
#[derive(Debug, Default)]
struct Journal {
    entries: Vec<(NodeKey, Option<LiqNode>)>,
}

impl Journal {
    fn capture(&mut self, nodes: &HashMap<NodeKey, LiqNode>, key: NodeKey) {
        if self.entries.iter().any(|(k, _)| *k == key) {
            return;
        }
        self.entries.push((key, nodes.get(&key).cloned()));
    }
}

/// Dense fixed-depth binary range tree tracking minted and taken liquidity
/// per tick range, with lazy rate-snapshot fee accrual.
///
/// Nodes live in a sparse map keyed by the packed [`NodeKey`] encoding;
/// navigation is recomputed from keys, never stored. The two global fee-rate
/// accumulators are instance fields advanced by the host through
/// [`advance_fee_rates`](Self::advance_fee_rates).
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidityTree {
    depth: u32,
    width: u64,
    root: NodeKey,
    nodes: HashMap<NodeKey, LiqNode>,
    token_x_fee_rate: UnsignedDecimal,
    token_y_fee_rate: UnsignedDecimal,
    config: TreeConfig,
}

impl LiquidityTree {
    /// Build a tree covering `2^depth` leaf ticks with default configuration.
    ///
    /// # Panics
    /// Panics unless `1 <= depth <= 23` (internal bases must fit the key
    /// codec's 24 base bits).
    pub fn new(depth: u32) -> Self {
        Self::with_config(depth, TreeConfig::default())
    }

    pub fn with_config(depth: u32, config: TreeConfig) -> Self {
        assert!(
            (1..=23).contains(&depth),
            "tree depth must be between 1 and 23"
        );
        let width = 1u64 << depth;
        Self {
            depth,
            width,
            root: NodeKey::from_parts(width, width),
            nodes: HashMap::new(),
            token_x_fee_rate: UnsignedDecimal::zero(),
            token_y_fee_rate: UnsignedDecimal::zero(),
            config,
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Number of leaf ticks (`2^depth`).
    pub fn width(&self) -> u64 {
        self.width
    }

    pub fn token_x_fee_rate_snapshot(&self) -> &UnsignedDecimal {
        &self.token_x_fee_rate
    }

    pub fn token_y_fee_rate_snapshot(&self) -> &UnsignedDecimal {
        &self.token_y_fee_rate
    }

    /// Advance the global fee-rate accumulators. This is the host's "tick
    /// the clock" channel: rates are Q64-scaled cumulative interest, and
    /// nodes settle lazily against them the next time they are visited.
    pub fn advance_fee_rates(&mut self, delta_x: UnsignedDecimal, delta_y: UnsignedDecimal) {
        debug!(delta_x = %delta_x, delta_y = %delta_y, "advance_fee_rates");
        self.token_x_fee_rate += &delta_x;
        self.token_y_fee_rate += &delta_y;
    }

    /// Snapshot of the node covering exactly `range`, zero-valued if it has
    /// never been touched. `None` if the range does not correspond to a
    /// single tree node. Read-only: does not settle fees or create nodes.
    pub fn node_snapshot(&self, range: LiqRange) -> Option<LiqNode> {
        if range.low < 0 || range.high < range.low {
            return None;
        }
        let size = (range.high - range.low + 1) as u64;
        if !size.is_power_of_two() || range.high as u64 >= self.width {
            return None;
        }
        let base = range.low as u64 + self.width;
        if base % size != 0 {
            return None;
        }
        let key = NodeKey::from_parts(size, base);
        Some(self.nodes.get(&key).cloned().unwrap_or_default())
    }

    /// Every node that has been touched so far, with its key. Nodes are
    /// created lazily and never deleted, so this is the tree's full
    /// materialized state.
    pub fn populated_nodes(&self) -> impl Iterator<Item = (NodeKey, &LiqNode)> + '_ {
        self.nodes.iter().map(|(k, n)| (*k, n))
    }

    // ---- range-scoped mutators ----

    /// Mint `liq` units of liquidity per tick across `range`.
    pub fn add_m_liq(&mut self, range: LiqRange, liq: UnsignedDecimal) -> Result<(), LiqTreeError> {
        let (low, high) = self.validate(range, &liq)?;
        debug!(low = range.low, high = range.high, liq = %liq, "add_m_liq");
        let steps = plan_range_walk(low, high, self.root);
        self.run(|tree, journal| tree.execute_m_liq(&steps, &liq, Dir::Add, journal))
    }

    /// Remove previously minted liquidity. Fails with
    /// [`LiqTreeError::BorrowExceedsMint`] if removal would leave any covered
    /// node with `t_liq > m_liq`.
    pub fn remove_m_liq(
        &mut self,
        range: LiqRange,
        liq: UnsignedDecimal,
    ) -> Result<(), LiqTreeError> {
        let (low, high) = self.validate(range, &liq)?;
        debug!(low = range.low, high = range.high, liq = %liq, "remove_m_liq");
        let steps = plan_range_walk(low, high, self.root);
        self.run(|tree, journal| tree.execute_m_liq(&steps, &liq, Dir::Remove, journal))
    }

    /// Take (borrow against) `liq` units of liquidity per tick across
    /// `range`, recording the borrowed token principals. Token amounts are
    /// distributed over the covering nodes proportionally to the ticks each
    /// node spans within the range.
    pub fn add_t_liq(
        &mut self,
        range: LiqRange,
        liq: UnsignedDecimal,
        token_x: UnsignedDecimal,
        token_y: UnsignedDecimal,
    ) -> Result<(), LiqTreeError> {
        let (low, high) = self.validate(range, &liq)?;
        debug!(low = range.low, high = range.high, liq = %liq, x = %token_x, y = %token_y, "add_t_liq");
        let (per_tick_x, per_tick_y) = self.per_tick_amounts(range, &token_x, &token_y)?;
        let steps = plan_range_walk(low, high, self.root);
        self.run(|tree, journal| {
            tree.execute_t_liq(&steps, &liq, &per_tick_x, &per_tick_y, Dir::Add, journal)
        })
    }

    /// Repay taken liquidity and borrowed token principals.
    pub fn remove_t_liq(
        &mut self,
        range: LiqRange,
        liq: UnsignedDecimal,
        token_x: UnsignedDecimal,
        token_y: UnsignedDecimal,
    ) -> Result<(), LiqTreeError> {
        let (low, high) = self.validate(range, &liq)?;
        debug!(low = range.low, high = range.high, liq = %liq, x = %token_x, y = %token_y, "remove_t_liq");
        let (per_tick_x, per_tick_y) = self.per_tick_amounts(range, &token_x, &token_y)?;
        let steps = plan_range_walk(low, high, self.root);
        self.run(|tree, journal| {
            tree.execute_t_liq(&steps, &liq, &per_tick_x, &per_tick_y, Dir::Remove, journal)
        })
    }

    // ---- wide (whole-tree) mutators ----

    /// Mint liquidity across the whole tree. Touches only the root.
    pub fn add_wide_m_liq(&mut self, liq: UnsignedDecimal) -> Result<(), LiqTreeError> {
        if liq.is_zero() {
            return Err(LiqTreeError::ZeroLiquidity);
        }
        debug!(liq = %liq, "add_wide_m_liq");
        self.run(|tree, journal| tree.execute_wide_m_liq(&liq, Dir::Add, journal))
    }

    pub fn remove_wide_m_liq(&mut self, liq: UnsignedDecimal) -> Result<(), LiqTreeError> {
        if liq.is_zero() {
            return Err(LiqTreeError::ZeroLiquidity);
        }
        debug!(liq = %liq, "remove_wide_m_liq");
        self.run(|tree, journal| tree.execute_wide_m_liq(&liq, Dir::Remove, journal))
    }

    /// Borrow against the whole tree. Token amounts land on the root without
    /// per-tick scaling since the root already spans every tick.
    pub fn add_wide_t_liq(
        &mut self,
        liq: UnsignedDecimal,
        token_x: UnsignedDecimal,
        token_y: UnsignedDecimal,
    ) -> Result<(), LiqTreeError> {
        if liq.is_zero() {
            return Err(LiqTreeError::ZeroLiquidity);
        }
        debug!(liq = %liq, x = %token_x, y = %token_y, "add_wide_t_liq");
        self.run(|tree, journal| tree.execute_wide_t_liq(&liq, &token_x, &token_y, Dir::Add, journal))
    }

    pub fn remove_wide_t_liq(
        &mut self,
        liq: UnsignedDecimal,
        token_x: UnsignedDecimal,
        token_y: UnsignedDecimal,
    ) -> Result<(), LiqTreeError> {
        if liq.is_zero() {
            return Err(LiqTreeError::ZeroLiquidity);
        }
        debug!(liq = %liq, x = %token_x, y = %token_y, "remove_wide_t_liq");
        self.run(|tree, journal| {
            tree.execute_wide_t_liq(&liq, &token_x, &token_y, Dir::Remove, journal)
        })
    }

    // ---- queries ----

    /// Total per-unit-of-`m_liq` fee earnings accrued over `range`, both
    /// tokens. Settles fees on every visited node (an expected side effect)
    /// but mutates no liquidity or borrow state.
    ///
    /// Covering nodes contribute their whole-subtree earnings rate; nodes
    /// passed on the way to the root contribute their node-only rate, since
    /// their subtrees extend beyond the queried range.
    pub fn query_accumulated_fee_rates(
        &mut self,
        range: LiqRange,
    ) -> Result<(UnsignedDecimal, UnsignedDecimal), LiqTreeError> {
        let (low, high) = self.validate_range(range)?;
        debug!(low = range.low, high = range.high, "query_accumulated_fee_rates");
        let steps = plan_range_walk(low, high, self.root);
        let mut acc_x = UnsignedDecimal::zero();
        let mut acc_y = UnsignedDecimal::zero();
        for step in &steps {
            self.settle_fees(step.key)?;
            let node = self.nodes.get(&step.key).cloned().unwrap_or_default();
            match step.kind {
                StepKind::Cover => {
                    acc_x += &node.token_x_cumulative_earned_per_m_subtree_liq;
                    acc_y += &node.token_y_cumulative_earned_per_m_subtree_liq;
                }
                StepKind::Propagate => {
                    acc_x += &node.token_x_cumulative_earned_per_m_liq;
                    acc_y += &node.token_y_cumulative_earned_per_m_liq;
                }
            }
        }
        Ok((acc_x, acc_y))
    }

    /// Whole-tree counterpart of
    /// [`query_accumulated_fee_rates`](Self::query_accumulated_fee_rates):
    /// settles the root and returns its subtree earnings rates.
    pub fn query_wide_accumulated_fee_rates(
        &mut self,
    ) -> Result<(UnsignedDecimal, UnsignedDecimal), LiqTreeError> {
        self.settle_fees(self.root)?;
        let node = self.nodes.get(&self.root).cloned().unwrap_or_default();
        Ok((
            node.token_x_cumulative_earned_per_m_subtree_liq,
            node.token_y_cumulative_earned_per_m_subtree_liq,
        ))
    }

    /// Reserved query surface with no defined semantics yet; always returns
    /// [`LiqTreeError::Unsupported`].
    pub fn query_min_m_liq_max_t_liq(
        &self,
        _range: LiqRange,
    ) -> Result<(UnsignedDecimal, UnsignedDecimal), LiqTreeError> {
        Err(LiqTreeError::Unsupported("query_min_m_liq_max_t_liq"))
    }

    pub fn query_wide_min_m_liq_max_t_liq(
        &self,
    ) -> Result<(UnsignedDecimal, UnsignedDecimal), LiqTreeError> {
        Err(LiqTreeError::Unsupported("query_wide_min_m_liq_max_t_liq"))
    }

    // ---- validation ----

    fn validate(
        &self,
        range: LiqRange,
        liq: &UnsignedDecimal,
    ) -> Result<(u64, u64), LiqTreeError> {
        if liq.is_zero() {
            return Err(LiqTreeError::ZeroLiquidity);
        }
        self.validate_range(range)
    }

    /// Range checks shared by mutators and the fee query. Returns the
    /// width-offset internal tick pair.
    fn validate_range(&self, range: LiqRange) -> Result<(u64, u64), LiqTreeError> {
        if range.low < 0 || range.high < 0 {
            return Err(LiqTreeError::RangeContainsNegative);
        }
        if range.high < range.low {
            return Err(LiqTreeError::RangeHighBelowLow);
        }
        if range.high as u64 >= self.width {
            return Err(LiqTreeError::OversizedRange {
                high: range.high,
                width: self.width,
            });
        }
        if range.low == 0 && range.high as u64 == self.width - 1 {
            return Err(LiqTreeError::RootRangeRejected);
        }
        Ok((range.low as u64 + self.width, range.high as u64 + self.width))
    }

    fn per_tick_amounts(
        &self,
        range: LiqRange,
        token_x: &UnsignedDecimal,
        token_y: &UnsignedDecimal,
    ) -> Result<(UnsignedDecimal, UnsignedDecimal), LiqTreeError> {
        let width = UnsignedDecimal::from_u64(range.width() as u64);
        let precision = self.config.division_precision;
        Ok((
            token_x.div_with_prec(&width, precision)?,
            token_y.div_with_prec(&width, precision)?,
        ))
    }

    // ---- execution ----

    /// Run a mutation under the rollback journal: on any error the captured
    /// node snapshots are restored wholesale, so the caller observes either
    /// the full effect or none of it.
    fn run<F>(&mut self, body: F) -> Result<(), LiqTreeError>
    where
        F: FnOnce(&mut Self, &mut Journal) -> Result<(), LiqTreeError>,
    {
        let mut journal = Journal::default();
        let result = body(self, &mut journal);
        if result.is_err() {
            for (key, prior) in journal.entries.into_iter().rev() {
                match prior {
                    Some(node) => {
                        self.nodes.insert(key, node);
                    }
                    None => {
                        self.nodes.remove(&key);
                    }
                }
            }
        }
        result
    }

    fn execute_m_liq(
        &mut self,
        steps: &[Step],
        liq: &UnsignedDecimal,
        dir: Dir,
        journal: &mut Journal,
    ) -> Result<(), LiqTreeError> {
        for step in steps {
            journal.capture(&self.nodes, step.key);
            self.settle_fees(step.key)?;
            match step.kind {
                StepKind::Cover => {
                    let scaled = liq * &UnsignedDecimal::from_u64(step.key.range());
                    let node = self.nodes.entry(step.key).or_default();
                    match dir {
                        Dir::Add => {
                            node.m_liq += liq;
                            node.subtree_m_liq += &scaled;
                        }
                        Dir::Remove => {
                            node.m_liq = node.m_liq.checked_sub(liq)?;
                            node.subtree_m_liq = node.subtree_m_liq.checked_sub(&scaled)?;
                            if node.t_liq > node.m_liq {
                                return Err(LiqTreeError::BorrowExceedsMint);
                            }
                        }
                    }
                }
                StepKind::Propagate => self.recompute_subtree_m_liq(step.key),
            }
        }
        Ok(())
    }

    fn execute_t_liq(
        &mut self,
        steps: &[Step],
        liq: &UnsignedDecimal,
        per_tick_x: &UnsignedDecimal,
        per_tick_y: &UnsignedDecimal,
        dir: Dir,
        journal: &mut Journal,
    ) -> Result<(), LiqTreeError> {
        for step in steps {
            journal.capture(&self.nodes, step.key);
            self.settle_fees(step.key)?;
            match step.kind {
                StepKind::Cover => {
                    let range = UnsignedDecimal::from_u64(step.key.range());
                    let dx = per_tick_x * &range;
                    let dy = per_tick_y * &range;
                    let node = self.nodes.entry(step.key).or_default();
                    match dir {
                        Dir::Add => {
                            node.t_liq += liq;
                            if node.t_liq > node.m_liq {
                                return Err(LiqTreeError::BorrowExceedsMint);
                            }
                            node.token_x_borrowed += &dx;
                            node.token_x_subtree_borrowed += &dx;
                            node.token_y_borrowed += &dy;
                            node.token_y_subtree_borrowed += &dy;
                        }
                        Dir::Remove => {
                            node.t_liq = node.t_liq.checked_sub(liq)?;
                            node.token_x_borrowed = node.token_x_borrowed.checked_sub(&dx)?;
                            node.token_x_subtree_borrowed =
                                node.token_x_subtree_borrowed.checked_sub(&dx)?;
                            node.token_y_borrowed = node.token_y_borrowed.checked_sub(&dy)?;
                            node.token_y_subtree_borrowed =
                                node.token_y_subtree_borrowed.checked_sub(&dy)?;
                        }
                    }
                }
                StepKind::Propagate => self.recompute_subtree_borrowed(step.key),
            }
        }
        Ok(())
    }

    fn execute_wide_m_liq(
        &mut self,
        liq: &UnsignedDecimal,
        dir: Dir,
        journal: &mut Journal,
    ) -> Result<(), LiqTreeError> {
        journal.capture(&self.nodes, self.root);
        self.settle_fees(self.root)?;
        let scaled = liq * &UnsignedDecimal::from_u64(self.width);
        let node = self.nodes.entry(self.root).or_default();
        match dir {
            Dir::Add => {
                node.m_liq += liq;
                node.subtree_m_liq += &scaled;
            }
            Dir::Remove => {
                node.m_liq = node.m_liq.checked_sub(liq)?;
                node.subtree_m_liq = node.subtree_m_liq.checked_sub(&scaled)?;
                if node.t_liq > node.m_liq {
                    return Err(LiqTreeError::BorrowExceedsMint);
                }
            }
        }
        Ok(())
    }

    fn execute_wide_t_liq(
        &mut self,
        liq: &UnsignedDecimal,
        token_x: &UnsignedDecimal,
        token_y: &UnsignedDecimal,
        dir: Dir,
        journal: &mut Journal,
    ) -> Result<(), LiqTreeError> {
        journal.capture(&self.nodes, self.root);
        self.settle_fees(self.root)?;
        let node = self.nodes.entry(self.root).or_default();
        match dir {
            Dir::Add => {
                node.t_liq += liq;
                if node.t_liq > node.m_liq {
                    return Err(LiqTreeError::BorrowExceedsMint);
                }
                node.token_x_borrowed += token_x;
                node.token_x_subtree_borrowed += token_x;
                node.token_y_borrowed += token_y;
                node.token_y_subtree_borrowed += token_y;
            }
            Dir::Remove => {
                node.t_liq = node.t_liq.checked_sub(liq)?;
                node.token_x_borrowed = node.token_x_borrowed.checked_sub(token_x)?;
                node.token_x_subtree_borrowed =
                    node.token_x_subtree_borrowed.checked_sub(token_x)?;
                node.token_y_borrowed = node.token_y_borrowed.checked_sub(token_y)?;
                node.token_y_subtree_borrowed =
                    node.token_y_subtree_borrowed.checked_sub(token_y)?;
            }
        }
        Ok(())
    }

    // ---- fee settlement ----

    /// Bring one node's fee accumulators up to date with the current global
    /// rate snapshots. Runs before any structural read or write of the node,
    /// so earnings always reflect the liquidity and borrow state in effect
    /// while the rate elapsed. Idempotent until the rates advance again.
    fn settle_fees(&mut self, key: NodeKey) -> Result<(), LiqTreeError> {
        let rate_x = self.token_x_fee_rate.clone();
        let rate_y = self.token_y_fee_rate.clone();
        let aux = self.ancestor_m_liq(key);
        let range = UnsignedDecimal::from_u64(key.range());
        let fee_mode = self.config.fee_mode;
        let precision = self.config.division_precision;
        let q64 = UnsignedDecimal::q64();

        let node = self.nodes.entry(key).or_default();
        let diff_x = rate_x.checked_sub(&node.token_x_fee_rate_snapshot)?;
        let diff_y = rate_y.checked_sub(&node.token_y_fee_rate_snapshot)?;
        node.token_x_fee_rate_snapshot = rate_x;
        node.token_y_fee_rate_snapshot = rate_y;

        // Ancestor liquidity blankets this range from above without being
        // part of subtree_m_liq, so it joins the denominator scaled by the
        // number of ticks it covers here.
        let total_m_liq = &node.subtree_m_liq + &(&aux * &range);
        if total_m_liq.is_zero() {
            return Ok(());
        }
        tracing::trace!(key = key.raw(), total_m_liq = %total_m_liq, "settle_fees");

        if !diff_x.is_zero() {
            let node_earn = (&node.token_x_borrowed * &diff_x)
                .div_with_prec(&total_m_liq, precision)?
                .div_with_prec(&q64, precision)?;
            let subtree_earn = (&node.token_x_subtree_borrowed * &diff_x)
                .div_with_prec(&total_m_liq, precision)?
                .div_with_prec(&q64, precision)?;
            node.token_x_cumulative_earned_per_m_liq += &node_earn;
            node.token_x_cumulative_earned_per_m_subtree_liq += &subtree_earn;
            if fee_mode == FeeMode::TruncateToInteger {
                node.token_x_cumulative_earned_per_m_liq =
                    node.token_x_cumulative_earned_per_m_liq.trunc();
                node.token_x_cumulative_earned_per_m_subtree_liq =
                    node.token_x_cumulative_earned_per_m_subtree_liq.trunc();
            }
        }
        if !diff_y.is_zero() {
            let node_earn = (&node.token_y_borrowed * &diff_y)
                .div_with_prec(&total_m_liq, precision)?
                .div_with_prec(&q64, precision)?;
            let subtree_earn = (&node.token_y_subtree_borrowed * &diff_y)
                .div_with_prec(&total_m_liq, precision)?
                .div_with_prec(&q64, precision)?;
            node.token_y_cumulative_earned_per_m_liq += &node_earn;
            node.token_y_cumulative_earned_per_m_subtree_liq += &subtree_earn;
            if fee_mode == FeeMode::TruncateToInteger {
                node.token_y_cumulative_earned_per_m_liq =
                    node.token_y_cumulative_earned_per_m_liq.trunc();
                node.token_y_cumulative_earned_per_m_subtree_liq =
                    node.token_y_cumulative_earned_per_m_subtree_liq.trunc();
            }
        }
        Ok(())
    }

    /// Sum of `m_liq` over every strict ancestor of `key` (the root counted
    /// once). Zero for the root itself. Read-only.
    fn ancestor_m_liq(&self, key: NodeKey) -> UnsignedDecimal {
        let mut aux = UnsignedDecimal::zero();
        let mut current = key;
        while current != self.root {
            let (parent, _) = current.generic_up();
            if let Some(node) = self.nodes.get(&parent) {
                aux += &node.m_liq;
            }
            current = parent;
        }
        aux
    }

    // ---- aggregate propagation ----

    fn recompute_subtree_m_liq(&mut self, key: NodeKey) {
        let (left, right) = key.children();
        let children = &self.subtree_m_liq_at(left) + &self.subtree_m_liq_at(right);
        let range = UnsignedDecimal::from_u64(key.range());
        let node = self.nodes.entry(key).or_default();
        node.subtree_m_liq = &children + &(&node.m_liq * &range);
    }

    fn recompute_subtree_borrowed(&mut self, key: NodeKey) {
        let (left, right) = key.children();
        let (left_x, left_y) = self.subtree_borrowed_at(left);
        let (right_x, right_y) = self.subtree_borrowed_at(right);
        let node = self.nodes.entry(key).or_default();
        node.token_x_subtree_borrowed = &(&left_x + &right_x) + &node.token_x_borrowed;
        node.token_y_subtree_borrowed = &(&left_y + &right_y) + &node.token_y_borrowed;
    }

    fn subtree_m_liq_at(&self, key: NodeKey) -> UnsignedDecimal {
        self.nodes
            .get(&key)
            .map(|n| n.subtree_m_liq.clone())
            .unwrap_or_default()
    }

    fn subtree_borrowed_at(&self, key: NodeKey) -> (UnsignedDecimal, UnsignedDecimal) {
        self.nodes
            .get(&key)
            .map(|n| {
                (
                    n.token_x_subtree_borrowed.clone(),
                    n.token_y_subtree_borrowed.clone(),
                )
            })
            .unwrap_or_default()
    }
}
