//! Per-range node state.

use serde::{Deserialize, Serialize};

use crate::domain::UnsignedDecimal;

/// State record for one tree node. Nodes spring into existence zero-valued
/// the first time an operation addresses their key and are never deleted.
///
/// Aggregation invariants maintained by the tree engine:
/// - `subtree_m_liq = left.subtree_m_liq + right.subtree_m_liq + m_liq * range`
/// - `token_*_subtree_borrowed = left + right + token_*_borrowed`
/// - `t_liq <= m_liq`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiqNode {
    /// Minted liquidity attributed to exactly this range, per tick.
    pub m_liq: UnsignedDecimal,
    /// Minted liquidity aggregated over every leaf tick this range spans.
    pub subtree_m_liq: UnsignedDecimal,
    /// Taken (borrowed-against) liquidity attributed to exactly this range.
    pub t_liq: UnsignedDecimal,

    pub token_x_borrowed: UnsignedDecimal,
    pub token_x_subtree_borrowed: UnsignedDecimal,
    pub token_y_borrowed: UnsignedDecimal,
    pub token_y_subtree_borrowed: UnsignedDecimal,

    /// Global fee-rate accumulator value last observed by this node. The
    /// difference against the tree's current value is the elapsed rate still
    /// owed to this node's earnings accumulators.
    pub token_x_fee_rate_snapshot: UnsignedDecimal,
    pub token_y_fee_rate_snapshot: UnsignedDecimal,

    /// Earnings per unit of this node's own `m_liq`.
    pub token_x_cumulative_earned_per_m_liq: UnsignedDecimal,
    /// Earnings per unit of total liquidity backing this node's subtree
    /// borrow.
    pub token_x_cumulative_earned_per_m_subtree_liq: UnsignedDecimal,
    pub token_y_cumulative_earned_per_m_liq: UnsignedDecimal,
    pub token_y_cumulative_earned_per_m_subtree_liq: UnsignedDecimal,
}
