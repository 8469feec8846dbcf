/// How fee accrual treats fractional earnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeMode {
    /// Retain fractional precision in the fee accumulators.
    FullPrecision,
    /// Truncate every updated accumulator to its integer part immediately
    /// after each accrual, matching the round-toward-zero integer division of
    /// the on-chain twin so outputs can be compared bit for bit.
    TruncateToInteger,
}

/// Per-tree configuration, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConfig {
    pub fee_mode: FeeMode,
    /// Significant digits retained by decimal division during fee accrual and
    /// borrow distribution.
    pub division_precision: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            fee_mode: FeeMode::FullPrecision,
            division_precision: 100,
        }
    }
}
