use thiserror::Error;

use crate::domain::DecimalError;

/// Errors raised by liquidity tree operations.
///
/// All of these are precondition or invariant violations, never transient
/// faults: a failed call is terminal and leaves the tree unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LiqTreeError {
    #[error("liquidity delta must be nonzero")]
    ZeroLiquidity,
    #[error("range contains a negative tick")]
    RangeContainsNegative,
    #[error("range high is below range low")]
    RangeHighBelowLow,
    #[error("range high {high} does not fit a tree of width {width}")]
    OversizedRange { high: i64, width: u64 },
    #[error("full-span range must use the wide operation variant")]
    RootRangeRejected,
    #[error("taken liquidity would exceed minted liquidity at a covered node")]
    BorrowExceedsMint,
    #[error(transparent)]
    Numeric(#[from] DecimalError),
    #[error("not yet supported: {0}")]
    Unsupported(&'static str),
}
