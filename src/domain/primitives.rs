//! Tick-range primitives shared by the tree engine and its callers.

use serde::{Deserialize, Serialize};

/// Absolute tick index on the discretized price axis. Signed so that invalid
/// (negative) caller input can be detected rather than wrapping.
pub type Tick = i64;

/// Inclusive tick range `[low, high]`.
///
/// Plain data: validation against a particular tree's width happens inside
/// the tree operations, which know the width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiqRange {
    pub low: Tick,
    pub high: Tick,
}

impl LiqRange {
    pub fn new(low: Tick, high: Tick) -> Self {
        Self { low, high }
    }

    /// Number of ticks spanned. Meaningless for inverted ranges, which the
    /// tree rejects before calling this.
    pub fn width(&self) -> i64 {
        self.high - self.low + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_counts_both_endpoints() {
        assert_eq!(LiqRange::new(0, 0).width(), 1);
        assert_eq!(LiqRange::new(3, 7).width(), 5);
    }
}
