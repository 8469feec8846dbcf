//! Packed node-key codec and range decomposition.
//!
//! A node stands for a contiguous tick range of width `2^d` starting at a
//! base that is a multiple of that width. Both facts are packed into one
//! integer: the range (the width itself, not the depth) above bit 24 and the
//! base in the low 24 bits. Bases are internal coordinates, i.e. already
//! shifted by the tree width, so the root of a width-`w` tree is
//! `(w << 24) | w`. Navigation toward the root is then pure bit arithmetic
//! instead of pointer chasing, and the minimal covering set of a tick range
//! falls out of the classic "expand to the largest aligned block" trick.

/// Number of low bits holding the base. Bounds the tree to `depth <= 23`
/// (internal bases run up to `2 * width - 1` and must fit these bits).
pub const BASE_BITS: u32 = 24;

const BASE_MASK: u64 = (1 << BASE_BITS) - 1;

/// Least-significant set bit: `x & (~x + 1)`.
#[inline]
pub fn lsb(x: u64) -> u64 {
    x & x.wrapping_neg()
}

/// Packed (range, base) node key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(u64);

impl NodeKey {
    #[inline]
    pub fn from_parts(range: u64, base: u64) -> Self {
        debug_assert!(range.is_power_of_two());
        debug_assert_eq!(base & (range - 1), 0, "base must be range-aligned");
        NodeKey((range << BASE_BITS) | base)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Width of the covered range, always a power of two.
    #[inline]
    pub fn range(self) -> u64 {
        self.0 >> BASE_BITS
    }

    /// First covered internal tick.
    #[inline]
    pub fn base(self) -> u64 {
        self.0 & BASE_MASK
    }

    #[inline]
    pub fn is_leaf(self) -> bool {
        self.range() == 1
    }

    /// A node is its parent's left child iff the base bit at the range's
    /// position is clear.
    #[inline]
    pub fn is_left(self) -> bool {
        self.base() & self.range() == 0
    }

    #[inline]
    pub fn is_right(self) -> bool {
        !self.is_left()
    }

    /// Sibling to the right; caller must be a left child.
    #[inline]
    pub fn right_sibling(self) -> Self {
        debug_assert!(self.is_left());
        NodeKey::from_parts(self.range(), self.base() ^ self.range())
    }

    /// Sibling to the left; caller must be a right child.
    #[inline]
    pub fn left_sibling(self) -> Self {
        debug_assert!(self.is_right());
        NodeKey::from_parts(self.range(), self.base() ^ self.range())
    }

    /// Parent and sibling of any node.
    #[inline]
    pub fn generic_up(self) -> (Self, Self) {
        let range = self.range();
        let base = self.base();
        let parent = NodeKey::from_parts(range << 1, base & !range);
        let sibling = NodeKey::from_parts(range, base ^ range);
        (parent, sibling)
    }

    /// Parent and left sibling, for a node known to be a right child.
    #[inline]
    pub fn right_up(self) -> (Self, Self) {
        debug_assert!(self.is_right());
        let range = self.range();
        let sibling_base = self.base() ^ range;
        (
            NodeKey::from_parts(range << 1, sibling_base),
            NodeKey::from_parts(range, sibling_base),
        )
    }

    /// Parent and right sibling, for a node known to be a left child.
    #[inline]
    pub fn left_up(self) -> (Self, Self) {
        debug_assert!(self.is_left());
        let range = self.range();
        let base = self.base();
        (
            NodeKey::from_parts(range << 1, base),
            NodeKey::from_parts(range, base | range),
        )
    }

    /// Left and right child keys. Meaningless on leaves.
    #[inline]
    pub fn children(self) -> (Self, Self) {
        debug_assert!(!self.is_leaf());
        let half = self.range() >> 1;
        let base = self.base();
        (
            NodeKey::from_parts(half, base),
            NodeKey::from_parts(half, base + half),
        )
    }

    #[inline]
    pub fn contains(self, tick: u64) -> bool {
        self.base() <= tick && tick < self.base() + self.range()
    }
}

/// Key of the maximal aligned node whose base is exactly `low`.
#[inline]
pub fn low_key(low: u64) -> NodeKey {
    NodeKey::from_parts(lsb(low), low)
}

/// Key of the maximal aligned node ending exactly at `high`.
#[inline]
pub fn high_key(high: u64) -> NodeKey {
    let next = high + 1;
    let range = lsb(next);
    NodeKey::from_parts(range, next ^ range)
}

/// Smallest node whose range contains both internal ticks, plus its range.
///
/// The shared bit prefix of `low` and `high` determines the answer; the
/// divergence bit is located with a constant-iteration binary search over the
/// 24-bit index space, keeping the running time independent of magnitude.
pub fn lowest_common_ancestor(low: u64, high: u64) -> (NodeKey, u64) {
    let diff = low ^ high;
    let range = if diff == 0 {
        1
    } else {
        let mut lo = 0u32;
        let mut hi = BASE_BITS;
        while hi - lo > 1 {
            let mid = (lo + hi) >> 1;
            if diff >> mid == 0 {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        1u64 << (lo + 1)
    };
    let base = low & !(range - 1);
    (NodeKey::from_parts(range, base), range)
}

/// Decompose an internal tick range into its boundary keys.
///
/// Returns `(low, high, peak, stop_range)`:
/// - `low` / `high` are the boundary covering keys (collapsed to the peak
///   when they already sit at or above the peak's level);
/// - `peak` is the lowest common ancestor of the two ticks;
/// - `stop_range` is the sentinel at which the boundary leg walks hand over
///   to the generic walk-to-root phase.
pub fn range_bounds(range_low: u64, range_high: u64) -> (NodeKey, NodeKey, NodeKey, u64) {
    let mut low = low_key(range_low);
    let mut high = high_key(range_high);
    let (peak, peak_range) = lowest_common_ancestor(range_low, range_high);

    let low_below = low.range() < peak_range;
    let high_below = high.range() < peak_range;
    let stop_range = match (low_below, high_below) {
        // Both boundaries sit strictly below the peak: walk each leg up to
        // one level short of the peak and let the merge phase join them.
        (true, true) => peak_range >> 1,
        // The high boundary already reaches the peak's level: only a left
        // leg is needed.
        (true, false) => {
            high = peak;
            peak_range
        }
        (false, true) => {
            low = peak;
            peak_range
        }
        // The peak itself is the sole covering node.
        (false, false) => {
            low = peak;
            high = peak;
            peak_range << 1
        }
    };
    (low, high, peak, stop_range)
}
