//! Dense, fixed-depth binary range tree tracking liquidity provision and
//! borrowing across a discretized tick axis, with lazy per-range fee accrual.
//!
//! The tree mirrors the arithmetic behavior of an on-chain twin: node keys
//! are packed (range, base) integers navigated with bit tricks, tick ranges
//! decompose into a minimal covering set via boundary "leg" walks, aggregate
//! liquidity and borrow totals propagate to the root on every mutation, and
//! fee earnings settle lazily against global rate-snapshot accumulators the
//! host advances out of band.
//!
//! ```
//! use liqtree::{LiqRange, LiquidityTree, UnsignedDecimal};
//!
//! let mut tree = LiquidityTree::new(4); // 16 ticks
//! tree.add_m_liq(LiqRange::new(0, 7), UnsignedDecimal::from_u64(100)).unwrap();
//! let node = tree.node_snapshot(LiqRange::new(0, 7)).unwrap();
//! assert_eq!(node.subtree_m_liq, UnsignedDecimal::from_u64(800));
//! ```

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;

pub use config::{FeeMode, TreeConfig};
pub use domain::{DecimalError, LiqRange, Tick, UnsignedDecimal};
pub use engine::{LiqNode, LiquidityTree, NodeKey};
pub use error::LiqTreeError;
