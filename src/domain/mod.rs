//! Domain types for the liquidity tree.
//!
//! This module provides:
//! - Checked non-negative numeric handling via the UnsignedDecimal wrapper
//! - Tick and inclusive tick-range primitives

pub mod decimal;
pub mod primitives;

pub use decimal::{DecimalError, UnsignedDecimal};
pub use primitives::{LiqRange, Tick};
