//! Liquidity tree engine: key codec, node record, walk planner, and the tree
//! itself.

pub mod key;
pub mod node;
pub mod tree;
pub mod walk;

pub use key::{lsb, NodeKey};
pub use node::LiqNode;
pub use tree::LiquidityTree;
pub use walk::{Step, StepKind};
