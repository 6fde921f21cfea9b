pub mod call_graph;
pub mod hierarchy;
pub mod symbol;
pub mod workspace;

pub use call_graph::*;
pub use hierarchy::*;
pub use symbol::*;
pub use workspace::*;
