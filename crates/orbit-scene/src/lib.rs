pub mod id;
pub mod model;
pub mod transform;

pub use id::NodeId;
pub use model::*;
pub use transform::{Euler, EulerOrder, Transform, Vec3};

// Re-export petgraph types so downstream crates don't need a direct dependency
pub use petgraph::graph::NodeIndex;
