//! Sub-graph composition: per-key mapping, dynamically-ranked meshes,
//! and try/except failure boundaries.

pub mod context;
pub mod map_node;
pub mod mesh_node;
pub mod try_except;

pub use context::GraphContext;
pub use map_node::{MapNodeFactory, TsdMapNode};
pub use mesh_node::{MeshComputeNode, MeshNode, MeshNodeFactory};
pub use try_except::{wrap_failure, TryExceptNode};
