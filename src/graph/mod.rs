//! The cell dependency graph: nodes are snapshot cells, edges are formula references.
pub mod builder;
pub mod dag;

pub use builder::{build, GraphBuild};
pub use dag::DependencyGraph;
