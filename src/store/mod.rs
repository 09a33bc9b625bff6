//! Snapshot cells and the index-addressed arena they are stored in.
pub mod registry;
pub mod snapshot;
pub mod types;

pub use registry::Registry;
pub use snapshot::Snapshot;
pub use types::{Cell, CellAddress, CellKey, CellValue, NodeId, RawContent};
