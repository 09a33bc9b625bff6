//! Whole-graph analyses that must finish before any rule runs.
pub mod topology;

pub use topology::{analyze_cycles, find_cycles, CycleAnalysis};
