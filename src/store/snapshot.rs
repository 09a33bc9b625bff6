//! The point-in-time copy of the workbook handed over by the host.
use super::types::Cell;
use crate::error::AuditError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub cells: Vec<Cell>,
}

impl Snapshot {
    pub fn new(cells: Vec<Cell>) -> Self { Self { cells } }

    pub fn from_json(text: &str) -> Result<Self, AuditError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn len(&self) -> usize { self.cells.len() }
    pub fn is_empty(&self) -> bool { self.cells.is_empty() }
}

impl FromIterator<Cell> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Cell>>(iter: I) -> Self {
        Self { cells: iter.into_iter().collect() }
    }
}
