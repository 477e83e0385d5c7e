//! In-memory archives for tests and tooling.

use std::path::Path;

use sphve_fields::{ColumnData, ColumnView};

use crate::error::CheckpointError;
use crate::file::{select_step, FileReader, FileWriter};
use crate::types::{RecordValue, Step};

/// Writer collecting steps in memory.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryArchive {
    steps: Vec<Step>,
    open: Step,
}

impl MemoryArchive {
    /// Empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed steps.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The uncommitted step.
    pub fn pending(&self) -> &Step {
        &self.open
    }

    /// Reader over a snapshot of the committed steps.
    pub fn reader(&self) -> MemoryReader {
        MemoryReader {
            steps: self.steps.clone(),
            current: None,
        }
    }
}

impl FileWriter for MemoryArchive {
    fn step_attribute(&mut self, name: &str, value: RecordValue) -> Result<(), CheckpointError> {
        self.open.insert(name, value);
        Ok(())
    }

    fn write_field(
        &mut self,
        name: &str,
        data: ColumnView<'_>,
        column: usize,
    ) -> Result<(), CheckpointError> {
        self.open.insert(
            name,
            RecordValue::Column {
                index: column as u32,
                data: data.to_owned_data(),
            },
        );
        Ok(())
    }

    fn close_step(&mut self) -> Result<(), CheckpointError> {
        self.steps.push(std::mem::take(&mut self.open));
        Ok(())
    }
}

/// Reader over in-memory steps; the path given to `set_step` is ignored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryReader {
    steps: Vec<Step>,
    current: Option<usize>,
}

impl MemoryReader {
    /// Reader over `steps`.
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            current: None,
        }
    }

    fn open_step(&self) -> Result<&Step, CheckpointError> {
        self.current
            .map(|i| &self.steps[i])
            .ok_or(CheckpointError::NoOpenStep)
    }
}

impl FileReader for MemoryReader {
    fn set_step(&mut self, _path: &Path, step: Option<usize>) -> Result<(), CheckpointError> {
        self.current = Some(select_step(&self.steps, step)?);
        Ok(())
    }

    fn num_steps(&self) -> usize {
        self.steps.len()
    }

    fn step_attribute(&self, name: &str) -> Result<&RecordValue, CheckpointError> {
        self.open_step()?.require(name)
    }

    fn read_field(&self, name: &str) -> Result<&ColumnData, CheckpointError> {
        self.open_step()?.column(name)
    }

    fn close_step(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_records_commit_on_close() {
        let mut a = MemoryArchive::new();
        a.step_attribute("time", RecordValue::Real(0.5)).unwrap();
        assert_eq!(a.pending().len(), 1);
        assert!(a.steps().is_empty());
        a.close_step().unwrap();
        assert!(a.pending().is_empty());

        let mut r = a.reader();
        r.set_step(Path::new("ignored"), None).unwrap();
        assert_eq!(r.step_attribute("time").unwrap(), &RecordValue::Real(0.5));
        assert!(matches!(r.read_field("time"), Err(CheckpointError::RecordType { .. })));
    }
}
