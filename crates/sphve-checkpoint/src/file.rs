//! Writer and reader traits and their file-backed implementations.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use sphve_fields::{ColumnData, ColumnView};

use crate::codec::{decode_archive, encode_header, encode_step};
use crate::error::CheckpointError;
use crate::types::{RecordValue, Step};

/// Sink for checkpoint and output steps.
///
/// Records accumulate until [`close_step`](Self::close_step) commits the
/// step as a whole.
pub trait FileWriter {
    /// Add a scalar or array record to the open step.
    fn step_attribute(&mut self, name: &str, value: RecordValue) -> Result<(), CheckpointError>;

    /// Add a particle column to the open step. `column` is the index of the
    /// field in the particle field table.
    fn write_field(
        &mut self,
        name: &str,
        data: ColumnView<'_>,
        column: usize,
    ) -> Result<(), CheckpointError>;

    /// Commit the open step.
    fn close_step(&mut self) -> Result<(), CheckpointError>;
}

/// Source of checkpoint steps.
pub trait FileReader {
    /// Open step `step` of the archive at `path`; `None` opens the last.
    fn set_step(&mut self, path: &Path, step: Option<usize>) -> Result<(), CheckpointError>;

    /// Steps in the archive of the open step.
    fn num_steps(&self) -> usize;

    /// Record `name` of the open step.
    fn step_attribute(&self, name: &str) -> Result<&RecordValue, CheckpointError>;

    /// Whether the open step has a record `name`.
    fn has_attribute(&self, name: &str) -> bool {
        self.step_attribute(name).is_ok()
    }

    /// Column record `name` of the open step.
    fn read_field(&self, name: &str) -> Result<&ColumnData, CheckpointError>;

    /// Close the open step.
    fn close_step(&mut self);
}

/// Pick `step` out of `steps`, the last one for `None`.
pub(crate) fn select_step(steps: &[Step], step: Option<usize>) -> Result<usize, CheckpointError> {
    let idx = match step {
        Some(s) => s,
        None => steps.len().checked_sub(1).ok_or(CheckpointError::NoSuchStep {
            step: 0,
            available: 0,
        })?,
    };
    if idx >= steps.len() {
        return Err(CheckpointError::NoSuchStep {
            step: idx,
            available: steps.len(),
        });
    }
    Ok(idx)
}

/// Appends steps to a binary archive file.
///
/// The header is written when the file is created; an existing archive is
/// validated and extended.
pub struct BinaryFileWriter {
    path: PathBuf,
    open: Step,
    steps_written: usize,
}

impl BinaryFileWriter {
    /// Start a fresh archive at `path`, replacing any existing file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let path = path.as_ref().to_path_buf();
        let mut file = BufWriter::new(File::create(&path)?);
        encode_header(&mut file)?;
        file.flush()?;
        Ok(Self {
            path,
            open: Step::new(),
            steps_written: 0,
        })
    }

    /// Extend the archive at `path`, creating it if absent.
    pub fn append(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let path = path.as_ref();
        if !path.exists() {
            return Self::create(path);
        }
        let steps = decode_archive(&mut BufReader::new(File::open(path)?))?;
        Ok(Self {
            path: path.to_path_buf(),
            open: Step::new(),
            steps_written: steps.len(),
        })
    }

    /// Steps in the file, including those present before this writer.
    pub fn steps_written(&self) -> usize {
        self.steps_written
    }

    /// Archive path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileWriter for BinaryFileWriter {
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
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut out = BufWriter::new(file);
        encode_step(&mut out, &self.open)?;
        out.flush()?;
        self.open = Step::new();
        self.steps_written += 1;
        Ok(())
    }
}

/// Reads steps from a binary archive file.
#[derive(Default)]
pub struct BinaryFileReader {
    steps: Vec<Step>,
    current: Option<usize>,
}

impl BinaryFileReader {
    /// Reader with no open step.
    pub fn new() -> Self {
        Self::default()
    }

    fn open_step(&self) -> Result<&Step, CheckpointError> {
        self.current
            .map(|i| &self.steps[i])
            .ok_or(CheckpointError::NoOpenStep)
    }
}

impl FileReader for BinaryFileReader {
    fn set_step(&mut self, path: &Path, step: Option<usize>) -> Result<(), CheckpointError> {
        let steps = decode_archive(&mut BufReader::new(File::open(path)?))?;
        let idx = select_step(&steps, step)?;
        self.steps = steps;
        self.current = Some(idx);
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
