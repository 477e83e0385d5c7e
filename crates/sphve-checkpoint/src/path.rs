//! `path[,step]` checkpoint locations.

use std::path::PathBuf;

use crate::error::CheckpointError;

/// A checkpoint file and the step to restore from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckpointPath {
    /// Archive file.
    pub path: PathBuf,
    /// Step index; `None` selects the last step.
    pub step: Option<usize>,
}

impl CheckpointPath {
    /// Split `spec` at its last comma into path and step.
    ///
    /// ```
    /// use sphve_checkpoint::CheckpointPath;
    ///
    /// let p = CheckpointPath::parse("run.sphv,3").unwrap();
    /// assert_eq!(p.step, Some(3));
    /// assert_eq!(CheckpointPath::parse("run.sphv").unwrap().step, None);
    /// ```
    pub fn parse(spec: &str) -> Result<Self, CheckpointError> {
        match spec.rsplit_once(',') {
            None => Ok(Self {
                path: PathBuf::from(spec),
                step: None,
            }),
            Some((path, suffix)) => {
                let suffix = suffix.trim();
                let step = suffix.parse().map_err(|_| CheckpointError::InvalidStepSuffix {
                    suffix: suffix.to_string(),
                })?;
                Ok(Self {
                    path: PathBuf::from(path),
                    step: Some(step),
                })
            }
        }
    }

    /// Whether the archive file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffix() {
        let p = CheckpointPath::parse("out/dump.sphv, 12").unwrap();
        assert_eq!(p.path, PathBuf::from("out/dump.sphv"));
        assert_eq!(p.step, Some(12));
        assert!(matches!(
            CheckpointPath::parse("dump.sphv,last"),
            Err(CheckpointError::InvalidStepSuffix { .. })
        ));
        assert!(!CheckpointPath::parse("/no/such/file").unwrap().exists());
    }
}
