//! Where the compute-heavy phases run.

use std::fmt;

/// Execution target of a run, fixed at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExecutionTarget {
    /// Host memory only.
    #[default]
    Cpu,
    /// Host plus an accelerator mirror of the particle columns.
    Accelerator,
}

impl ExecutionTarget {
    /// Configuration name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Accelerator => "accelerator",
        }
    }

    /// Parse a configuration name, case-insensitively. `gpu` is accepted
    /// for the accelerator.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "cpu" => Some(Self::Cpu),
            "accelerator" | "gpu" => Some(Self::Accelerator),
            _ => None,
        }
    }

    /// Whether the particle dataset carries an accelerator mirror.
    pub fn has_device(self) -> bool {
        self == Self::Accelerator
    }
}

impl fmt::Display for ExecutionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for t in [ExecutionTarget::Cpu, ExecutionTarget::Accelerator] {
            assert_eq!(ExecutionTarget::from_name(t.name()), Some(t));
        }
        assert_eq!(ExecutionTarget::from_name("GPU"), Some(ExecutionTarget::Accelerator));
        assert_eq!(ExecutionTarget::from_name("fpga"), None);
    }
}
