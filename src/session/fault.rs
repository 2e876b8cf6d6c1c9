//! Reporting of faults that end a session worker.

use crate::error::VoxnexusError;
use std::fmt;
use tracing::error;

/// Pipeline stage that raised a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Inference,
    Synthesis,
    Encoding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Inference => write!(f, "inference"),
            Stage::Synthesis => write!(f, "synthesis"),
            Stage::Encoding => write!(f, "encoding"),
        }
    }
}

/// An error that terminated a session worker.
#[derive(Debug)]
pub struct PipelineFault {
    pub stage: Stage,
    pub error: VoxnexusError,
}

impl PipelineFault {
    pub fn new(stage: Stage, error: VoxnexusError) -> Self {
        Self { stage, error }
    }
}

impl fmt::Display for PipelineFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stage failed: {}", self.stage, self.error)
    }
}

impl std::error::Error for PipelineFault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Hook called once when a worker dies from a fault.
///
/// Nothing restarts the session; a supervisor that wants to can use this hook
/// (or poll `is_running`) to rebuild it.
pub trait FaultReporter: Send + Sync {
    fn report(&self, fault: &PipelineFault);
}

/// Reporter that logs faults.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl FaultReporter for LogReporter {
    fn report(&self, fault: &PipelineFault) {
        error!(stage = %fault.stage, error = %fault.error, "session worker stopped by fault");
    }
}
