//! Stage failures raised inside a transform pipeline.

use crate::name::TaskName;

/// A failure in one stage of a leaf task's pipeline.
///
/// The stage names follow the plugin that would have reported the error
/// (`less`, `postcss`, `cleancss`, `file-include`, `svgmin`, ...), so the
/// notification tells the developer which step to look at.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{task}: {stage}: {cause}")]
pub struct StageError {
    /// Task whose pipeline failed
    pub task: TaskName,

    /// Stage identity
    pub stage: &'static str,

    /// Human-readable cause
    pub cause: String,
}

impl StageError {
    pub fn new(task: TaskName, stage: &'static str, cause: impl ToString) -> Self {
        Self {
            task,
            stage,
            cause: cause.to_string(),
        }
    }
}

/// Attach a stage identity to any displayable error.
pub trait StageResultExt<T> {
    fn stage(self, task: TaskName, stage: &'static str) -> Result<T, StageError>;
}

impl<T, E: std::fmt::Display> StageResultExt<T> for Result<T, E> {
    fn stage(self, task: TaskName, stage: &'static str) -> Result<T, StageError> {
        self.map_err(|e| StageError::new(task, stage, e))
    }
}
