//! User-facing notifications for failed stages.

use std::sync::Mutex;

use crate::error::StageError;
use crate::name::TaskName;

/// A notification describing a failed stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Headline, e.g. `Error in less`
    pub title: String,
    pub task: TaskName,
    pub message: String,
}

impl From<&StageError> for Notification {
    fn from(err: &StageError) -> Self {
        Self {
            title: format!("Error in {}", err.stage),
            task: err.task,
            message: err.cause.clone(),
        }
    }
}

/// Receives a notification for every stage failure the orchestrator catches.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, n: &Notification) {
        tracing::error!(task = %n.task, "{}: {}", n.title, n.message);
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    received: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<Notification> {
        self.received
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, n: &Notification) {
        if let Ok(mut received) = self.received.lock() {
            received.push(n.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_with_stage_identity() {
        let err = StageError::new(TaskName::Html, "file-include", "missing partial");
        let n = Notification::from(&err);

        assert_eq!(n.title, "Error in file-include");
        assert_eq!(n.task, TaskName::Html);
        assert_eq!(n.message, "missing partial");
    }

    #[test]
    fn memory_notifier_records() {
        let notifier = MemoryNotifier::new();
        let err = StageError::new(TaskName::Svgstore, "svgmin", "no <svg> root");
        notifier.notify(&Notification::from(&err));

        let got = notifier.received();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].title, "Error in svgmin");
    }
}
