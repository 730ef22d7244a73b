//! Run a named task graph once.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use kiln_tasks::{Config, Outcome, Task, TaskContext, TaskName};

/// Run `name` to completion.
///
/// Stage failures are reported through notifications and do not change the
/// exit status; only setup problems are errors.
pub async fn run(config: Config, name: TaskName) -> Result<()> {
    let ctx = TaskContext::from_config(&config)?;
    let task = Task::named(name).with_context(|| format!("'{}' is not a task graph", name))?;

    let start = Instant::now();
    let reports = task.run(Arc::new(ctx)).await;

    let mut written = 0;
    let mut skipped = 0;
    let mut failed = Vec::new();
    for report in &reports {
        match &report.outcome {
            Outcome::Written(files) => written += files.len(),
            Outcome::Cleaned(_) => {}
            Outcome::Skipped(_) => skipped += 1,
            Outcome::Failed(err) => failed.push(err.task),
        }
    }

    tracing::info!(
        "Ran {} task(s) in {}ms: {} file(s) written, {} skipped",
        reports.len(),
        start.elapsed().as_millis(),
        written,
        skipped
    );

    if !failed.is_empty() {
        let names: Vec<&str> = failed.iter().map(|t| t.as_str()).collect();
        tracing::warn!("Failed: {}", names.join(", "));
    }

    Ok(())
}
