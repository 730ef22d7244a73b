//! Composition of leaf tasks into series and parallel groups.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;

use crate::name::TaskName;
use crate::notifier::Notification;
use crate::tasks::{leaf, Footprint, LeafTask, Outcome, TaskContext};
use crate::BoxFuture;

/// A node in the task graph.
#[derive(Clone)]
pub enum Task {
    Leaf(Arc<dyn LeafTask>),

    /// Children run one after another
    Series(&'static str, Vec<Task>),

    /// Children run concurrently, unless their footprints overlap
    Parallel(&'static str, Vec<Task>),
}

/// Result of one leaf run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub task: TaskName,
    pub outcome: Outcome,
    pub elapsed: Duration,
}

/// Two members of a parallel group that touch the same path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub first: String,
    pub second: String,
    pub path: PathBuf,
}

impl Task {
    /// The graph registered under `name`.
    ///
    /// `serve` and `default` are not graphs; they start the dev server.
    pub fn named(name: TaskName) -> Option<Task> {
        match name {
            TaskName::Build => Some(Task::build()),
            TaskName::Serve | TaskName::Default => None,
            _ => leaf(name).map(Task::Leaf),
        }
    }

    /// `clean`, then the sprite, then every independent asset task at
    /// once, then the pages.
    pub fn build() -> Task {
        let leaves = |names: &[TaskName]| -> Vec<Task> {
            names.iter().filter_map(|n| leaf(*n)).map(Task::Leaf).collect()
        };

        let mut stages = leaves(&[TaskName::Clean, TaskName::Svgstore]);
        stages.push(Task::Parallel(
            "assets",
            leaves(&[
                TaskName::Less,
                TaskName::Js,
                TaskName::ImgCopy,
                TaskName::CssCopy,
                TaskName::FontsCopy,
                TaskName::FontLoaderMin,
                TaskName::FontsWoff,
                TaskName::FontsWoff2,
            ]),
        ));
        stages.extend(leaves(&[TaskName::Html]));

        Task::Series("build", stages)
    }

    pub fn name(&self) -> String {
        match self {
            Task::Leaf(task) => task.name().to_string(),
            Task::Series(name, _) | Task::Parallel(name, _) => name.to_string(),
        }
    }

    /// Union of every leaf footprint below this node.
    pub fn footprint(&self, ctx: &TaskContext) -> Footprint {
        match self {
            Task::Leaf(task) => task.footprint(ctx),
            Task::Series(_, children) | Task::Parallel(_, children) => children
                .iter()
                .fold(Footprint::default(), |fp, child| fp.merge(child.footprint(ctx))),
        }
    }

    /// First pair of overlapping members if this is a parallel group.
    pub fn conflicts(&self, ctx: &TaskContext) -> Option<Conflict> {
        let Task::Parallel(_, children) = self else {
            return None;
        };

        let footprints: Vec<Footprint> = children.iter().map(|c| c.footprint(ctx)).collect();
        for (i, a) in footprints.iter().enumerate() {
            for (j, b) in footprints.iter().enumerate().skip(i + 1) {
                if let Some(path) = a.conflicts_with(b) {
                    return Some(Conflict {
                        first: children[i].name(),
                        second: children[j].name(),
                        path,
                    });
                }
            }
        }
        None
    }

    /// Run this node to completion.
    ///
    /// Stage failures never abort the graph: the failed leaf is reported to
    /// the notifier and recorded as [`Outcome::Failed`], and its siblings and
    /// successors still run.
    pub fn run(&self, ctx: Arc<TaskContext>) -> BoxFuture<'_, Vec<TaskReport>> {
        Box::pin(async move {
            match self {
                Task::Leaf(task) => vec![run_leaf(task.as_ref(), &ctx).await],
                Task::Series(name, children) => {
                    let start = Instant::now();
                    tracing::info!("Starting '{}'...", name);

                    let mut reports = Vec::new();
                    for child in children {
                        reports.extend(child.run(ctx.clone()).await);
                    }

                    tracing::info!("Finished '{}' after {:?}", name, start.elapsed());
                    reports
                }
                Task::Parallel(name, children) => {
                    let start = Instant::now();
                    tracing::info!("Starting '{}'...", name);

                    let reports = match self.conflicts(&ctx) {
                        Some(conflict) => {
                            tracing::warn!(
                                "'{}' and '{}' both touch {}; running '{}' in series",
                                conflict.first,
                                conflict.second,
                                conflict.path.display(),
                                name
                            );
                            let mut reports = Vec::new();
                            for child in children {
                                reports.extend(child.run(ctx.clone()).await);
                            }
                            reports
                        }
                        None => run_concurrently(children, &ctx).await,
                    };

                    tracing::info!("Finished '{}' after {:?}", name, start.elapsed());
                    reports
                }
            }
        })
    }
}

async fn run_leaf(task: &dyn LeafTask, ctx: &TaskContext) -> TaskReport {
    let name = task.name();
    let start = Instant::now();
    tracing::info!("Starting '{}'...", name);

    let outcome = match task.run(ctx).await {
        Ok(outcome) => outcome,
        Err(err) => {
            ctx.notifier.notify(&Notification::from(&err));
            Outcome::Failed(err)
        }
    };

    let elapsed = start.elapsed();
    tracing::info!("Finished '{}' after {:?}", name, elapsed);

    TaskReport {
        task: name,
        outcome,
        elapsed,
    }
}

/// Spawn every child and collect reports in listed order.
async fn run_concurrently(children: &[Task], ctx: &Arc<TaskContext>) -> Vec<TaskReport> {
    let mut set = JoinSet::new();
    for (index, child) in children.iter().cloned().enumerate() {
        let ctx = ctx.clone();
        set.spawn(async move { (index, child.run(ctx).await) });
    }

    let mut slots: Vec<Vec<TaskReport>> = vec![Vec::new(); children.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, reports)) => slots[index] = reports,
            Err(e) => tracing::error!("Task panicked: {}", e),
        }
    }

    slots.into_iter().flatten().collect()
}
