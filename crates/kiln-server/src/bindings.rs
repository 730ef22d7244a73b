//! Dispatch table from changed source paths to rebuild reactions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::GlobMatcher;
use kiln_tasks::fileset::{matcher, slash_path};
use kiln_tasks::{BoxFuture, Task, TaskContext, TaskName};
use tokio::sync::mpsc;

use crate::watcher::WatchEvent;

/// One step of a watch reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Run(TaskName),
    Reload,
}

/// A glob under the source root and the steps it triggers.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    pattern: &'static str,
    matcher: GlobMatcher,
    steps: Vec<Step>,
}

impl WatchBinding {
    pub fn new(pattern: &'static str, steps: Vec<Step>) -> Result<Self, globset::Error> {
        Ok(Self {
            pattern,
            matcher: matcher(pattern)?,
            steps,
        })
    }

    pub fn pattern(&self) -> &'static str {
        self.pattern
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Whether a path relative to the source root matches.
    pub fn matches(&self, relative: &Path) -> bool {
        self.matcher.is_match(slash_path(relative))
    }
}

/// Every binding of the watch loop, rooted at the source directory.
#[derive(Debug, Clone)]
pub struct WatchTable {
    source: PathBuf,
    bindings: Vec<WatchBinding>,
}

impl WatchTable {
    pub fn new(source: impl Into<PathBuf>, bindings: Vec<WatchBinding>) -> Self {
        Self {
            source: source.into(),
            bindings,
        }
    }

    /// The bindings `serve` registers.
    pub fn standard(source: impl Into<PathBuf>) -> Result<Self, globset::Error> {
        use Step::{Reload, Run};

        let bindings = vec![
            WatchBinding::new("**/*.html", vec![Run(TaskName::Html), Reload])?,
            WatchBinding::new("less/**/*.less", vec![Run(TaskName::Less)])?,
            WatchBinding::new("css/*.css", vec![Run(TaskName::CssCopy)])?,
            WatchBinding::new("fonts/*.{woff,ttf,woff2}", vec![Run(TaskName::FontsCopy)])?,
            WatchBinding::new(
                "img/svg-sprite/*.svg",
                vec![Run(TaskName::Svgstore), Run(TaskName::Html), Reload],
            )?,
            WatchBinding::new("js/*.js", vec![Run(TaskName::Js), Reload])?,
        ];

        Ok(Self::new(source, bindings))
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn bindings(&self) -> &[WatchBinding] {
        &self.bindings
    }

    /// Indices of the bindings matching `path`. Paths outside the source
    /// root match nothing.
    pub fn matching(&self, path: &Path) -> Vec<usize> {
        let Ok(relative) = path.strip_prefix(&self.source) else {
            return Vec::new();
        };

        self.bindings
            .iter()
            .enumerate()
            .filter(|(_, b)| b.matches(relative))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Carries out reaction steps.
pub trait StepRunner: Send + Sync {
    fn run_task(&self, name: TaskName) -> BoxFuture<'_, ()>;

    fn reload(&self);
}

/// Runs steps against the task graph; reloads go to the context's sink.
#[derive(Clone)]
pub struct GraphRunner {
    ctx: Arc<TaskContext>,
}

impl GraphRunner {
    pub fn new(ctx: Arc<TaskContext>) -> Self {
        Self { ctx }
    }
}

impl StepRunner for GraphRunner {
    fn run_task(&self, name: TaskName) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            match Task::named(name) {
                Some(task) => {
                    task.run(self.ctx.clone()).await;
                }
                None => tracing::warn!("'{}' cannot run from the watcher", name),
            }
        })
    }

    fn reload(&self) {
        self.ctx.reload.reload();
    }
}

/// Feeds watch events to one worker per binding.
///
/// A binding's reactions run one after another in arrival order; different
/// bindings run independently. Dropping the dispatcher lets the workers
/// finish their queues and exit.
pub struct Dispatcher {
    table: WatchTable,
    workers: Vec<mpsc::UnboundedSender<PathBuf>>,
}

impl Dispatcher {
    /// Spawn the workers. Must be called inside a tokio runtime.
    pub fn spawn(table: WatchTable, runner: Arc<dyn StepRunner>) -> Self {
        let workers = table
            .bindings()
            .iter()
            .map(|binding| {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(react(binding.clone(), rx, runner.clone()));
                tx
            })
            .collect();

        Self { table, workers }
    }

    /// Queue a reaction on every binding matching the event's path.
    ///
    /// Returns how many bindings were triggered.
    pub fn dispatch(&self, event: &WatchEvent) -> usize {
        let hits = self.table.matching(&event.path);
        for &index in &hits {
            let _ = self.workers[index].send(event.path.clone());
        }
        hits.len()
    }
}

async fn react(
    binding: WatchBinding,
    mut rx: mpsc::UnboundedReceiver<PathBuf>,
    runner: Arc<dyn StepRunner>,
) {
    while let Some(path) = rx.recv().await {
        tracing::info!("{} changed ({})", path.display(), binding.pattern());

        for step in binding.steps() {
            match step {
                Step::Run(name) => runner.run_task(*name).await,
                Step::Reload => runner.reload(),
            }
        }
    }
}
