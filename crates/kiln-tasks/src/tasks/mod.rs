//! Leaf tasks: one file-set pipeline each.

mod clean;
mod copy;
mod fonts;
mod html;
mod script;
mod sprite;
mod style;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use clean::Clean;
pub use copy::{CopyAssets, CopyKind};
pub use fonts::{FontFormat, InlineFonts};
pub use html::HtmlAssemble;
pub use script::{BundleScript, MinifyLoaderScript};
pub use sprite::SvgSprite;
pub use style::StyleCompile;

use crate::assets::AssetPipeline;
use crate::compiler::{LesscCompiler, StyleCompiler};
use crate::config::{Config, ConfigError, Directories};
use crate::error::StageError;
use crate::fileset::slash_path;
use crate::name::TaskName;
use crate::notifier::{LogNotifier, Notifier};
use crate::reload::{NoReload, ReloadSink};
use crate::BoxFuture;

/// Everything a leaf task needs, built once at startup.
#[derive(Clone)]
pub struct TaskContext {
    pub dirs: Directories,
    pub pipeline: AssetPipeline,
    pub compiler: Arc<dyn StyleCompiler>,
    pub reload: Arc<dyn ReloadSink>,
    pub notifier: Arc<dyn Notifier>,
}

impl TaskContext {
    /// Context with `lessc`, default browser targets, no live reload and log
    /// notifications.
    pub fn new(dirs: Directories) -> Self {
        Self {
            dirs,
            pipeline: AssetPipeline::default(),
            compiler: Arc::new(LesscCompiler::default()),
            reload: Arc::new(NoReload),
            notifier: Arc::new(LogNotifier),
        }
    }

    /// Context for a loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let pipeline = AssetPipeline::for_browsers(&config.tools.browsers).map_err(|message| {
            ConfigError::InvalidBrowsers {
                query: config.tools.browsers.clone(),
                message,
            }
        })?;

        Ok(Self::new(config.directories.clone())
            .with_pipeline(pipeline)
            .with_compiler(LesscCompiler::new(&config.tools.lessc)))
    }

    pub fn with_pipeline(mut self, pipeline: AssetPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_compiler(mut self, compiler: impl StyleCompiler + 'static) -> Self {
        self.compiler = Arc::new(compiler);
        self
    }

    pub fn with_reload(mut self, reload: Arc<dyn ReloadSink>) -> Self {
        self.reload = reload;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// URL path of a build output, relative to the build root.
    pub fn url_path(&self, path: &Path) -> String {
        slash_path(path.strip_prefix(self.dirs.build()).unwrap_or(path))
    }

    fn url_paths(&self, paths: &[PathBuf]) -> Vec<String> {
        paths.iter().map(|p| self.url_path(p)).collect()
    }
}

/// What a leaf task did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Files written
    Written(Vec<PathBuf>),

    /// Build-root entries removed
    Cleaned(usize),

    /// Optional input absent; nothing to do
    Skipped(String),

    /// A stage failed; the task produced no output
    Failed(StageError),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// Paths a task reads and writes, resolved against the current file system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Footprint {
    pub reads: BTreeSet<PathBuf>,
    pub writes: BTreeSet<PathBuf>,
}

impl Footprint {
    pub fn read(mut self, path: impl Into<PathBuf>) -> Self {
        self.reads.insert(path.into());
        self
    }

    pub fn write(mut self, path: impl Into<PathBuf>) -> Self {
        self.writes.insert(path.into());
        self
    }

    pub fn merge(mut self, other: Footprint) -> Self {
        self.reads.extend(other.reads);
        self.writes.extend(other.writes);
        self
    }

    /// First path this footprint writes that `other` reads or writes, or the
    /// other way round. Directories cover everything below them.
    pub fn conflicts_with(&self, other: &Footprint) -> Option<PathBuf> {
        fn clash(writes: &BTreeSet<PathBuf>, other: &Footprint) -> Option<PathBuf> {
            writes.iter().find_map(|w| {
                other
                    .reads
                    .iter()
                    .chain(&other.writes)
                    .find(|p| w.starts_with(p) || p.starts_with(w))
                    .map(|_| w.clone())
            })
        }

        clash(&self.writes, other).or_else(|| clash(&other.writes, self))
    }
}

/// A single-purpose transform pipeline.
pub trait LeafTask: Send + Sync {
    fn name(&self) -> TaskName;

    /// Inputs and outputs, used to check that parallel siblings are disjoint.
    fn footprint(&self, ctx: &TaskContext) -> Footprint;

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Result<Outcome, StageError>>;
}

/// The leaf task registered under `name`, if `name` is a leaf.
pub fn leaf(name: TaskName) -> Option<Arc<dyn LeafTask>> {
    let task: Arc<dyn LeafTask> = match name {
        TaskName::Clean => Arc::new(Clean),
        TaskName::Less => Arc::new(StyleCompile),
        TaskName::Html => Arc::new(HtmlAssemble),
        TaskName::Js => Arc::new(BundleScript),
        TaskName::ImgCopy => Arc::new(CopyAssets::new(CopyKind::Images)),
        TaskName::CssCopy => Arc::new(CopyAssets::new(CopyKind::Css)),
        TaskName::FontsCopy => Arc::new(CopyAssets::new(CopyKind::Fonts)),
        TaskName::Svgstore => Arc::new(SvgSprite),
        TaskName::FontLoaderMin => Arc::new(MinifyLoaderScript),
        TaskName::FontsWoff => Arc::new(InlineFonts::new(FontFormat::Woff)),
        TaskName::FontsWoff2 => Arc::new(InlineFonts::new(FontFormat::Woff2)),
        TaskName::Build | TaskName::Serve | TaskName::Default => return None,
    };
    Some(task)
}
