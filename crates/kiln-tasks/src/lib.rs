//! Asset transform tasks and the task graph for kiln.
//!
//! Every leaf task reads a fixed slice of the source tree, runs it through an
//! ordered pipeline of stages and writes the result into the build tree. The
//! [`graph`] module composes leaves into the `build` pipeline and turns stage
//! failures into notifications instead of aborting the run.

pub mod assets;
pub mod compiler;
pub mod config;
pub mod error;
pub mod fileset;
pub mod graph;
pub mod guard;
pub mod include;
pub mod inline;
pub mod name;
pub mod notifier;
pub mod reload;
pub mod sprite;
pub mod tasks;

pub use config::{Config, ConfigError, Directories, ServerSettings, ToolSettings};
pub use error::StageError;
pub use graph::{Task, TaskReport};
pub use name::{TaskName, UnknownTask};
pub use notifier::{LogNotifier, Notification, Notifier};
pub use reload::{NoReload, ReloadSink};
pub use tasks::{Footprint, LeafTask, Outcome, TaskContext};

use std::future::Future;
use std::pin::Pin;

/// Boxed future used at the object-safe task seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
