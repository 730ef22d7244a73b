//! Development server for kiln: serves the build tree, reruns tasks when
//! sources change and tells connected browsers to reload.

pub mod bindings;
pub mod livereload;
pub mod server;
pub mod watcher;

pub use bindings::{Dispatcher, GraphRunner, Step, StepRunner, WatchBinding, WatchTable};
pub use livereload::{LiveReloadHub, LiveReloadMessage};
pub use server::{DevServer, DevServerConfig, Phase, ServerError};
pub use watcher::{ChangeKind, FileWatcher, WatchEvent};
