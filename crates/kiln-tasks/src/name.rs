//! Names of every task that can be invoked from the command line.

use std::fmt;
use std::str::FromStr;

/// A named task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskName {
    Clean,
    Less,
    Html,
    Js,
    ImgCopy,
    CssCopy,
    FontsCopy,
    Svgstore,
    FontLoaderMin,
    FontsWoff,
    FontsWoff2,
    Build,
    Serve,
    Default,
}

/// Raised when the command line names a task that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task '{0}' (expected one of: {list})", list = TaskName::ALL.map(|t| t.as_str()).join(", "))]
pub struct UnknownTask(pub String);

impl TaskName {
    pub const ALL: [TaskName; 14] = [
        TaskName::Clean,
        TaskName::Less,
        TaskName::Html,
        TaskName::Js,
        TaskName::ImgCopy,
        TaskName::CssCopy,
        TaskName::FontsCopy,
        TaskName::Svgstore,
        TaskName::FontLoaderMin,
        TaskName::FontsWoff,
        TaskName::FontsWoff2,
        TaskName::Build,
        TaskName::Serve,
        TaskName::Default,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskName::Clean => "clean",
            TaskName::Less => "less",
            TaskName::Html => "html",
            TaskName::Js => "js",
            TaskName::ImgCopy => "img:copy",
            TaskName::CssCopy => "css:copy",
            TaskName::FontsCopy => "fonts:copy",
            TaskName::Svgstore => "svgstore",
            TaskName::FontLoaderMin => "js:font:loading:LS:min",
            TaskName::FontsWoff => "css:fonts:woff",
            TaskName::FontsWoff2 => "css:fonts:woff2",
            TaskName::Build => "build",
            TaskName::Serve => "serve",
            TaskName::Default => "default",
        }
    }

    /// Whether this name starts the dev server rather than a task graph.
    pub fn is_serve(self) -> bool {
        matches!(self, TaskName::Serve | TaskName::Default)
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskName {
    type Err = UnknownTask;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownTask(s.to_string()))
    }
}
