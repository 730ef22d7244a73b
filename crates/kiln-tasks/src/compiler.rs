//! Stylesheet preprocessor backends.

use std::path::{Path, PathBuf};

use crate::BoxFuture;

/// Compiles a preprocessor stylesheet to plain CSS.
pub trait StyleCompiler: Send + Sync {
    /// Compiler identifier used in logs
    fn name(&self) -> &'static str;

    /// Compile the entry stylesheet at `path`, whose contents are `source`.
    ///
    /// Imports are resolved relative to `path`.
    fn compile<'a>(&'a self, path: &'a Path, source: &'a str) -> BoxFuture<'a, Result<String, String>>;
}

/// Runs the `lessc` executable.
#[derive(Debug, Clone)]
pub struct LesscCompiler {
    program: PathBuf,
}

impl LesscCompiler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for LesscCompiler {
    fn default() -> Self {
        Self::new("lessc")
    }
}

impl StyleCompiler for LesscCompiler {
    fn name(&self) -> &'static str {
        "lessc"
    }

    fn compile<'a>(&'a self, path: &'a Path, _source: &'a str) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move {
            let output = tokio::process::Command::new(&self.program)
                .arg("--no-color")
                .arg(path)
                .output()
                .await
                .map_err(|e| format!("Failed to run {}: {}", self.program.display(), e))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(stderr.trim().to_string());
            }

            String::from_utf8(output.stdout).map_err(|e| format!("Compiler output is not UTF-8: {}", e))
        })
    }
}

/// Passes the entry through untouched.
///
/// For projects whose entry stylesheet is already plain CSS.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainCssCompiler;

impl StyleCompiler for PlainCssCompiler {
    fn name(&self) -> &'static str {
        "css"
    }

    fn compile<'a>(&'a self, _path: &'a Path, source: &'a str) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move { Ok(source.to_string()) })
    }
}
