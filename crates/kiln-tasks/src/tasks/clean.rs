use crate::error::StageError;
use crate::name::TaskName;
use crate::tasks::{Footprint, LeafTask, Outcome, TaskContext};
use crate::BoxFuture;

/// The one build-root entry that survives a clean.
pub const PRESERVED: &str = "readme.md";

/// Empties the build root, keeping [`PRESERVED`].
///
/// Never fails: a missing build root is created, and entries that cannot be
/// removed are logged and left behind.
#[derive(Debug, Default, Clone, Copy)]
pub struct Clean;

impl LeafTask for Clean {
    fn name(&self) -> TaskName {
        TaskName::Clean
    }

    fn footprint(&self, ctx: &TaskContext) -> Footprint {
        Footprint::default().write(ctx.dirs.build())
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Result<Outcome, StageError>> {
        Box::pin(async move {
            let build = ctx.dirs.build();

            let mut entries = match tokio::fs::read_dir(build).await {
                Ok(entries) => entries,
                Err(_) => {
                    if let Err(e) = tokio::fs::create_dir_all(build).await {
                        tracing::warn!("Failed to create {}: {}", build.display(), e);
                    }
                    return Ok(Outcome::Cleaned(0));
                }
            };

            let mut removed = 0;
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("Failed to list {}: {}", build.display(), e);
                        break;
                    }
                };

                if entry.file_name() == PRESERVED {
                    continue;
                }

                let path = entry.path();
                let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                let result = if is_dir {
                    tokio::fs::remove_dir_all(&path).await
                } else {
                    tokio::fs::remove_file(&path).await
                };

                match result {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
                }
            }

            tracing::debug!("Removed {} entries from {}", removed, build.display());
            Ok(Outcome::Cleaned(removed))
        })
    }
}
