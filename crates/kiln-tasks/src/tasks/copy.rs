use std::path::PathBuf;

use crate::error::{StageError, StageResultExt};
use crate::fileset::{select, FileSet};
use crate::name::TaskName;
use crate::tasks::{Footprint, LeafTask, Outcome, TaskContext};
use crate::BoxFuture;

/// Which asset family a copy task handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyKind {
    Fonts,
    Css,
    Images,
}

impl CopyKind {
    /// Subdirectory under both the source and build roots.
    fn dir(self) -> &'static str {
        match self {
            CopyKind::Fonts => "fonts",
            CopyKind::Css => "css",
            CopyKind::Images => "img",
        }
    }

    fn pattern(self) -> &'static str {
        match self {
            CopyKind::Fonts => "**/*.{woff,ttf,woff2,eot,svg}",
            CopyKind::Css => "*.css",
            CopyKind::Images => "*.{jpg,png}",
        }
    }
}

/// Copies matching files byte for byte into the build tree.
#[derive(Debug, Clone, Copy)]
pub struct CopyAssets {
    kind: CopyKind,
}

impl CopyAssets {
    pub fn new(kind: CopyKind) -> Self {
        Self { kind }
    }
}

impl LeafTask for CopyAssets {
    fn name(&self) -> TaskName {
        match self.kind {
            CopyKind::Fonts => TaskName::FontsCopy,
            CopyKind::Css => TaskName::CssCopy,
            CopyKind::Images => TaskName::ImgCopy,
        }
    }

    fn footprint(&self, ctx: &TaskContext) -> Footprint {
        let base = ctx.dirs.source().join(self.kind.dir());
        let dest = ctx.dirs.build().join(self.kind.dir());

        select(&base, self.kind.pattern())
            .unwrap_or_default()
            .into_iter()
            .fold(Footprint::default(), |fp, rel: PathBuf| {
                fp.read(base.join(&rel)).write(dest.join(&rel))
            })
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Result<Outcome, StageError>> {
        Box::pin(async move {
            let task = self.name();
            let base = ctx.dirs.source().join(self.kind.dir());
            let dest = ctx.dirs.build().join(self.kind.dir());

            let set = FileSet::read(&base, self.kind.pattern())
                .await
                .stage(task, "src")?;
            let written = set.write_to(&dest).await.stage(task, "dest")?;

            if !written.is_empty() {
                match self.kind {
                    CopyKind::Css => ctx.reload.inject(&ctx.url_paths(&written)),
                    CopyKind::Fonts | CopyKind::Images => ctx.reload.reload(),
                }
            }

            Ok(Outcome::Written(written))
        })
    }
}
