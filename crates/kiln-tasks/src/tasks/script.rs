use crate::assets::AssetPipeline;
use crate::error::{StageError, StageResultExt};
use crate::fileset::{FileSet, SourceFile};
use crate::name::TaskName;
use crate::tasks::{Footprint, LeafTask, Outcome, TaskContext};
use crate::BoxFuture;

/// Bundles `js/script.js` into `js/script.min.js`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BundleScript;

impl BundleScript {
    const OUTPUT: &'static str = "script.min.js";
}

impl LeafTask for BundleScript {
    fn name(&self) -> TaskName {
        TaskName::Js
    }

    fn footprint(&self, ctx: &TaskContext) -> Footprint {
        Footprint::default()
            .read(ctx.dirs.source().join("js").join("script.js"))
            .write(ctx.dirs.build().join("js").join(Self::OUTPUT))
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Result<Outcome, StageError>> {
        Box::pin(async move {
            let task = self.name();
            let entry = ctx.dirs.source().join("js").join("script.js");

            let set = FileSet::read_one(&entry).await.stage(task, "src")?;
            let set = concat(set, Self::OUTPUT)
                .map_text(|_, js| AssetPipeline::minify_js(&js))
                .stage(task, "uglify")?;

            let written = set
                .write_to(&ctx.dirs.build().join("js"))
                .await
                .stage(task, "dest")?;
            Ok(Outcome::Written(written))
        })
    }
}

/// Minifies the font loader script next to its source, for inlining into
/// page heads.
#[derive(Debug, Default, Clone, Copy)]
pub struct MinifyLoaderScript;

impl LeafTask for MinifyLoaderScript {
    fn name(&self) -> TaskName {
        TaskName::FontLoaderMin
    }

    fn footprint(&self, ctx: &TaskContext) -> Footprint {
        let fonts = ctx.dirs.source().join("fonts");
        Footprint::default()
            .read(fonts.join("font_loading.js"))
            .write(fonts.join("font_loading.min.js"))
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Result<Outcome, StageError>> {
        Box::pin(async move {
            let task = self.name();
            let fonts = ctx.dirs.source().join("fonts");

            let set = FileSet::read_one(&fonts.join("font_loading.js"))
                .await
                .stage(task, "src")?
                .rename("font_loading.min.js")
                .map_text(|_, js| AssetPipeline::minify_js(&js))
                .stage(task, "uglify")?;

            let written = set.write_to(&fonts).await.stage(task, "dest")?;
            Ok(Outcome::Written(written))
        })
    }
}

/// Join every file into one, separated by newlines.
fn concat(set: FileSet, file_name: &str) -> FileSet {
    let Some(first) = set.files.first() else {
        return set;
    };

    let base = first.base.clone();
    let joined = set
        .files
        .iter()
        .map(SourceFile::text)
        .collect::<Vec<_>>()
        .join("\n");

    FileSet {
        files: vec![SourceFile {
            base,
            relative: file_name.into(),
            contents: joined.into_bytes(),
        }],
    }
}
