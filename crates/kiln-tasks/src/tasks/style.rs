use crate::assets::AssetPipeline;
use crate::error::{StageError, StageResultExt};
use crate::fileset::FileSet;
use crate::name::TaskName;
use crate::tasks::{Footprint, LeafTask, Outcome, TaskContext};
use crate::BoxFuture;

const OUTPUT: &str = "style.min.css";

/// Compiles `less/style.less` into `css/style.min.css`.
///
/// compile → prefix and pack media queries → rename → minify → write, then
/// the stylesheet is injected into connected browsers.
#[derive(Debug, Default, Clone, Copy)]
pub struct StyleCompile;

impl LeafTask for StyleCompile {
    fn name(&self) -> TaskName {
        TaskName::Less
    }

    fn footprint(&self, ctx: &TaskContext) -> Footprint {
        Footprint::default()
            .read(ctx.dirs.source().join("less"))
            .write(ctx.dirs.build().join("css").join(OUTPUT))
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Result<Outcome, StageError>> {
        Box::pin(async move {
            let task = self.name();
            let entry = ctx.dirs.source().join("less").join("style.less");

            let mut set = FileSet::read_one(&entry).await.stage(task, "src")?;
            for file in &mut set.files {
                let css = ctx
                    .compiler
                    .compile(&file.path(), &file.text())
                    .await
                    .stage(task, "less")?;
                file.contents = css.into_bytes();
            }

            let set = set
                .map_text(|_, css| ctx.pipeline.postprocess_css(&css))
                .stage(task, "postcss")?
                .rename(OUTPUT)
                .map_text(|_, css| AssetPipeline::minify_css(&css))
                .stage(task, "cleancss")?;

            let written = set
                .write_to(&ctx.dirs.build().join("css"))
                .await
                .stage(task, "dest")?;

            ctx.reload.inject(&ctx.url_paths(&written));
            Ok(Outcome::Written(written))
        })
    }
}
