use crate::error::{StageError, StageResultExt};
use crate::fileset::FileSet;
use crate::guard::OptionalInput;
use crate::name::TaskName;
use crate::sprite::{hide_root, minify_all, store};
use crate::tasks::{Footprint, LeafTask, Outcome, TaskContext};
use crate::BoxFuture;

const SPRITE: &str = "sprite-svg.svg";

/// Merges `img/svg-sprite/*.svg` into a hidden symbol sprite at
/// `img/sprite-svg.svg` in the source tree, where pages include it inline.
#[derive(Debug, Default, Clone, Copy)]
pub struct SvgSprite;

impl LeafTask for SvgSprite {
    fn name(&self) -> TaskName {
        TaskName::Svgstore
    }

    fn footprint(&self, ctx: &TaskContext) -> Footprint {
        let img = ctx.dirs.source().join("img");
        Footprint::default()
            .read(img.join("svg-sprite"))
            .write(img.join(SPRITE))
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Result<Outcome, StageError>> {
        Box::pin(async move {
            let task = self.name();
            let img = ctx.dirs.source().join("img");

            let dir = match OptionalInput::resolve(img.join("svg-sprite")) {
                OptionalInput::Present(dir) => dir,
                OptionalInput::Absent(dir) => {
                    tracing::info!("{}: {} not found, skipping", task, dir.display());
                    return Ok(Outcome::Skipped(format!("{} not found", dir.display())));
                }
            };

            let set = FileSet::read(&dir, "*.svg").await.stage(task, "src")?;
            if set.is_empty() {
                tracing::info!("{}: no SVG files in {}, skipping", task, dir.display());
                return Ok(Outcome::Skipped(format!("no SVG files in {}", dir.display())));
            }

            let sources: Vec<(String, String)> = set
                .files
                .iter()
                .map(|f| {
                    let stem = f.relative.file_stem().unwrap_or_default();
                    (stem.to_string_lossy().into_owned(), f.text())
                })
                .collect();

            let symbols = tokio::task::spawn_blocking(move || minify_all(&sources))
                .await
                .stage(task, "svgmin")?
                .stage(task, "svgmin")?;
            tracing::debug!("{}: {} symbols", task, symbols.len());

            let sprite = hide_root(&store(&symbols));

            let out = img.join(SPRITE);
            tokio::fs::write(&out, sprite).await.stage(task, "dest")?;
            Ok(Outcome::Written(vec![out]))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::testing::Project;

    const ARROW: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- Generator: Sketch -->
<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24" style="fill:red">
  <path d="M4 12l8-8 8 8"/>
</svg>
"#;
    const CLOSE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 16 16"><path d="M2 2l12 12M14 2L2 14"/></svg>"#;

    #[tokio::test]
    async fn builds_one_symbol_per_file() {
        let project = Project::new();
        project.write(&project.src("img/svg-sprite/arrow.svg"), ARROW);
        project.write(&project.src("img/svg-sprite/close.svg"), CLOSE);

        let outcome = SvgSprite.run(&project.ctx).await.unwrap();

        let out = project.src("img/sprite-svg.svg");
        assert_eq!(outcome, Outcome::Written(vec![out.clone()]));

        let sprite = std::fs::read_to_string(out).unwrap();
        assert!(sprite.starts_with(r#"<svg xmlns="http://www.w3.org/2000/svg" style="display:none">"#));
        assert_eq!(sprite.matches("<symbol").count(), 2);
        assert!(sprite.contains(r#"<symbol id="arrow" viewBox="0 0 24 24">"#));
        assert!(sprite.contains(r#"<symbol id="close" viewBox="0 0 16 16">"#));
        assert!(!sprite.contains("Sketch"));
        assert!(!sprite.contains("fill:red"));
    }

    #[tokio::test]
    async fn rebuilding_is_stable() {
        let project = Project::new();
        project.write(&project.src("img/svg-sprite/arrow.svg"), ARROW);

        SvgSprite.run(&project.ctx).await.unwrap();
        let first = std::fs::read(project.src("img/sprite-svg.svg")).unwrap();
        SvgSprite.run(&project.ctx).await.unwrap();
        let second = std::fs::read(project.src("img/sprite-svg.svg")).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn missing_directory_skips() {
        let project = Project::new();

        let outcome = SvgSprite.run(&project.ctx).await.unwrap();

        assert!(matches!(outcome, Outcome::Skipped(_)));
        assert!(!project.src("img/sprite-svg.svg").exists());
    }

    #[tokio::test]
    async fn svg_without_root_fails_in_svgmin() {
        let project = Project::new();
        project.write(&project.src("img/svg-sprite/broken.svg"), "<g></g>");

        let err = SvgSprite.run(&project.ctx).await.unwrap_err();

        assert_eq!(err.stage, "svgmin");
        assert!(err.cause.contains("broken"));
    }
}
