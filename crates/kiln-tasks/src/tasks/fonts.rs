use crate::assets::AssetPipeline;
use crate::error::{StageError, StageResultExt};
use crate::fileset::{select, FileSet};
use crate::guard::OptionalInput;
use crate::inline::{inline_urls, InlineOptions, MAX_INLINE_SIZE};
use crate::name::TaskName;
use crate::tasks::{Footprint, LeafTask, Outcome, TaskContext};
use crate::BoxFuture;

/// Font container format handled by an [`InlineFonts`] task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFormat {
    Woff,
    Woff2,
}

impl FontFormat {
    fn extension(self) -> &'static str {
        match self {
            FontFormat::Woff => "woff",
            FontFormat::Woff2 => "woff2",
        }
    }

    /// Stylesheet under `fonts/` declaring the faces.
    fn stylesheet(self) -> &'static str {
        match self {
            FontFormat::Woff => "fonts_woff.css",
            FontFormat::Woff2 => "fonts_woff2.css",
        }
    }
}

/// Inlines font files into their `@font-face` stylesheet as base64 data URLs.
///
/// Skipped when the stylesheet does not exist.
#[derive(Debug, Clone, Copy)]
pub struct InlineFonts {
    format: FontFormat,
}

impl InlineFonts {
    pub fn new(format: FontFormat) -> Self {
        Self { format }
    }
}

impl LeafTask for InlineFonts {
    fn name(&self) -> TaskName {
        match self.format {
            FontFormat::Woff => TaskName::FontsWoff,
            FontFormat::Woff2 => TaskName::FontsWoff2,
        }
    }

    fn footprint(&self, ctx: &TaskContext) -> Footprint {
        let fonts = ctx.dirs.source().join("fonts");
        let pattern = format!("**/*.{}", self.format.extension());

        select(&fonts, &pattern)
            .unwrap_or_default()
            .into_iter()
            .fold(Footprint::default(), |fp, rel| fp.read(fonts.join(rel)))
            .read(fonts.join(self.format.stylesheet()))
            .write(ctx.dirs.build().join("css").join(self.format.stylesheet()))
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Result<Outcome, StageError>> {
        Box::pin(async move {
            let task = self.name();
            let fonts = ctx.dirs.source().join("fonts");

            let stylesheet = match OptionalInput::resolve(fonts.join(self.format.stylesheet())) {
                OptionalInput::Present(path) => path,
                OptionalInput::Absent(path) => {
                    tracing::info!("{}: {} not found, skipping", task, path.display());
                    return Ok(Outcome::Skipped(format!("{} not found", path.display())));
                }
            };

            let options = InlineOptions {
                extensions: vec![self.format.extension()],
                max_size: MAX_INLINE_SIZE,
            };

            let mut set = FileSet::read_one(&stylesheet).await.stage(task, "src")?;
            for file in &mut set.files {
                let inlined = inline_urls(&file.text(), &fonts, &options).await;
                for path in &inlined.skipped {
                    tracing::debug!("{}: left {} as a reference", task, path.display());
                }
                let mut css = inlined.css;
                if self.format == FontFormat::Woff2 {
                    css = css.replace("application/octet-stream;", "application/font-woff2;");
                }
                file.contents = css.into_bytes();
            }

            let set = set
                .map_text(|_, css| AssetPipeline::minify_css(&css))
                .stage(task, "cleancss")?;

            let written = set
                .write_to(&ctx.dirs.build().join("css"))
                .await
                .stage(task, "dest")?;
            Ok(Outcome::Written(written))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::testing::Project;

    const FACE: &str = "@font-face {\n  font-family: 'Body';\n  src: url('body.FORMAT') format('FORMAT');\n}\n";

    fn face(format: &str) -> String {
        FACE.replace("FORMAT", format)
    }

    #[tokio::test]
    async fn woff_fonts_are_embedded() {
        let project = Project::new();
        project.write(&project.src("fonts/body.woff"), b"wOFFdata");
        project.write(&project.src("fonts/fonts_woff.css"), face("woff"));

        let outcome = InlineFonts::new(FontFormat::Woff)
            .run(&project.ctx)
            .await
            .unwrap();

        let out = project.build("css/fonts_woff.css");
        assert_eq!(outcome, Outcome::Written(vec![out.clone()]));
        let css = std::fs::read_to_string(out).unwrap();
        assert!(css.contains("application/font-woff;base64,d09GRmRhdGE="));
        assert!(!css.contains('\n'));
    }

    #[tokio::test]
    async fn woff2_gets_its_own_mime_type() {
        let project = Project::new();
        project.write(&project.src("fonts/body.woff2"), b"wOF2");
        project.write(&project.src("fonts/fonts_woff2.css"), face("woff2"));

        InlineFonts::new(FontFormat::Woff2)
            .run(&project.ctx)
            .await
            .unwrap();

        let css = std::fs::read_to_string(project.build("css/fonts_woff2.css")).unwrap();
        assert!(css.contains("application/font-woff2;base64,"));
        assert!(!css.contains("octet-stream"));
    }

    #[tokio::test]
    async fn oversized_fonts_stay_referenced() {
        let project = Project::new();
        project.write(&project.src("fonts/body.woff"), vec![0u8; 2 * 1024 * 1024]);
        project.write(&project.src("fonts/fonts_woff.css"), face("woff"));

        InlineFonts::new(FontFormat::Woff)
            .run(&project.ctx)
            .await
            .unwrap();

        let css = std::fs::read_to_string(project.build("css/fonts_woff.css")).unwrap();
        assert!(css.contains("body.woff"));
        assert!(!css.contains("base64"));
    }

    #[tokio::test]
    async fn missing_stylesheet_skips() {
        let project = Project::new();

        let outcome = InlineFonts::new(FontFormat::Woff2)
            .run(&project.ctx)
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Skipped(ref why) if why.contains("fonts_woff2.css")));
        assert!(!project.build("css").exists());
    }
}
