use crate::error::{StageError, StageResultExt};
use crate::fileset::{select, FileSet, SourceFile};
use crate::include::{expand_file, strip_dev_blocks};
use crate::name::TaskName;
use crate::tasks::{Footprint, LeafTask, Outcome, TaskContext};
use crate::BoxFuture;

const PAGES: &str = "*.html";

/// Assembles the top-level HTML pages from their partials.
///
/// Sends no live-reload signal of its own; watch reactions reload after it.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlAssemble;

impl LeafTask for HtmlAssemble {
    fn name(&self) -> TaskName {
        TaskName::Html
    }

    fn footprint(&self, ctx: &TaskContext) -> Footprint {
        // Partials may live anywhere under the source root.
        select(ctx.dirs.source(), PAGES)
            .unwrap_or_default()
            .into_iter()
            .fold(Footprint::default().read(ctx.dirs.source()), |fp, rel| {
                fp.write(ctx.dirs.build().join(rel))
            })
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Result<Outcome, StageError>> {
        Box::pin(async move {
            let task = self.name();
            let source = ctx.dirs.source();

            let pages = select(source, PAGES).stage(task, "src")?;

            let mut set = FileSet::default();
            for relative in pages {
                let html = expand_file(&source.join(&relative)).stage(task, "file-include")?;
                set.files.push(SourceFile {
                    base: source.to_path_buf(),
                    relative,
                    contents: strip_dev_blocks(&html).into_bytes(),
                });
            }

            let written = set.write_to(ctx.dirs.build()).await.stage(task, "dest")?;
            Ok(Outcome::Written(written))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::testing::Project;

    #[tokio::test]
    async fn assembles_pages_from_partials() {
        let project = Project::new();
        project.write(&project.src("_include/header.html"), "<header>Site</header>\n");
        project.write(&project.src("_include/footer.html"), "<footer>2024</footer>\n");
        project.write(
            &project.src("index.html"),
            "<body>\n  @@include('_include/header.html')\n  <!--DEV\n  <p>debug panel</p>\n  -->\n  @@include('_include/footer.html')\n</body>\n",
        );

        let outcome = HtmlAssemble.run(&project.ctx).await.unwrap();

        assert_eq!(outcome, Outcome::Written(vec![project.build("index.html")]));
        let html = std::fs::read_to_string(project.build("index.html")).unwrap();
        assert_eq!(
            html,
            "<body>\n  <header>Site</header>\n  <footer>2024</footer>\n</body>\n"
        );
        assert!(!html.contains("debug panel"));
    }

    #[tokio::test]
    async fn only_top_level_pages_are_built() {
        let project = Project::new();
        project.write(&project.src("index.html"), "<p>home</p>");
        project.write(&project.src("_include/partial.html"), "<p>part</p>");

        HtmlAssemble.run(&project.ctx).await.unwrap();

        assert!(project.build("index.html").exists());
        assert!(!project.build("_include/partial.html").exists());
    }

    #[tokio::test]
    async fn missing_partial_fails_in_file_include() {
        let project = Project::new();
        project.write(&project.src("index.html"), "@@include('_include/gone.html')");

        let err = HtmlAssemble.run(&project.ctx).await.unwrap_err();

        assert_eq!(err.stage, "file-include");
        assert!(!project.build("index.html").exists());
    }
}
