//! File selection and the in-memory file sets that flow between stages.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use walkdir::WalkDir;

/// Compile a glob where `*` never crosses a path separator.
pub fn matcher(pattern: &str) -> Result<GlobMatcher, globset::Error> {
    Ok(GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()?
        .compile_matcher())
}

/// Forward-slash form of a relative path, for glob matching and URLs.
pub fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// List the files under `base` whose relative path matches `pattern`.
///
/// A missing `base` yields an empty list, the same as a glob with no hits.
/// Results are sorted so downstream output is deterministic.
pub fn select(base: &Path, pattern: &str) -> Result<Vec<PathBuf>, globset::Error> {
    let matcher = matcher(pattern)?;
    let mut found = Vec::new();

    if !base.is_dir() {
        return Ok(found);
    }

    for entry in WalkDir::new(base)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(base).unwrap_or(entry.path());
        if matcher.is_match(slash_path(relative)) {
            found.push(relative.to_path_buf());
        }
    }

    found.sort();
    Ok(found)
}

/// A file travelling through a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Directory the selector was rooted at
    pub base: PathBuf,

    /// Path below `base`; mirrored under the destination
    pub relative: PathBuf,

    pub contents: Vec<u8>,
}

impl SourceFile {
    /// Full path of the original file.
    pub fn path(&self) -> PathBuf {
        self.base.join(&self.relative)
    }

    /// Contents as text; invalid UTF-8 is replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents).into_owned()
    }

    pub fn with_text(mut self, text: String) -> Self {
        self.contents = text.into_bytes();
        self
    }

    /// Replace the file name, keeping the directory part of `relative`.
    pub fn rename(mut self, file_name: &str) -> Self {
        self.relative.set_file_name(file_name);
        self
    }
}

/// An ordered set of files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    pub files: Vec<SourceFile>,
}

impl FileSet {
    /// Read every file under `base` matching `pattern`.
    pub async fn read(base: &Path, pattern: &str) -> std::io::Result<Self> {
        let relatives = select(base, pattern).map_err(std::io::Error::other)?;
        let mut files = Vec::with_capacity(relatives.len());

        for relative in relatives {
            let contents = tokio::fs::read(base.join(&relative)).await?;
            files.push(SourceFile {
                base: base.to_path_buf(),
                relative,
                contents,
            });
        }

        Ok(Self { files })
    }

    /// Read exactly one named file; a missing file is an error.
    pub async fn read_one(path: &Path) -> std::io::Result<Self> {
        let contents = tokio::fs::read(path).await.map_err(|e| {
            std::io::Error::new(e.kind(), format!("File not found: {}", path.display()))
        })?;

        let base = path.parent().unwrap_or(Path::new("")).to_path_buf();
        let relative = PathBuf::from(path.file_name().unwrap_or_default());

        Ok(Self {
            files: vec![SourceFile {
                base,
                relative,
                contents,
            }],
        })
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Run a text stage over every file.
    pub fn map_text<E>(
        self,
        mut stage: impl FnMut(&SourceFile, String) -> Result<String, E>,
    ) -> Result<Self, E> {
        let mut files = Vec::with_capacity(self.files.len());
        for file in self.files {
            let text = stage(&file, file.text())?;
            files.push(file.with_text(text));
        }
        Ok(Self { files })
    }

    /// Rename every file to `file_name`.
    pub fn rename(self, file_name: &str) -> Self {
        Self {
            files: self.files.into_iter().map(|f| f.rename(file_name)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Destination paths these files would be written to.
    pub fn destinations(&self, dest: &Path) -> Vec<PathBuf> {
        self.files.iter().map(|f| dest.join(&f.relative)).collect()
    }

    /// Write every file under `dest`, creating directories as needed.
    pub async fn write_to(&self, dest: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.files.len());

        for file in &self.files {
            let out = dest.join(&file.relative);
            if let Some(parent) = out.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&out, &file.contents).await?;
            written.push(out);
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, path.file_name().unwrap().to_string_lossy().as_bytes()).unwrap();
    }

    #[test]
    fn star_does_not_cross_directories() {
        let temp = tempdir().unwrap();
        touch(&temp.path().join("a.css"));
        touch(&temp.path().join("nested/b.css"));

        let found = select(temp.path(), "*.css").unwrap();
        assert_eq!(found, vec![PathBuf::from("a.css")]);
    }

    #[test]
    fn double_star_is_recursive_with_brace_sets() {
        let temp = tempdir().unwrap();
        touch(&temp.path().join("a.woff"));
        touch(&temp.path().join("sub/b.woff2"));
        touch(&temp.path().join("sub/c.js"));

        let found = select(temp.path(), "**/*.{woff,woff2}").unwrap();
        assert_eq!(
            found,
            vec![PathBuf::from("a.woff"), PathBuf::from("sub/b.woff2")]
        );
    }

    #[test]
    fn missing_base_is_empty() {
        let temp = tempdir().unwrap();
        let found = select(&temp.path().join("nope"), "*.png").unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn reads_renames_and_writes() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        touch(&src.join("js/script.js"));

        let set = FileSet::read_one(&src.join("js/script.js")).await.unwrap();
        let renamed = set
            .map_text(|_, text| Ok::<_, std::convert::Infallible>(text.to_uppercase()))
            .unwrap()
            .rename("script.min.js");

        let dest = temp.path().join("build/js");
        let written = renamed.write_to(&dest).await.unwrap();

        assert_eq!(written, vec![dest.join("script.min.js")]);
        assert_eq!(fs::read_to_string(&written[0]).unwrap(), "SCRIPT.JS");
    }

    #[tokio::test]
    async fn read_one_missing_is_error() {
        let temp = tempdir().unwrap();
        let err = FileSet::read_one(&temp.path().join("style.less"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("style.less"));
    }
}
