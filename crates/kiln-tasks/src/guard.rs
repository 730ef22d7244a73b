//! Existence checks for optional task inputs.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Whether `path` exists.
///
/// Only a "not found" error counts as absent. Any other failure (permission
/// denied, a file where a directory was expected, ...) reports `true` so the
/// caller goes on to the real operation and surfaces that error there.
pub fn exists(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(_) => true,
        Err(e) => e.kind() != ErrorKind::NotFound,
    }
}

/// An optional input resolved before a guarded task runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionalInput {
    Present(PathBuf),
    Absent(PathBuf),
}

impl OptionalInput {
    pub fn resolve(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if exists(&path) {
            OptionalInput::Present(path)
        } else {
            OptionalInput::Absent(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            OptionalInput::Present(p) | OptionalInput::Absent(p) => p,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn existing_file_and_dir() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("a.txt");
        fs::write(&file, "x").unwrap();

        assert!(exists(temp.path()));
        assert!(exists(&file));
    }

    #[test]
    fn missing_path_is_absent() {
        let temp = tempdir().unwrap();
        assert!(!exists(&temp.path().join("missing.css")));
    }

    #[test]
    fn non_not_found_errors_count_as_present() {
        // Traversing through a regular file fails with ENOTDIR, not ENOENT.
        let temp = tempdir().unwrap();
        let file = temp.path().join("plain");
        fs::write(&file, "x").unwrap();

        let weird = file.join("child");
        let err = fs::metadata(&weird).unwrap_err();
        if err.kind() != ErrorKind::NotFound {
            assert!(exists(&weird));
        }
    }

    #[test]
    fn resolves_optional_input() {
        let temp = tempdir().unwrap();
        let present = temp.path().join("fonts_woff.css");
        fs::write(&present, "").unwrap();

        assert_eq!(
            OptionalInput::resolve(&present),
            OptionalInput::Present(present.clone())
        );

        let absent = temp.path().join("fonts_woff2.css");
        let input = OptionalInput::resolve(&absent);
        assert_eq!(input, OptionalInput::Absent(absent.clone()));
        assert_eq!(input.path(), absent.as_path());
    }
}
