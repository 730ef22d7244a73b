//! Configuration loading and the source/build path resolver.
//!
//! The configuration record is read once at startup. It can live in a
//! `kiln.toml`:
//!
//! ```toml
//! [directories]
//! source = "src"
//! build = "build"
//!
//! [server]
//! port = 3000
//! ```
//!
//! or in the `config.directories` object of a `package.json`. A record without
//! both directories is a startup error.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("Failed to parse {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("Missing directory key '{0}' in configuration")]
    MissingDirectory(&'static str),

    #[error("Directory '{key}' must be a non-empty relative path, got '{value}'")]
    InvalidDirectory { key: &'static str, value: String },

    #[error("Source '{source_dir}' and build '{build_dir}' must be separate directories")]
    OverlappingDirectories {
        source_dir: String,
        build_dir: String,
    },

    #[error("Invalid browser targets {query:?}: {message}")]
    InvalidBrowsers { query: Vec<String>, message: String },
}

/// The two roots every task works against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directories {
    source: PathBuf,
    build: PathBuf,
}

impl Directories {
    /// Validate and build the directory pair.
    pub fn new(
        source: impl Into<PathBuf>,
        build: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let source = source.into();
        let build = build.into();

        check_relative("source", &source)?;
        check_relative("build", &build)?;

        // `clean` empties the build root, so it must never cover the source
        let (a, b) = (normalize(&source), normalize(&build));
        if a.starts_with(&b) || b.starts_with(&a) {
            return Err(ConfigError::OverlappingDirectories {
                source_dir: source.display().to_string(),
                build_dir: build.display().to_string(),
            });
        }

        Ok(Self { source, build })
    }

    /// Rebase both roots under `root`.
    ///
    /// Used when the configuration file does not sit in the working directory.
    pub fn rooted_at(&self, root: &Path) -> Self {
        Self {
            source: root.join(&self.source),
            build: root.join(&self.build),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn build(&self) -> &Path {
        &self.build
    }
}

fn check_relative(key: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() || path.is_absolute() {
        return Err(ConfigError::InvalidDirectory {
            key,
            value: path.display().to_string(),
        });
    }
    Ok(())
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

/// Dev server settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Page opened in the browser when the server starts
    #[serde(default = "default_start_path")]
    pub start_path: String,

    #[serde(default = "default_open")]
    pub open: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            start_path: default_start_path(),
            open: default_open(),
        }
    }
}

/// External tool settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ToolSettings {
    /// LESS compiler executable
    #[serde(default = "default_lessc")]
    pub lessc: String,

    /// Browserslist queries used for vendor prefixing
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            lessc: default_lessc(),
            browsers: default_browsers(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_start_path() -> String {
    "index.html".to_string()
}
fn default_open() -> bool {
    true
}
fn default_lessc() -> String {
    "lessc".to_string()
}
fn default_browsers() -> Vec<String> {
    vec!["last 2 versions".to_string()]
}

/// The full configuration record.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub directories: Directories,
    pub server: ServerSettings,
    pub tools: ToolSettings,
}

#[derive(Debug, Deserialize, Default)]
struct RawDirectories {
    source: Option<String>,
    build: Option<String>,
}

/// `kiln.toml` layout.
#[derive(Debug, Deserialize)]
struct TomlFile {
    directories: Option<RawDirectories>,
    #[serde(default)]
    server: ServerSettings,
    #[serde(default)]
    tools: ToolSettings,
}

/// The slice of `package.json` we care about.
#[derive(Debug, Deserialize)]
struct PackageJson {
    config: Option<PackageConfig>,
}

#[derive(Debug, Deserialize)]
struct PackageConfig {
    directories: Option<RawDirectories>,
    #[serde(default)]
    server: ServerSettings,
    #[serde(default)]
    tools: ToolSettings,
}

impl Config {
    /// Load configuration from a `kiln.toml` or `package.json` file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let config = if is_json {
            Self::from_package_json(&content)
        } else {
            Self::from_toml(&content)
        }
        .map_err(|e| match e {
            ConfigError::ParseError { message, .. } => ConfigError::ParseError {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })?;

        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse a `kiln.toml` document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let file: TomlFile = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: "kiln.toml".to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            directories: resolve(file.directories)?,
            server: file.server,
            tools: file.tools,
        })
    }

    /// Parse a `package.json` document carrying `config.directories`.
    pub fn from_package_json(content: &str) -> Result<Self, ConfigError> {
        let file: PackageJson =
            serde_json::from_str(content).map_err(|e| ConfigError::ParseError {
                path: "package.json".to_string(),
                message: e.to_string(),
            })?;

        let Some(config) = file.config else {
            return Err(ConfigError::MissingDirectory("source"));
        };

        Ok(Self {
            directories: resolve(config.directories)?,
            server: config.server,
            tools: config.tools,
        })
    }
}

/// The path resolver: both keys must be present.
fn resolve(raw: Option<RawDirectories>) -> Result<Directories, ConfigError> {
    let raw = raw.unwrap_or_default();
    let source = raw.source.ok_or(ConfigError::MissingDirectory("source"))?;
    let build = raw.build.ok_or(ConfigError::MissingDirectory("build"))?;
    Directories::new(source, build)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_toml_with_defaults() {
        let config = Config::from_toml(
            r#"
[directories]
source = "src"
build = "build"
"#,
        )
        .unwrap();

        assert_eq!(config.directories.source(), Path::new("src"));
        assert_eq!(config.directories.build(), Path::new("build"));
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.start_path, "index.html");
        assert!(config.server.open);
        assert_eq!(config.tools.lessc, "lessc");
        assert_eq!(config.tools.browsers, vec!["last 2 versions"]);
    }

    #[test]
    fn parses_package_json() {
        let config = Config::from_package_json(
            r#"{
  "name": "site",
  "config": { "directories": { "source": "src", "build": "build" } }
}"#,
        )
        .unwrap();

        assert_eq!(config.directories.source(), Path::new("src"));
        assert_eq!(config.server, ServerSettings::default());
    }

    #[test]
    fn rejects_missing_build_key() {
        let err = Config::from_toml("[directories]\nsource = \"src\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingDirectory("build")));
    }

    #[test]
    fn rejects_missing_directories_table() {
        let err = Config::from_toml("[server]\nport = 8080\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingDirectory("source")));

        let err = Config::from_package_json(r#"{"name": "site"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDirectory("source")));
    }

    #[test]
    fn rejects_bad_directories() {
        assert!(matches!(
            Directories::new("", "build"),
            Err(ConfigError::InvalidDirectory { key: "source", .. })
        ));
        assert!(matches!(
            Directories::new("src", "/tmp/build"),
            Err(ConfigError::InvalidDirectory { key: "build", .. })
        ));
        assert!(matches!(
            Directories::new("site", "site"),
            Err(ConfigError::OverlappingDirectories { .. })
        ));
    }

    #[test]
    fn rejects_directories_that_resolve_to_the_same_place() {
        for (source, build) in [
            ("src", "./src"),
            ("src", "src/"),
            ("src", "out/../src"),
            ("src", "."),
            ("src", "src/build"),
            ("site/src", "site"),
        ] {
            assert!(
                matches!(
                    Directories::new(source, build),
                    Err(ConfigError::OverlappingDirectories { .. })
                ),
                "{source} / {build} should be rejected"
            );
        }
    }

    #[test]
    fn accepts_sibling_directories() {
        assert!(Directories::new("src", "srcbuild").is_ok());
        assert!(Directories::new("./src", "../build").is_ok());
        assert!(Directories::new("site/src", "site/build").is_ok());
    }

    #[test]
    fn load_reports_file_path_on_parse_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("kiln.toml");
        fs::write(&path, "[directories\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        match err {
            ConfigError::ParseError { path: p, .. } => assert!(p.ends_with("kiln.toml")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let temp = tempdir().unwrap();
        let err = Config::load(&temp.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn rooted_at_joins_both_paths() {
        let dirs = Directories::new("src", "build").unwrap();
        let rooted = dirs.rooted_at(Path::new("/project"));
        assert_eq!(rooted.source(), Path::new("/project/src"));
        assert_eq!(rooted.build(), Path::new("/project/build"));
    }
}
