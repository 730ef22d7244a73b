//! Inline font files into CSS as base64 `data:` URLs.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;

/// Assets above this size keep their original reference.
pub const MAX_INLINE_SIZE: u64 = 1024 * 1024;

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"url\(\s*(['"]?)([^'")]+)(['"]?)\s*\)"#).expect("valid regex"));

/// Options for a single inlining pass.
#[derive(Debug, Clone)]
pub struct InlineOptions {
    /// File extensions eligible for inlining, without the dot
    pub extensions: Vec<&'static str>,

    /// Largest file, in bytes, that is inlined
    pub max_size: u64,
}

/// Outcome of an inlining pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inlined {
    pub css: String,

    /// References replaced with `data:` URLs
    pub encoded: Vec<PathBuf>,

    /// Eligible references left alone (too large or unreadable)
    pub skipped: Vec<PathBuf>,
}

/// MIME type for an encoded font.
///
/// Only `woff` has a dedicated entry; everything else falls back to
/// `application/octet-stream`.
pub fn mime_for(extension: &str) -> &'static str {
    match extension {
        "woff" => "application/font-woff",
        _ => "application/octet-stream",
    }
}

/// Replace eligible `url(...)` references in `css` with base64 `data:` URLs.
///
/// References are resolved relative to `css_dir`. Remote and `data:` URLs are
/// never touched, and the original files are left in place.
pub async fn inline_urls(css: &str, css_dir: &Path, options: &InlineOptions) -> Inlined {
    let mut out = String::with_capacity(css.len());
    let mut encoded = Vec::new();
    let mut skipped = Vec::new();
    let mut last = 0;

    for caps in URL.captures_iter(css) {
        let (Some(whole), Some(url)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let Some((path, extension)) = eligible(url.as_str().trim(), css_dir, options) else {
            continue;
        };

        let size = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                tracing::warn!("Cannot inline {}: {}", path.display(), e);
                skipped.push(path);
                continue;
            }
        };

        if size > options.max_size {
            tracing::debug!(
                "Not inlining {} ({} bytes exceeds {} bytes)",
                path.display(),
                size,
                options.max_size
            );
            skipped.push(path);
            continue;
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Cannot inline {}: {}", path.display(), e);
                skipped.push(path);
                continue;
            }
        };

        out.push_str(&css[last..whole.start()]);
        out.push_str(&format!(
            "url(data:{};base64,{})",
            mime_for(&extension),
            STANDARD.encode(bytes)
        ));
        last = whole.end();
        encoded.push(path);
    }

    out.push_str(&css[last..]);

    Inlined {
        css: out,
        encoded,
        skipped,
    }
}

/// Resolve a reference to a local file with an eligible extension.
fn eligible(url: &str, css_dir: &Path, options: &InlineOptions) -> Option<(PathBuf, String)> {
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("data:")
        || lower.starts_with("http:")
        || lower.starts_with("https:")
        || lower.starts_with("//")
        || lower.starts_with('#')
    {
        return None;
    }

    // `font.eot?#iefix` and `font.svg#name` point at the same file
    let file = url.split(['?', '#']).next().unwrap_or(url);
    let path = css_dir.join(file);
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();

    options
        .extensions
        .contains(&extension.as_str())
        .then_some((path, extension))
}
