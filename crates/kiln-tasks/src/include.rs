//! `@@include` expansion and development-block stripping for HTML.
//!
//! ```html
//! <body>
//!   @@include('_include/header.html', { "title": "Home" })
//! </body>
//! ```
//!
//! Paths resolve relative to the file containing the directive. Every line of
//! the included text after the first is indented like the directive line, and
//! `@@key` placeholders inside it are replaced with values from the optional
//! JSON context. Includes may nest.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

const DIRECTIVE: &str = "@@include(";

static DEV_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*<!--DEV[\s\S]+?-->").expect("valid regex"));

/// Errors raised while expanding includes.
#[derive(Debug, thiserror::Error)]
pub enum IncludeError {
    #[error("Failed to read {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("Malformed include in {path}: {message}")]
    Malformed { path: String, message: String },

    #[error("Include cycle through {0}")]
    Cycle(String),
}

/// Remove every `<!--DEV ... -->` block together with the line break and
/// indentation in front of it.
pub fn strip_dev_blocks(html: &str) -> String {
    DEV_BLOCK.replace_all(html, "").into_owned()
}

/// Read `path` and expand its includes.
pub fn expand_file(path: &Path) -> Result<String, IncludeError> {
    let text = fs::read_to_string(path).map_err(|e| IncludeError::ReadError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut stack = vec![canonical(path)];
    expand_text(&text, path, &Map::new(), &mut stack)
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn expand_text(
    text: &str,
    file: &Path,
    context: &Map<String, Value>,
    stack: &mut Vec<PathBuf>,
) -> Result<String, IncludeError> {
    let base_dir = file.parent().unwrap_or(Path::new(""));
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    while let Some(found) = text[cursor..].find(DIRECTIVE) {
        let start = cursor + found;
        let (args, end) = split_call(text, start + DIRECTIVE.len()).map_err(|message| {
            IncludeError::Malformed {
                path: file.display().to_string(),
                message,
            }
        })?;
        let (target, local) = parse_args(args).map_err(|message| IncludeError::Malformed {
            path: file.display().to_string(),
            message,
        })?;

        let target = base_dir.join(target);
        let key = canonical(&target);
        if stack.contains(&key) {
            return Err(IncludeError::Cycle(target.display().to_string()));
        }

        let raw = fs::read_to_string(&target).map_err(|e| IncludeError::ReadError {
            path: target.display().to_string(),
            message: e.to_string(),
        })?;

        let mut merged = context.clone();
        merged.extend(local);

        stack.push(key);
        let body = expand_text(&substitute(&raw, &merged), &target, &merged, stack)?;
        stack.pop();

        out.push_str(&text[cursor..start]);
        out.push_str(&indent_lines(trim_final_newline(&body), line_indent(text, start)));
        cursor = end;
    }

    out.push_str(&text[cursor..]);
    Ok(out)
}

/// Find the closing parenthesis of a call whose arguments start at `from`.
///
/// Returns the argument text and the index just past the `)`.
fn split_call(text: &str, from: usize) -> Result<(&str, usize), String> {
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, c) in text[from..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let end = from + offset;
                    return Ok((&text[from..end], end + 1));
                }
            }
            _ => {}
        }
    }

    Err("unterminated @@include(".to_string())
}

/// Parse `'path'` or `'path', { json }`.
fn parse_args(args: &str) -> Result<(String, Map<String, Value>), String> {
    let args = args.trim();
    let mut chars = args.chars();
    let quote = match chars.next() {
        Some(q @ ('\'' | '"')) => q,
        _ => return Err(format!("expected a quoted path, got `{}`", args)),
    };

    let close = args[1..]
        .find(quote)
        .ok_or_else(|| format!("unterminated path in `{}`", args))?;
    let path = args[1..1 + close].to_string();
    if path.is_empty() {
        return Err("empty include path".to_string());
    }

    let rest = args[close + 2..].trim();
    if rest.is_empty() {
        return Ok((path, Map::new()));
    }

    let json = rest
        .strip_prefix(',')
        .ok_or_else(|| format!("unexpected `{}` after path", rest))?
        .trim();

    let context: Map<String, Value> =
        serde_json::from_str(json).map_err(|e| format!("invalid context for {}: {}", path, e))?;

    Ok((path, context))
}

/// Replace `@@key` placeholders; longer keys go first so `@@title` does not
/// clobber `@@titleSuffix`.
fn substitute(text: &str, context: &Map<String, Value>) -> String {
    let mut keys: Vec<&String> = context.keys().collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut out = text.to_string();
    for key in keys {
        let value = match &context[key.as_str()] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out = out.replace(&format!("@@{}", key), &value);
    }
    out
}

/// Leading whitespace of the line containing byte `at`.
fn line_indent(text: &str, at: usize) -> &str {
    let line_start = text[..at].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let prefix = &text[line_start..at];
    let width = prefix
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(prefix.len());
    &prefix[..width]
}

fn indent_lines(text: &str, indent: &str) -> String {
    if indent.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
            if !line.trim().is_empty() {
                out.push_str(indent);
            }
        }
        out.push_str(line);
    }
    out
}

fn trim_final_newline(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn expands_includes_with_indentation() {
        let temp = tempdir().unwrap();
        write(
            &temp.path().join("_include/nav.html"),
            "<nav>\n  <a href=\"/\">Home</a>\n</nav>\n",
        );
        let page = temp.path().join("index.html");
        write(
            &page,
            "<body>\n    @@include('_include/nav.html')\n</body>\n",
        );

        let out = expand_file(&page).unwrap();

        assert_eq!(
            out,
            "<body>\n    <nav>\n      <a href=\"/\">Home</a>\n    </nav>\n</body>\n"
        );
    }

    #[test]
    fn substitutes_context_and_nests() {
        let temp = tempdir().unwrap();
        write(
            &temp.path().join("_include/head.html"),
            "<title>@@title</title>\n@@include('meta.html')",
        );
        write(
            &temp.path().join("_include/meta.html"),
            "<meta name=\"page\" content=\"@@title\">",
        );
        let page = temp.path().join("index.html");
        write(
            &page,
            "@@include(\"_include/head.html\", { \"title\": \"Home (main)\" })",
        );

        let out = expand_file(&page).unwrap();

        assert_eq!(
            out,
            "<title>Home (main)</title>\n<meta name=\"page\" content=\"Home (main)\">"
        );
    }

    #[test]
    fn longer_keys_win() {
        let mut ctx = Map::new();
        ctx.insert("a".into(), Value::String("1".into()));
        ctx.insert("ab".into(), Value::Number(2.into()));
        assert_eq!(substitute("@@ab @@a", &ctx), "2 1");
    }

    #[test]
    fn missing_partial_is_read_error() {
        let temp = tempdir().unwrap();
        let page = temp.path().join("index.html");
        write(&page, "@@include('_include/none.html')");

        let err = expand_file(&page).unwrap_err();
        assert!(matches!(err, IncludeError::ReadError { .. }));
        assert!(err.to_string().contains("none.html"));
    }

    #[test]
    fn detects_cycles() {
        let temp = tempdir().unwrap();
        write(&temp.path().join("a.html"), "@@include('b.html')");
        write(&temp.path().join("b.html"), "@@include('a.html')");

        let err = expand_file(&temp.path().join("a.html")).unwrap_err();
        assert!(matches!(err, IncludeError::Cycle(_)));
    }

    #[test]
    fn rejects_malformed_directives() {
        let temp = tempdir().unwrap();
        let page = temp.path().join("index.html");

        write(&page, "@@include('x.html'");
        assert!(matches!(
            expand_file(&page),
            Err(IncludeError::Malformed { .. })
        ));

        write(&page, "@@include(x.html)");
        assert!(matches!(
            expand_file(&page),
            Err(IncludeError::Malformed { .. })
        ));

        write(&page, "@@include('x.html', {not json})");
        assert!(matches!(
            expand_file(&page),
            Err(IncludeError::Malformed { .. })
        ));
    }

    #[test]
    fn strips_dev_blocks() {
        let html = "<head>\n  <link rel=\"stylesheet\" href=\"css/style.min.css\">\n  <!--DEV\n  <script src=\"debug.js\"></script>\n  -->\n</head>";

        let out = strip_dev_blocks(html);

        assert_eq!(
            out,
            "<head>\n  <link rel=\"stylesheet\" href=\"css/style.min.css\">\n</head>"
        );
        assert!(!out.contains("DEV"));
    }

    #[test]
    fn keeps_ordinary_comments() {
        let html = "<p>a</p>\n<!-- note -->";
        assert_eq!(strip_dev_blocks(html), html);
    }
}
