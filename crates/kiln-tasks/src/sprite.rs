//! SVG minification and sprite assembly.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::{Captures, Regex};

static PROLOG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<\?xml.*?\?>|<!DOCTYPE[^>]*>|<!--.*?-->").expect("valid regex")
});
static EDITOR_DATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)<metadata\b[^>]*/>|<metadata\b.*?</metadata>|<sodipodi:namedview\b[^>]*/>|<sodipodi:namedview\b.*?</sodipodi:namedview>",
    )
    .expect("valid regex")
});
static ROOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<svg\b([^>]*)>(.*)</svg>").expect("valid regex"));
static ROOT_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<svg\b([^>]*?)(/?)>").expect("valid regex"));
static VIEW_BOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bviewBox\s*=\s*["']([^"']*)["']"#).expect("valid regex"));
static STYLE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s+style\s*=\s*("[^"]*"|'[^']*')"#).expect("valid regex"));
static BETWEEN_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("valid regex"));
static ID_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s+id\s*=\s*(?:"([^"]+)"|'([^']+)')"#).expect("valid regex")
});
static URL_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*['"]?#([^'")\s]+)['"]?\s*\)"#).expect("valid regex")
});
static HREF_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r##"(href\s*=\s*)(?:"#([^"]+)"|'#([^']+)')"##).expect("valid regex")
});

/// Errors raised while processing SVG sources.
#[derive(Debug, thiserror::Error)]
pub enum SvgError {
    #[error("{0}: no <svg> root element")]
    MissingRoot(String),
}

/// A minified SVG ready to become a `<symbol>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinifiedSvg {
    /// Symbol id, taken from the file stem
    pub name: String,
    pub view_box: Option<String>,
    /// Markup inside the root element
    pub body: String,
}

/// Minify a single SVG document.
///
/// Drops the XML prolog, comments and editor metadata, collapses whitespace
/// between tags and keeps only the root `viewBox`. IDs are left as they are;
/// [`minify_all`] renames them across the whole sprite.
pub fn minify_svg(name: &str, text: &str) -> Result<MinifiedSvg, SvgError> {
    let text = PROLOG.replace_all(text, "");
    let text = EDITOR_DATA.replace_all(&text, "");

    let (attrs, inner) = match ROOT.captures(&text) {
        Some(caps) => (caps[1].to_string(), caps[2].to_string()),
        // A self-closing root is an empty drawing
        None => match ROOT_OPEN.captures(&text) {
            Some(caps) if &caps[2] == "/" => (caps[1].to_string(), String::new()),
            _ => return Err(SvgError::MissingRoot(name.to_string())),
        },
    };

    let view_box = VIEW_BOX
        .captures(&attrs)
        .map(|c| c[1].split_whitespace().collect::<Vec<_>>().join(" "));
    let body = BETWEEN_TAGS.replace_all(inner.trim(), "><").into_owned();

    Ok(MinifiedSvg {
        name: name.to_string(),
        view_box,
        body,
    })
}

/// Minify every source and give referenced IDs short names that are unique
/// across the set. Unreferenced IDs are removed.
///
/// Sources are processed in the order given, so the same input always yields
/// the same IDs.
pub fn minify_all(sources: &[(String, String)]) -> Result<Vec<MinifiedSvg>, SvgError> {
    let mut minified: Vec<MinifiedSvg> = sources
        .par_iter()
        .map(|(name, text)| minify_svg(name, text))
        .collect::<Result<_, _>>()?;

    let reserved: HashSet<String> = minified.iter().map(|s| s.name.clone()).collect();
    let mut ids = IdGenerator::new(reserved);

    for svg in &mut minified {
        svg.body = rename_ids(&svg.body, &mut ids);
    }

    Ok(minified)
}

/// Merge minified sources into one document, one `<symbol>` per source.
pub fn store(symbols: &[MinifiedSvg]) -> String {
    let uses_xlink = symbols.iter().any(|s| s.body.contains("xlink:"));

    let mut out = String::from(r#"<svg xmlns="http://www.w3.org/2000/svg""#);
    if uses_xlink {
        out.push_str(r#" xmlns:xlink="http://www.w3.org/1999/xlink""#);
    }
    out.push('>');

    for symbol in symbols {
        out.push_str(&format!(r#"<symbol id="{}""#, escape_attr(&symbol.name)));
        if let Some(view_box) = &symbol.view_box {
            out.push_str(&format!(r#" viewBox="{}""#, escape_attr(view_box)));
        }
        out.push('>');
        out.push_str(&symbol.body);
        out.push_str("</symbol>");
    }

    out.push_str("</svg>");
    out
}

/// Force the root element's style to `display:none`.
pub fn hide_root(svg: &str) -> String {
    ROOT_OPEN
        .replacen(svg, 1, |caps: &Captures| {
            let attrs = STYLE_ATTR.replace_all(&caps[1], "");
            format!(r#"<svg{} style="display:none"{}>"#, attrs, &caps[2])
        })
        .into_owned()
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// The value of whichever quoted alternative matched.
fn quoted<'t>(caps: &Captures<'t>, double: usize) -> &'t str {
    caps.get(double)
        .or_else(|| caps.get(double + 1))
        .map_or("", |m| m.as_str())
}

fn rename_ids(body: &str, ids: &mut IdGenerator) -> String {
    let referenced: HashSet<&str> = URL_REF
        .captures_iter(body)
        .map(|c| quoted(&c, 1))
        .chain(HREF_REF.captures_iter(body).map(|c| quoted(&c, 2)))
        .collect();

    let mut renamed: HashMap<String, String> = HashMap::new();
    for caps in ID_ATTR.captures_iter(body) {
        let old = quoted(&caps, 1);
        if referenced.contains(old) && !renamed.contains_key(old) {
            renamed.insert(old.to_string(), ids.next_id());
        }
    }

    let body = ID_ATTR.replace_all(body, |caps: &Captures| {
        match renamed.get(quoted(caps, 1)) {
            Some(new) => format!(r#" id="{}""#, new),
            None => String::new(),
        }
    });
    let body = URL_REF.replace_all(&body, |caps: &Captures| match renamed.get(&caps[1]) {
        Some(new) => format!("url(#{})", new),
        None => caps[0].to_string(),
    });
    let body = HREF_REF.replace_all(&body, |caps: &Captures| {
        match renamed.get(quoted(caps, 2)) {
            Some(new) => format!(r##"{}"#{}""##, &caps[1], new),
            None => caps[0].to_string(),
        }
    });

    body.into_owned()
}

/// Generates `a`, `b`, ..., `z`, `aa`, `ab`, ... skipping reserved names.
struct IdGenerator {
    next: usize,
    reserved: HashSet<String>,
}

impl IdGenerator {
    fn new(reserved: HashSet<String>) -> Self {
        Self { next: 0, reserved }
    }

    fn next_id(&mut self) -> String {
        loop {
            let id = short_name(self.next);
            self.next += 1;
            if !self.reserved.contains(&id) {
                return id;
            }
        }
    }
}

fn short_name(mut n: usize) -> String {
    let mut chars = Vec::new();
    loop {
        chars.push((b'a' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    chars.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ICON: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE svg PUBLIC "-//W3C//DTD SVG 1.1//EN" "http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd">
<!-- Generator: editor -->
<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0  24 24">
  <metadata><rdf:RDF></rdf:RDF></metadata>
  <defs>
    <linearGradient id="gradientLong"><stop offset="0"/></linearGradient>
  </defs>
  <path id="unused" fill="url(#gradientLong)" d="M0 0h24v24H0z"/>
</svg>
"##;

    #[test]
    fn strips_prolog_and_metadata() {
        let svg = minify_svg("icon", ICON).unwrap();

        assert_eq!(svg.view_box.as_deref(), Some("0 0 24 24"));
        assert!(!svg.body.contains("metadata"));
        assert!(!svg.body.contains("Generator"));
        assert!(!svg.body.contains('\n'));
        assert!(svg.body.starts_with("<defs>"));
    }

    #[test]
    fn rejects_documents_without_root() {
        let err = minify_svg("broken", "<g></g>").unwrap_err();
        assert_eq!(err.to_string(), "broken: no <svg> root element");
    }

    #[test]
    fn ids_are_short_unique_and_referenced_only() {
        let sources = vec![
            ("arrow".to_string(), ICON.to_string()),
            ("close".to_string(), ICON.to_string()),
        ];

        let minified = minify_all(&sources).unwrap();

        assert!(minified[0].body.contains(r#"id="a""#));
        assert!(minified[0].body.contains("url(#a)"));
        assert!(minified[1].body.contains(r#"id="b""#));
        assert!(minified[1].body.contains("url(#b)"));
        assert!(!minified[0].body.contains("unused"));
        assert!(!minified[0].body.contains("gradientLong"));
    }

    #[test]
    fn generated_ids_skip_symbol_names() {
        let sources = vec![("a".to_string(), ICON.to_string())];
        let minified = minify_all(&sources).unwrap();
        assert!(minified[0].body.contains(r#"id="b""#));
    }

    #[test]
    fn single_quoted_ids_stay_unique() {
        let icon = r#"<svg viewBox="0 0 8 8"><linearGradient id='g'><stop/></linearGradient><rect fill="url(#g)"/><use href='#g'/></svg>"#;
        let sources = vec![
            ("first".to_string(), icon.to_string()),
            ("second".to_string(), icon.to_string()),
        ];

        let sprite = store(&minify_all(&sources).unwrap());

        assert!(!sprite.contains("id='g'"));
        assert_eq!(sprite.matches(r#"id="a""#).count(), 1);
        assert_eq!(sprite.matches(r#"id="b""#).count(), 1);
        assert!(sprite.contains(r##"<rect fill="url(#a)"/><use href="#a"/>"##));
        assert!(sprite.contains(r##"<rect fill="url(#b)"/><use href="#b"/>"##));
    }

    #[test]
    fn self_closing_root_is_an_empty_symbol() {
        let svg = minify_svg("blank", r#"<svg viewBox="0 0 4 4"/>"#).unwrap();
        assert_eq!(svg.view_box.as_deref(), Some("0 0 4 4"));
        assert_eq!(svg.body, "");
    }

    #[test]
    fn symbol_ids_are_escaped() {
        let symbols = vec![MinifiedSvg {
            name: r#"a&"b"#.into(),
            view_box: None,
            body: String::new(),
        }];
        assert_eq!(
            store(&symbols),
            r#"<svg xmlns="http://www.w3.org/2000/svg"><symbol id="a&amp;&quot;b"></symbol></svg>"#
        );
    }

    #[test]
    fn rewrites_href_references() {
        let svg = r##"<svg><defs><path id="shape" d="M0 0"/></defs><use xlink:href="#shape"/></svg>"##;
        let minified = minify_all(&[("use".to_string(), svg.to_string())]).unwrap();

        assert_eq!(
            minified[0].body,
            r##"<defs><path id="a" d="M0 0"/></defs><use xlink:href="#a"/>"##
        );
    }

    #[test]
    fn stores_symbols_and_hides_root() {
        let symbols = vec![
            MinifiedSvg {
                name: "arrow".into(),
                view_box: Some("0 0 24 24".into()),
                body: "<path d=\"M0 0\"/>".into(),
            },
            MinifiedSvg {
                name: "dot".into(),
                view_box: None,
                body: "<circle r=\"1\"/>".into(),
            },
        ];

        let sprite = hide_root(&store(&symbols));

        assert_eq!(
            sprite,
            r#"<svg xmlns="http://www.w3.org/2000/svg" style="display:none"><symbol id="arrow" viewBox="0 0 24 24"><path d="M0 0"/></symbol><symbol id="dot"><circle r="1"/></symbol></svg>"#
        );
    }

    #[test]
    fn hide_root_replaces_existing_style() {
        let out = hide_root(r#"<svg style="fill:red" class="x"><g/></svg>"#);
        assert_eq!(out, r#"<svg class="x" style="display:none"><g/></svg>"#);
    }

    #[test]
    fn short_names_roll_over() {
        assert_eq!(short_name(0), "a");
        assert_eq!(short_name(25), "z");
        assert_eq!(short_name(26), "aa");
        assert_eq!(short_name(27), "ab");
        assert_eq!(short_name(26 + 26 * 26), "aaa");
    }
}
