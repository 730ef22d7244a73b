//! CSS and JavaScript post-processing.

use std::sync::LazyLock;

use lightningcss::rules::media::MediaRule;
use lightningcss::rules::CssRule;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use lightningcss::traits::ToCss;
use regex::Regex;

static MIN_WIDTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"min-width\s*:\s*(-?[\d.]+)|width\s*>=?\s*(-?[\d.]+)").expect("valid regex")
});

/// Asset pipeline utilities.
#[derive(Debug, Clone, Default)]
pub struct AssetPipeline {
    targets: Targets,
}

impl AssetPipeline {
    /// Pipeline prefixing for the given browserslist queries.
    pub fn for_browsers(queries: &[String]) -> Result<Self, String> {
        let browsers = Browsers::from_browserslist(queries.iter().map(String::as_str))
            .map_err(|e| e.to_string())?;

        Ok(Self {
            targets: browsers.map(Targets::from).unwrap_or_default(),
        })
    }

    /// Add vendor prefixes for the configured targets and pack media queries.
    ///
    /// Output is not minified; [`AssetPipeline::minify_css`] runs afterwards.
    pub fn postprocess_css(&self, css: &str) -> Result<String, String> {
        let mut stylesheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|e| format!("CSS parse error: {}", e))?;

        pack_media_queries(&mut stylesheet)?;

        stylesheet
            .minify(MinifyOptions {
                targets: self.targets,
                ..Default::default()
            })
            .map_err(|e| format!("CSS prefix error: {}", e))?;

        let printed = stylesheet
            .to_css(PrinterOptions {
                targets: self.targets,
                ..Default::default()
            })
            .map_err(|e| format!("CSS print error: {}", e))?;

        Ok(printed.code)
    }

    /// Minify CSS using lightningcss.
    pub fn minify_css(css: &str) -> Result<String, String> {
        let mut stylesheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|e| format!("CSS parse error: {}", e))?;

        stylesheet
            .minify(MinifyOptions::default())
            .map_err(|e| format!("CSS minify error: {}", e))?;

        let minified = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..Default::default()
            })
            .map_err(|e| format!("CSS minify error: {}", e))?;

        Ok(minified.code)
    }

    /// Minify a classic (non-module) script.
    pub fn minify_js(source: &str) -> Result<String, String> {
        use oxc_allocator::Allocator;
        use oxc_codegen::{Codegen, CodegenOptions};
        use oxc_parser::Parser;
        use oxc_span::SourceType;

        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, source, SourceType::cjs()).parse();

        if let Some(err) = parsed.errors.first() {
            return Err(format!("JS parse error: {}", err));
        }
        if parsed.panicked {
            return Err("JS parse error: parser gave up".to_string());
        }

        let printed = Codegen::new()
            .with_options(CodegenOptions::minify())
            .build(&parsed.program);

        Ok(printed.code)
    }
}

/// Merge `@media` blocks with identical queries and move them after all other
/// rules, ordered by ascending `min-width`. Queries without a `min-width`
/// keep their relative order and come first.
fn pack_media_queries<'i>(stylesheet: &mut StyleSheet<'i>) -> Result<(), String> {
    let rules = std::mem::take(&mut stylesheet.rules.0);

    let mut plain = Vec::with_capacity(rules.len());
    let mut media: Vec<(String, MediaRule<'i>)> = Vec::new();

    for rule in rules {
        match rule {
            CssRule::Media(rule) => {
                let query = rule
                    .query
                    .to_css_string(PrinterOptions::default())
                    .map_err(|e| format!("CSS media query error: {}", e))?;

                match media.iter_mut().find(|(q, _)| *q == query) {
                    Some((_, existing)) => existing.rules.0.extend(rule.rules.0),
                    None => media.push((query, rule)),
                }
            }
            other => plain.push(other),
        }
    }

    media.sort_by(|(a, _), (b, _)| {
        min_width(a)
            .partial_cmp(&min_width(b))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    plain.extend(media.into_iter().map(|(_, rule)| CssRule::Media(rule)));
    stylesheet.rules.0 = plain;

    Ok(())
}

/// The first `min-width` value in a printed media query.
fn min_width(query: &str) -> Option<f64> {
    let caps = MIN_WIDTH.captures(query)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}
