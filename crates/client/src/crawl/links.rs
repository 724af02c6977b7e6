//! Reference harvesting from HTML pages.

use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use url::Url;

/// Elements and attributes that point at other crawlable resources.
const REFERENCES: [(&str, &str); 4] =
    [("a[href]", "href"), ("link[href]", "href"), ("script[src]", "src"), ("img[src]", "src")];

static SELECTORS: LazyLock<Vec<(Selector, &'static str)>> = LazyLock::new(|| {
    REFERENCES
        .iter()
        .filter_map(|(css, attr)| Selector::parse(css).ok().map(|selector| (selector, *attr)))
        .collect()
});

/// Extract referenced URLs from an HTML document.
///
/// Relative references resolve against `base_url` (the page's final URL).
/// Fragments are dropped and duplicates removed.
pub fn extract_references(html: &str, base_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);

    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for (selector, attr) in SELECTORS.iter() {
        for element in document.select(selector) {
            let Some(raw) = element.value().attr(attr) else { continue };
            let raw = raw.trim();
            if raw.is_empty() || raw.starts_with('#') {
                continue;
            }

            let mut resolved = match base_url.join(raw) {
                Ok(u) => u,
                Err(_) => continue,
            };
            if !matches!(resolved.scheme(), "http" | "https") {
                continue;
            }
            resolved.set_fragment(None);

            if seen.insert(resolved.to_string()) {
                urls.push(resolved);
            }
        }
    }

    urls
}

/// Rewrite the references of an HTML document for reading from disk.
///
/// Each reference is resolved against `base_url` and passed to `local`
/// without its fragment. When `local` returns a replacement, the attribute
/// value is swapped for it, with the original fragment appended. Attribute
/// values written with character references are left as they are.
pub fn rewrite_references(html: &str, base_url: &Url, mut local: impl FnMut(&Url) -> Option<String>) -> String {
    let document = Html::parse_document(html);

    let mut replacements: HashMap<(&str, String), String> = HashMap::new();
    for (selector, attr) in SELECTORS.iter() {
        for element in document.select(selector) {
            let Some(raw) = element.value().attr(attr) else { continue };
            let key = (*attr, raw.to_string());
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || replacements.contains_key(&key) {
                continue;
            }
            let Ok(mut resolved) = base_url.join(trimmed) else { continue };
            if !matches!(resolved.scheme(), "http" | "https") {
                continue;
            }
            let fragment = resolved.fragment().map(str::to_string);
            resolved.set_fragment(None);

            let Some(mut target) = local(&resolved) else { continue };
            if let Some(fragment) = fragment {
                target = format!("{target}#{fragment}");
            }
            if target != raw {
                replacements.insert(key, target);
            }
        }
    }

    let mut out = html.to_string();
    for ((attr, raw), target) in &replacements {
        for quote in ['"', '\''] {
            if raw.contains(quote) || target.contains(quote) {
                continue;
            }
            out = out.replace(&format!("{attr}={quote}{raw}{quote}"), &format!("{attr}={quote}{target}{quote}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(html: &str, base: &str) -> Vec<String> {
        extract_references(html, &Url::parse(base).unwrap())
            .into_iter()
            .map(|u| u.to_string())
            .collect()
    }

    #[test]
    fn test_extract_anchor_relative() {
        let html = r#"<html><body><a href="config/">Config</a><a href="/docs/cli">CLI</a></body></html>"#;
        let found = refs(html, "https://example.com/docs/");
        assert_eq!(found, vec!["https://example.com/docs/config/", "https://example.com/docs/cli"]);
    }

    #[test]
    fn test_extract_assets() {
        let html = r#"
            <html>
                <head>
                    <link rel="stylesheet" href="/docs/style.css">
                    <script src="app.js"></script>
                </head>
                <body><img src="img/logo.svg"></body>
            </html>
        "#;
        let found = refs(html, "https://example.com/docs/");
        assert!(found.contains(&"https://example.com/docs/style.css".to_string()));
        assert!(found.contains(&"https://example.com/docs/app.js".to_string()));
        assert!(found.contains(&"https://example.com/docs/img/logo.svg".to_string()));
    }

    #[test]
    fn test_extract_drops_fragments_and_duplicates() {
        let html = r##"
            <a href="#top">Top</a>
            <a href="page#one">One</a>
            <a href="page#two">Two</a>
            <a href="page">Page</a>
        "##;
        let found = refs(html, "https://example.com/docs/");
        assert_eq!(found, vec!["https://example.com/docs/page"]);
    }

    #[test]
    fn test_extract_skips_non_http() {
        let html = r#"<a href="mailto:team@example.com">Mail</a><a href="javascript:void(0)">JS</a><a href="">Empty</a>"#;
        assert!(refs(html, "https://example.com/docs/").is_empty());
    }

    #[test]
    fn test_rewrite_maps_local_pages() {
        let html = r##"<a href="cli">CLI</a><a href="config/#keys">Keys</a><img src='/docs/logo.png'><a href="https://other.example/">Out</a>"##;
        let base = Url::parse("https://example.com/docs/").unwrap();

        let rewritten = rewrite_references(html, &base, |url| match url.path() {
            "/docs/cli" => Some("cli.html".into()),
            "/docs/config/" => Some("config/index.html".into()),
            "/docs/logo.png" => Some("logo.png".into()),
            _ => None,
        });

        assert_eq!(
            rewritten,
            r##"<a href="cli.html">CLI</a><a href="config/index.html#keys">Keys</a><img src='logo.png'><a href="https://other.example/">Out</a>"##
        );
    }

    #[test]
    fn test_rewrite_leaves_unmapped_document_alone() {
        let html = r##"<p>text</p><a href="#top">Top</a>"##;
        let base = Url::parse("https://example.com/docs/").unwrap();
        assert_eq!(rewrite_references(html, &base, |_| None), html);
    }

    #[test]
    fn test_extract_resolves_against_final_url() {
        let html = r#"<a href="next">Next</a>"#;
        let found = refs(html, "https://example.com/docs/guide/intro");
        assert_eq!(found, vec!["https://example.com/docs/guide/next"]);
    }
}
