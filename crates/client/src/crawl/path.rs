//! Mapping crawled URLs onto store-relative paths.

use docsync_core::store::validate_relative_path;
use url::Url;

use crate::fetch::FetchError;

/// Parse a configured crawl root.
///
/// Only `http` and `https` roots can be crawled. The result is normalized
/// with [`normalize_root`].
pub fn parse_root(input: &str) -> Result<Url, FetchError> {
    let input = input.trim();
    let invalid = |reason: String| FetchError::InvalidUrl { url: input.to_string(), reason };

    let url = Url::parse(input).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    Ok(normalize_root(url))
}

/// Ensure a crawl root names a directory, so `https://x/docs` covers `https://x/docs/*`.
pub fn normalize_root(mut root: Url) -> Url {
    root.set_fragment(None);
    root.set_query(None);
    if !root.path().ends_with('/') {
        let path = format!("{}/", root.path());
        root.set_path(&path);
    }
    root
}

/// Whether `url` lies beneath `root` on the same origin.
pub fn within(root: &Url, url: &Url) -> bool {
    url.scheme() == root.scheme()
        && url.host_str() == root.host_str()
        && url.port_or_known_default() == root.port_or_known_default()
        && (url.path().starts_with(root.path()) || format!("{}/", url.path()) == root.path())
}

/// Lowercased extension of the URL's last path segment, if it has one.
pub fn extension(url: &Url) -> Option<String> {
    let last = url.path().rsplit('/').next()?;
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Store-relative path for a URL beneath `root`.
///
/// Directory URLs map to `index.html` and extensionless HTML pages gain a
/// `.html` suffix so relative links between stored pages keep resolving.
/// Query strings are ignored. Returns `None` for URLs outside the root or
/// paths that cannot be stored safely.
pub fn page_path(root: &Url, url: &Url, is_html: bool) -> Option<String> {
    if !within(root, url) {
        return None;
    }

    let relative = url.path().get(root.path().len()..).unwrap_or("");

    let path = if relative.is_empty() || relative.ends_with('/') {
        format!("{relative}index.html")
    } else if is_html && extension(url).is_none() {
        format!("{relative}.html")
    } else {
        relative.to_string()
    };

    validate_relative_path(&path).ok()?;
    Some(path)
}

/// Link from the stored page `from` to the stored file `to`, relative to `from`'s directory.
///
/// `relative_link("config/index.html", "cli.html")` is `"../cli.html"`.
pub fn relative_link(from: &str, to: &str) -> String {
    let from_dir: Vec<&str> = match from.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let (to_dir, file): (Vec<&str>, &str) = match to.rsplit_once('/') {
        Some((dir, file)) => (dir.split('/').collect(), file),
        None => (Vec::new(), to),
    };

    let common = from_dir.iter().zip(&to_dir).take_while(|(a, b)| a == b).count();

    let mut parts = vec![".."; from_dir.len() - common];
    parts.extend_from_slice(&to_dir[common..]);
    parts.push(file);
    parts.join("/")
}
