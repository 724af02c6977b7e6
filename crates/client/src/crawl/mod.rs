//! Breadth-first crawl of a documentation site into store entries.
//!
//! The crawl starts at the root URL (plus configured seed pages), follows
//! `a[href]`, `link[href]`, `script[src]` and `img[src]` references that stay
//! beneath the root, and keeps resources whose extension is accepted.
//! Extensionless URLs are fetched as page candidates and kept only when the
//! server answers with HTML.
//!
//! Any failed request fails the whole crawl. Once every page is in, the
//! references of stored HTML pages are rewritten so they can be read from
//! disk: links to stored files become relative paths, other links become
//! absolute URLs.

pub mod links;
pub mod path;

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use docsync_core::store::EntryMeta;
use docsync_core::{AppConfig, CacheStore, DocumentEntry, Manifest, Retriever, SourceConfig, SourceKind};

use crate::fetch::{FetchClient, FetchConfig, FetchError, FetchResponse, Fetched, Validators};
use crate::retry::{RetryPolicy, with_retry};

pub use links::{extract_references, rewrite_references};
pub use path::{extension, normalize_root, page_path, parse_root, relative_link, within};

/// Crawl bounds and filters.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Accepted file extensions, lowercase without the dot.
    pub extensions: Vec<String>,
    /// Pages fetched in addition to the root, relative to it.
    pub seeds: Vec<String>,
    pub max_pages: usize,
    pub retry: RetryPolicy,
}

impl CrawlOptions {
    pub fn from_config(config: &AppConfig, source: &SourceConfig) -> Self {
        Self {
            extensions: source.extensions.clone(),
            seeds: source.seeds.clone(),
            max_pages: config.max_pages,
            retry: RetryPolicy::from_config(config),
        }
    }
}

/// Retriever that mirrors a documentation site over HTTP.
pub struct PageCrawler {
    client: FetchClient,
    root: Url,
    remote: String,
    options: CrawlOptions,
}

/// A fetched resource, mapped to its place in the store.
struct Page {
    path: String,
    bytes: Bytes,
    html: bool,
    base: Url,
    validators: Validators,
    /// Content came from the store after a `304`, so its links are already local.
    reused: bool,
}

/// What the previous crawl stored, indexed by source URL.
struct Previous<'a> {
    store: &'a CacheStore,
    by_source: HashMap<&'a str, (&'a str, &'a EntryMeta)>,
    by_path: HashMap<&'a str, &'a str>,
}

impl<'a> Previous<'a> {
    fn new(store: &'a CacheStore, manifest: &'a Manifest) -> Self {
        let by_source = manifest
            .entries
            .iter()
            .map(|(path, meta)| (meta.source.as_str(), (path.as_str(), meta)))
            .collect();
        let by_path = manifest
            .entries
            .iter()
            .map(|(path, meta)| (path.as_str(), meta.source.as_str()))
            .collect();
        Self { store, by_source, by_path }
    }

    /// URL a local link in a stored page was crawled from, e.g. `cli.html` back to `cli`.
    fn origin_of(&self, root: &Url, url: Url) -> Url {
        page_path(root, &url, false)
            .and_then(|path| self.by_path.get(path.as_str()).copied())
            .and_then(|source| Url::parse(source).ok())
            .unwrap_or(url)
    }
}

impl PageCrawler {
    pub fn new(client: FetchClient, root: Url, mut options: CrawlOptions) -> Self {
        let root = normalize_root(root);
        options.extensions = options.extensions.iter().map(|ext| ext.trim_start_matches('.').to_ascii_lowercase()).collect();
        Self { client, remote: root.to_string(), root, options }
    }

    /// Build a crawler for a configured `pages` source.
    pub fn from_config(config: &AppConfig, source: &SourceConfig) -> Result<Self, FetchError> {
        let root = parse_root(&source.url)?;
        let client = FetchClient::new(FetchConfig::from_app(config))?;
        Ok(Self::new(client, root, CrawlOptions::from_config(config, source)))
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    fn accepts(&self, url: &Url) -> bool {
        match extension(url) {
            Some(ext) => self.options.extensions.contains(&ext),
            None => true,
        }
    }

    fn start_urls(&self) -> Vec<Url> {
        let mut urls = vec![self.root.clone()];
        for seed in &self.options.seeds {
            match self.root.join(seed) {
                Ok(url) if within(&self.root, &url) => urls.push(url),
                Ok(url) => tracing::warn!("seed {} is outside {}, ignoring", url, self.root),
                Err(e) => tracing::warn!("invalid seed {:?}: {}", seed, e),
            }
        }
        urls
    }

    async fn crawl(&self, previous: Option<&Previous<'_>>) -> Result<Vec<DocumentEntry>, FetchError> {
        let mut queue = VecDeque::new();
        let mut seen = HashSet::new();
        for url in self.start_urls() {
            if let Some(key) = page_path(&self.root, &url, true)
                && seen.insert(key)
            {
                queue.push_back(url);
            }
        }

        let mut pages = Vec::new();
        let mut fetched = 0;

        while let Some(url) = queue.pop_front() {
            if fetched >= self.options.max_pages {
                tracing::warn!("page limit {} reached, {} URLs left uncrawled", self.options.max_pages, queue.len() + 1);
                break;
            }

            if !self.client.allowed(&url).await {
                tracing::warn!("skipping {} (disallowed by robots.txt)", url);
                continue;
            }

            fetched += 1;
            let Some(page) = self.retrieve(&url, previous).await? else { continue };

            if page.html {
                let html = String::from_utf8_lossy(&page.bytes);
                for found in extract_references(&html, &page.base) {
                    let found = match previous {
                        Some(previous) if page.reused => previous.origin_of(&self.root, found),
                        _ => found,
                    };
                    if !within(&self.root, &found) || !self.accepts(&found) {
                        continue;
                    }
                    if let Some(key) = page_path(&self.root, &found, true)
                        && seen.insert(key)
                    {
                        queue.push_back(found);
                    }
                }
            }

            pages.push((url, page));
        }

        let stored: HashSet<String> = pages.iter().map(|(_, page)| page.path.clone()).collect();
        let entries: Vec<DocumentEntry> = pages
            .into_iter()
            .map(|(url, page)| {
                let bytes = if page.html { self.localize(&page, &stored) } else { page.bytes };
                let Validators { etag, last_modified } = page.validators;
                DocumentEntry::new(page.path, bytes, url.as_str()).with_validators(etag, last_modified)
            })
            .collect();

        tracing::info!("crawled {}: {} pages fetched, {} kept", self.root, fetched, entries.len());
        Ok(entries)
    }

    /// Point the references of an HTML page at the stored copies.
    fn localize(&self, page: &Page, stored: &HashSet<String>) -> Bytes {
        let html = String::from_utf8_lossy(&page.bytes);
        let rewritten = rewrite_references(&html, &page.base, |target| {
            match page_path(&self.root, target, true) {
                Some(path) if stored.contains(&path) => Some(relative_link(&page.path, &path)),
                _ => Some(target.to_string()),
            }
        });
        if rewritten == html { page.bytes.clone() } else { Bytes::from(rewritten) }
    }

    /// Fetch one URL, conditionally when the previous crawl stored it.
    async fn retrieve(&self, url: &Url, previous: Option<&Previous<'_>>) -> Result<Option<Page>, FetchError> {
        if let Some(previous) = previous
            && let Some((path, meta)) = previous.by_source.get(url.as_str())
        {
            let validators = Validators { etag: meta.etag.clone(), last_modified: meta.last_modified.clone() };
            if !validators.is_empty() {
                match self.get(url, Some(&validators)).await? {
                    Fetched::Modified(response) => return Ok(self.page(url, response)),
                    Fetched::NotModified => match previous.store.read_entry(path) {
                        Ok(bytes) => {
                            return Ok(Some(Page {
                                path: path.to_string(),
                                bytes: Bytes::from(bytes),
                                html: path.ends_with(".html"),
                                base: url.clone(),
                                validators,
                                reused: true,
                            }));
                        }
                        Err(e) => tracing::warn!("stored copy of {} unreadable ({}), refetching", url, e),
                    },
                }
            }
        }

        match self.get(url, None).await? {
            Fetched::Modified(response) => Ok(self.page(url, response)),
            Fetched::NotModified => Err(FetchError::Status { url: url.to_string(), status: 304 }),
        }
    }

    async fn get(&self, url: &Url, validators: Option<&Validators>) -> Result<Fetched, FetchError> {
        with_retry(self.options.retry, url.as_str(), || self.client.fetch(url, validators)).await
    }

    fn page(&self, url: &Url, response: FetchResponse) -> Option<Page> {
        let html = response.is_html();
        if !html && extension(url).is_none() {
            tracing::debug!("skipping {}: not an HTML page ({:?})", url, response.content_type);
            return None;
        }
        let Some(path) = page_path(&self.root, url, html) else {
            tracing::warn!("skipping {}: no safe store path", url);
            return None;
        };
        Some(Page {
            path,
            bytes: response.bytes,
            html,
            base: response.final_url,
            validators: response.validators,
            reused: false,
        })
    }
}

#[async_trait]
impl Retriever for PageCrawler {
    fn kind(&self) -> SourceKind {
        SourceKind::Pages
    }

    fn remote(&self) -> &str {
        &self.remote
    }

    async fn fetch_all(&self) -> docsync_core::Result<Vec<DocumentEntry>> {
        Ok(self.crawl(None).await?)
    }

    async fn refresh(&self, store: &CacheStore, previous: Option<&Manifest>) -> docsync_core::Result<Vec<DocumentEntry>> {
        let previous = previous.map(|manifest| Previous::new(store, manifest));
        Ok(self.crawl(previous.as_ref()).await?)
    }
}
