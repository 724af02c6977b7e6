//! Git repository mirror.
//!
//! A mirrored store is a complete clone: the working copy plus its `.git`
//! directory travel through the store as entries, so a later update can
//! fetch and fast-forward instead of cloning again.
//!
//! Each clone or fetch attempt is bounded by the configured request timeout.
//! The transfer is aborted from its progress callback once the deadline
//! passes, and a transport that never reports progress is abandoned when the
//! deadline elapses.

pub mod error;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{FetchOptions, RemoteCallbacks, Repository};
use tempfile::TempDir;

use docsync_core::store::MANIFEST_FILE;
use docsync_core::{AppConfig, CacheStore, DocumentEntry, Manifest, Retriever, SourceConfig, SourceKind};

use crate::retry::{RetryPolicy, with_retry};

pub use error::GitError;

/// Directories libgit2 needs to open a repository. Empty ones do not survive
/// a round trip through the store.
const GIT_LAYOUT: [&str; 5] = [".git/objects/info", ".git/objects/pack", ".git/refs/heads", ".git/refs/tags", ".git/info"];

/// Retriever that mirrors a git repository.
pub struct GitMirror {
    remote: String,
    branch: Option<String>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl GitMirror {
    pub fn new(remote: impl Into<String>, branch: Option<String>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self { remote: remote.into(), branch, retry, timeout }
    }

    /// Build a mirror for a configured `git` source.
    pub fn from_config(config: &AppConfig, source: &SourceConfig) -> Self {
        Self::new(source.url.trim(), source.branch.clone(), RetryPolicy::from_config(config), config.timeout())
    }

    /// Run one network transfer on the blocking pool, bounded by the timeout.
    async fn transfer<T, F>(&self, operation: &'static str, f: F) -> Result<T, GitError>
    where
        F: FnOnce(Instant) -> Result<T, GitError> + Send + 'static,
        T: Send + 'static,
    {
        let deadline = Instant::now() + self.timeout;
        match tokio::time::timeout(self.timeout, blocking(move || f(deadline))).await {
            Ok(result) => result,
            Err(_) => Err(GitError::Timeout { operation, remote: self.remote.clone() }),
        }
    }

    async fn clone_remote(&self) -> Result<TempDir, GitError> {
        with_retry(self.retry, &self.remote, || {
            let remote = self.remote.clone();
            let branch = self.branch.clone();
            self.transfer("clone", move |deadline| {
                let dir = tempfile::tempdir().map_err(|e| GitError::io(std::env::temp_dir(), e))?;
                let mut builder = RepoBuilder::new();
                builder.fetch_options(fetch_options(deadline));
                if let Some(branch) = &branch {
                    builder.branch(branch);
                }
                builder
                    .clone(&remote, dir.path())
                    .map_err(|e| transfer_error("clone", &remote, deadline, e))?;
                tracing::debug!("cloned {} into {}", remote, dir.path().display());
                Ok(dir)
            })
        })
        .await
    }

    async fn update_copy(&self, store: &Path) -> Result<Vec<DocumentEntry>, GitError> {
        let (remote, branch, root) = (self.remote.clone(), self.branch.clone(), store.to_path_buf());
        let (work, branch) = blocking(move || prepare_copy(&root, &remote, branch)).await?;

        let path = work.path().to_path_buf();
        with_retry(self.retry, &self.remote, || {
            let (path, remote, branch) = (path.clone(), self.remote.clone(), branch.clone());
            self.transfer("fetch", move |deadline| fetch_branch(&path, &remote, &branch, deadline))
        })
        .await?;

        let remote = self.remote.clone();
        blocking(move || {
            if fast_forward(work.path(), &remote, &branch)? {
                tracing::info!("fast-forwarded {} from {}", branch, remote);
            } else {
                tracing::info!("{} is up to date with {}", branch, remote);
            }
            read_tree(work.path(), &remote)
        })
        .await
    }
}

#[async_trait]
impl Retriever for GitMirror {
    fn kind(&self) -> SourceKind {
        SourceKind::Git
    }

    fn remote(&self) -> &str {
        &self.remote
    }

    async fn fetch_all(&self) -> docsync_core::Result<Vec<DocumentEntry>> {
        let checkout = self.clone_remote().await?;
        let remote = self.remote.clone();
        Ok(blocking(move || read_tree(checkout.path(), &remote)).await?)
    }

    /// Fetch into a private copy of the store and fast-forward it.
    ///
    /// The store itself is only read; the synchronizer swaps the result in.
    async fn refresh(&self, store: &CacheStore, _previous: Option<&Manifest>) -> docsync_core::Result<Vec<DocumentEntry>> {
        self.update_copy(store.path())
            .await
            .map_err(|e| e.into_store_error(store.path(), &self.remote))
    }
}

/// Whether two remote URLs name the same repository.
///
/// Trailing slashes and a `.git` suffix are not significant.
pub fn same_remote(a: &str, b: &str) -> bool {
    fn normalize(url: &str) -> &str {
        let url = url.trim().trim_end_matches('/');
        url.strip_suffix(".git").unwrap_or(url).trim_end_matches('/')
    }
    normalize(a) == normalize(b)
}

async fn blocking<T, F>(f: F) -> Result<T, GitError>
where
    F: FnOnce() -> Result<T, GitError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| GitError::Task(e.to_string()))?
}

/// Copy the store into a temporary repository and check it tracks `remote`.
fn prepare_copy(store: &Path, remote: &str, branch: Option<String>) -> Result<(TempDir, String), GitError> {
    if !store.join(".git").is_dir() {
        return Err(GitError::NotARepository { path: store.to_path_buf() });
    }

    let work = tempfile::tempdir().map_err(|e| GitError::io(std::env::temp_dir(), e))?;
    copy_tree(store, work.path(), true)?;
    for dir in GIT_LAYOUT {
        let path = work.path().join(dir);
        fs::create_dir_all(&path).map_err(|e| GitError::io(path, e))?;
    }

    let repo = Repository::open(work.path()).map_err(|_| GitError::NotARepository { path: store.to_path_buf() })?;

    let origin = repo
        .find_remote("origin")
        .ok()
        .and_then(|r| r.url().map(String::from))
        .ok_or_else(|| GitError::RemoteMismatch { found: "a repository without an origin remote".to_string() })?;
    if !same_remote(&origin, remote) {
        return Err(GitError::RemoteMismatch { found: origin });
    }

    let branch = match branch {
        Some(branch) => branch,
        None => {
            let head = repo.head().map_err(|e| GitError::git("resolve HEAD", remote, e))?;
            head.shorthand().unwrap_or("main").to_string()
        }
    };

    Ok((work, branch))
}

/// Fetch options whose progress callback aborts the transfer after `deadline`.
fn fetch_options<'a>(deadline: Instant) -> FetchOptions<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.transfer_progress(move |_| Instant::now() < deadline);
    let mut options = FetchOptions::new();
    options.remote_callbacks(callbacks);
    options
}

fn transfer_error(operation: &'static str, remote: &str, deadline: Instant, source: git2::Error) -> GitError {
    if Instant::now() >= deadline {
        GitError::Timeout { operation, remote: remote.to_string() }
    } else {
        GitError::git(operation, remote, source)
    }
}

fn fetch_branch(path: &Path, remote: &str, branch: &str, deadline: Instant) -> Result<(), GitError> {
    let repo = Repository::open(path).map_err(|e| GitError::git("open", remote, e))?;
    let mut origin = repo.find_remote("origin").map_err(|e| GitError::git("find origin", remote, e))?;

    let refspec = format!("+refs/heads/{branch}:refs/remotes/origin/{branch}");
    origin
        .fetch(&[&refspec], Some(&mut fetch_options(deadline)), None)
        .map_err(|e| transfer_error("fetch", remote, deadline, e))?;
    Ok(())
}

/// Move `branch` to the fetched tip. Returns false when already up to date.
fn fast_forward(path: &Path, remote: &str, branch: &str) -> Result<bool, GitError> {
    let git = |operation: &'static str| move |e: git2::Error| GitError::git(operation, remote, e);

    let repo = Repository::open(path).map_err(git("open"))?;
    let fetched = repo
        .find_reference(&format!("refs/remotes/origin/{branch}"))
        .and_then(|r| r.peel_to_commit())
        .map_err(git("resolve fetched branch"))?;
    let annotated = repo.find_annotated_commit(fetched.id()).map_err(git("merge analysis"))?;
    let (analysis, _) = repo.merge_analysis(&[&annotated]).map_err(git("merge analysis"))?;

    if analysis.is_up_to_date() {
        return Ok(false);
    }
    if !analysis.is_fast_forward() {
        return Err(GitError::Diverged { branch: branch.to_string() });
    }

    let mut reference = repo
        .find_reference(&format!("refs/heads/{branch}"))
        .map_err(git("find branch"))?;
    reference
        .set_target(fetched.id(), &format!("fast-forward to {}", fetched.id()))
        .map_err(git("fast-forward"))?;
    repo.checkout_head(Some(CheckoutBuilder::default().force())).map_err(git("checkout"))?;
    Ok(true)
}

fn copy_tree(from: &Path, to: &Path, top: bool) -> Result<(), GitError> {
    fs::create_dir_all(to).map_err(|e| GitError::io(to, e))?;
    for item in fs::read_dir(from).map_err(|e| GitError::io(from, e))? {
        let item = item.map_err(|e| GitError::io(from, e))?;
        if top && item.file_name() == MANIFEST_FILE {
            continue;
        }
        let file_type = item.file_type().map_err(|e| GitError::io(item.path(), e))?;
        let target = to.join(item.file_name());
        if file_type.is_dir() {
            copy_tree(&item.path(), &target, false)?;
        } else if file_type.is_file() {
            fs::copy(item.path(), &target).map_err(|e| GitError::io(item.path(), e))?;
        }
    }
    Ok(())
}

/// Every regular file beneath `root`, `.git` included.
fn read_tree(root: &Path, remote: &str) -> Result<Vec<DocumentEntry>, GitError> {
    let mut files = Vec::new();
    collect_files(root, "", &mut files)?;
    files.sort();

    files
        .into_iter()
        .map(|(relative, path)| {
            let bytes = fs::read(&path).map_err(|e| GitError::io(&path, e))?;
            let source = format!("{remote}#{relative}");
            Ok(DocumentEntry::new(relative, bytes, source))
        })
        .collect()
}

fn collect_files(dir: &Path, prefix: &str, out: &mut Vec<(String, PathBuf)>) -> Result<(), GitError> {
    for item in fs::read_dir(dir).map_err(|e| GitError::io(dir, e))? {
        let item = item.map_err(|e| GitError::io(dir, e))?;
        let name = item.file_name().to_string_lossy().into_owned();
        let relative = if prefix.is_empty() { name } else { format!("{prefix}/{name}") };

        let file_type = item.file_type().map_err(|e| GitError::io(item.path(), e))?;
        if file_type.is_dir() {
            collect_files(&item.path(), &relative, out)?;
        } else if file_type.is_file() {
            out.push((relative, item.path()));
        }
    }
    Ok(())
}
