//! Artifact cache: decides whether a target's output is already up to date.
//!
//! The cache never looks inside outputs. It asks an [`ArtifactStore`] whether
//! the output exists (and, under [`FreshnessPolicy::Modified`], how old it is
//! relative to the source). Deleting an output is the way to force a rebuild.

use crate::{Error, Result, Target};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::debug;

/// Read-only view of the filesystem the cache consults.
pub trait ArtifactStore: Send + Sync {
    /// Whether `path` exists. A missing path is `Ok(false)`, not an error.
    fn exists(&self, path: &Path) -> io::Result<bool>;

    /// Modification time of `path`, or `None` if it does not exist.
    fn modified(&self, path: &Path) -> io::Result<Option<SystemTime>>;
}

/// [`ArtifactStore`] over the real filesystem, rooted at a working directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store resolving relative paths against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory relative paths are resolved against.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStore for FsStore {
    fn exists(&self, path: &Path) -> io::Result<bool> {
        self.root.join(path).try_exists()
    }

    fn modified(&self, path: &Path) -> io::Result<Option<SystemTime>> {
        match std::fs::metadata(self.root.join(path)) {
            Ok(meta) => meta.modified().map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// In-memory [`ArtifactStore`] for exercising the cache without real I/O.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<PathBuf, SystemTime>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` as present with the given modification time.
    pub fn insert(&self, path: impl Into<PathBuf>, modified: SystemTime) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.into(), modified);
        }
    }

    /// Record `path` as present, modified now.
    pub fn touch(&self, path: impl Into<PathBuf>) {
        self.insert(path, SystemTime::now());
    }

    /// Forget `path`.
    pub fn remove(&self, path: &Path) {
        if let Ok(mut files) = self.files.lock() {
            files.remove(path);
        }
    }

    /// Number of recorded paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.lock().map_or(0, |files| files.len())
    }

    /// Whether no paths are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, path: &Path) -> io::Result<Option<SystemTime>> {
        self.files
            .lock()
            .map(|files| files.get(path).copied())
            .map_err(|_| io::Error::other("memory store lock poisoned"))
    }
}

impl ArtifactStore for MemoryStore {
    fn exists(&self, path: &Path) -> io::Result<bool> {
        self.lookup(path).map(|entry| entry.is_some())
    }

    fn modified(&self, path: &Path) -> io::Result<Option<SystemTime>> {
        self.lookup(path)
    }
}

/// How the cache decides an output is up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FreshnessPolicy {
    /// An existing output is fresh, whatever its age
    #[default]
    Exists,
    /// An output is fresh if it exists and is not older than its source
    Modified,
}

impl std::str::FromStr for FreshnessPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exists" => Ok(Self::Exists),
            "modified" | "mtime" => Ok(Self::Modified),
            _ => Err(format!(
                "Unknown freshness policy: {s} (expected 'exists' or 'modified')"
            )),
        }
    }
}

impl std::fmt::Display for FreshnessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exists => write!(f, "exists"),
            Self::Modified => write!(f, "modified"),
        }
    }
}

/// Freshness oracle for targets.
#[derive(Clone)]
pub struct ArtifactCache {
    store: Arc<dyn ArtifactStore>,
    policy: FreshnessPolicy,
}

impl std::fmt::Debug for ArtifactCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactCache")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ArtifactCache {
    /// Create a cache over `store` using `policy`.
    pub fn new(store: Arc<dyn ArtifactStore>, policy: FreshnessPolicy) -> Self {
        Self { store, policy }
    }

    /// Cache over the real filesystem rooted at `root`.
    pub fn on_disk(root: impl Into<PathBuf>, policy: FreshnessPolicy) -> Self {
        Self::new(Arc::new(FsStore::new(root)), policy)
    }

    /// The active freshness policy.
    #[must_use]
    pub fn policy(&self) -> FreshnessPolicy {
        self.policy
    }

    /// Whether `target`'s output is up to date.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheCheck`] if the store cannot be queried.
    pub fn is_fresh(&self, target: &Target) -> Result<bool> {
        let output = target.output_path();
        let fresh = match self.policy {
            FreshnessPolicy::Exists => self
                .store
                .exists(output)
                .map_err(|e| Error::cache_check(output, e))?,
            FreshnessPolicy::Modified => {
                let Some(output_time) = self
                    .store
                    .modified(output)
                    .map_err(|e| Error::cache_check(output, e))?
                else {
                    return Ok(false);
                };
                match self
                    .store
                    .modified(target.source_path())
                    .map_err(|e| Error::cache_check(target.source_path(), e))?
                {
                    Some(source_time) => output_time >= source_time,
                    None => true,
                }
            }
        };

        debug!(
            task = %target.name(),
            output = %output.display(),
            policy = %self.policy,
            fresh,
            "Checked output freshness"
        );
        Ok(fresh)
    }
}
