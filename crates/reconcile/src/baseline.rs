//! Baseline manifest and its resolution from installer snapshot or static manifest.

use crate::error::{Error, Result};
use crate::release::Release;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Where a baseline was loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "path")]
pub enum BaselineSource {
    /// Authoritative per-install snapshot written at provisioning time
    Snapshot(PathBuf),
    /// Versioned manifest shipped for the release
    Manifest(PathBuf),
    /// Built in memory (tests, tooling)
    Inline,
}

/// Identifiers present at provisioning time.
///
/// Ordered by first appearance, deduplicated, case-sensitive. Immutable once
/// built.
#[derive(Debug, Clone, Serialize)]
pub struct BaselineManifest {
    source: BaselineSource,
    entries: Vec<String>,
    #[serde(skip)]
    index: HashSet<String>,
}

impl BaselineManifest {
    /// Parse manifest text: one identifier per line, `#` comments and blank
    /// lines ignored, only the first whitespace-delimited token kept.
    pub fn parse(content: &str, source: BaselineSource) -> Self {
        let tokens = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter_map(|l| l.split_whitespace().next());
        Self::build(tokens, source)
    }

    /// Build a manifest from identifiers.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::build(entries, BaselineSource::Inline)
    }

    fn build<I, S>(entries: I, source: BaselineSource) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = HashSet::new();
        let mut ordered = Vec::new();
        for entry in entries {
            let entry = entry.as_ref();
            if index.insert(entry.to_string()) {
                ordered.push(entry.to_string());
            }
        }
        Self {
            source,
            entries: ordered,
            index,
        }
    }

    /// Whether the identifier was present at provisioning.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Entries in first-seen order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Number of distinct entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Where the manifest came from.
    pub fn source(&self) -> &BaselineSource {
        &self.source
    }
}

/// Resolves the baseline for a release by source priority.
#[derive(Debug, Clone)]
pub struct BaselineResolver {
    /// Installer-time snapshot, preferred when present and readable
    pub snapshot: PathBuf,
    /// Directory holding `ubuntu-<version>.manifest` files
    pub manifest_dir: PathBuf,
}

impl BaselineResolver {
    /// Create a resolver for the given locations.
    pub fn new(snapshot: impl Into<PathBuf>, manifest_dir: impl Into<PathBuf>) -> Self {
        Self {
            snapshot: snapshot.into(),
            manifest_dir: manifest_dir.into(),
        }
    }

    /// Static manifest path for a release.
    pub fn manifest_path(&self, release: Release) -> PathBuf {
        self.manifest_dir.join(release.manifest_file())
    }

    /// Resolve the baseline: snapshot, else release manifest, else fail.
    pub fn resolve(&self, release: Release) -> Result<BaselineManifest> {
        if self.snapshot.is_file() {
            match fs::read_to_string(&self.snapshot) {
                Ok(content) => {
                    log::info!("Using installer snapshot {}", self.snapshot.display());
                    let source = BaselineSource::Snapshot(self.snapshot.clone());
                    return non_empty(BaselineManifest::parse(&content, source), &self.snapshot);
                }
                Err(e) => log::warn!(
                    "Installer snapshot {} unreadable ({e}), falling back to release manifest",
                    self.snapshot.display()
                ),
            }
        }

        let manifest = self.manifest_path(release);
        if !manifest.exists() {
            return Err(Error::BaselineUnavailable {
                snapshot: self.snapshot.clone(),
                manifest,
            });
        }

        let content = fs::read_to_string(&manifest).map_err(|source| Error::BaselineRead {
            path: manifest.clone(),
            source,
        })?;
        log::info!("Using release manifest {}", manifest.display());
        let parsed = BaselineManifest::parse(&content, BaselineSource::Manifest(manifest.clone()));
        non_empty(parsed, &manifest)
    }
}

fn non_empty(manifest: BaselineManifest, path: &Path) -> Result<BaselineManifest> {
    if manifest.is_empty() {
        return Err(Error::BaselineEmpty {
            path: path.to_path_buf(),
        });
    }
    Ok(manifest)
}
