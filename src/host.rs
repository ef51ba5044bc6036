//! The host a run operates on: tool wrappers plus a filesystem root.

use hostkit::Toolbox;
use reconcile::BatchConfig;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Tools, filesystem root and executor limits shared by every phase.
///
/// Candidate identifiers for filesystem objects are absolute host paths
/// (`/opt/app`), so the protected set sees the same path it would on `/`.
/// [`Host::path`] maps them under the configured root.
#[derive(Debug, Clone)]
pub struct Host {
    tools: Toolbox,
    root: PathBuf,
    batch: BatchConfig,
    filesystem_roots: Vec<String>,
    keep: Vec<String>,
}

impl Host {
    /// A host rooted at `root` with default limits and no filesystem scope.
    pub fn new(tools: Toolbox, root: impl Into<PathBuf>) -> Self {
        Self {
            tools,
            root: root.into(),
            batch: BatchConfig::default(),
            filesystem_roots: Vec::new(),
            keep: Vec::new(),
        }
    }

    /// Override the executor limits.
    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    /// Set the application trees and the paths inside them to keep.
    pub fn with_filesystem(mut self, roots: Vec<String>, keep: Vec<String>) -> Self {
        self.filesystem_roots = roots;
        self.keep = keep;
        self
    }

    /// Tool wrappers.
    pub fn tools(&self) -> &Toolbox {
        &self.tools
    }

    /// Executor limits.
    pub fn batch(&self) -> &BatchConfig {
        &self.batch
    }

    /// Application trees for the filesystem phase.
    pub fn filesystem_roots(&self) -> &[String] {
        &self.filesystem_roots
    }

    /// Whether the operator asked to keep this path.
    pub fn is_kept(&self, host_path: &str) -> bool {
        let path = Path::new(host_path);
        self.keep.iter().any(|k| path.starts_with(k))
    }

    /// Where an absolute host path lives on this machine.
    pub fn path(&self, host_path: &str) -> PathBuf {
        self.root.join(host_path.trim_start_matches('/'))
    }

    /// Whether a host path exists (symlinks are not followed).
    pub fn exists(&self, host_path: &str) -> bool {
        self.path(host_path).symlink_metadata().is_ok()
    }

    /// Direct children of a host directory as host paths, sorted by name.
    ///
    /// A missing directory has no children.
    pub fn children(&self, host_dir: &str) -> hostkit::Result<Vec<String>> {
        let dir = self.path(host_dir);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut children = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            children.push(join_host(host_dir, &entry.file_name().to_string_lossy()));
        }
        Ok(children)
    }

    /// Every regular file below a host directory as host paths, sorted.
    pub fn files_below(&self, host_dir: &str) -> hostkit::Result<Vec<String>> {
        let dir = self.path(host_dir);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            files.push(format!("/{}", relative.to_string_lossy()));
        }
        Ok(files)
    }

    /// Remove a file, symlink or directory tree. A missing path is fine.
    pub fn remove(&self, host_path: &str) -> hostkit::Result<()> {
        let path = self.path(host_path);
        let meta = match path.symlink_metadata() {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let result = if meta.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match result {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other.map_err(Into::into),
        }
    }
}

fn join_host(dir: &str, name: &str) -> String {
    format!("{}/{name}", dir.trim_end_matches('/'))
}
