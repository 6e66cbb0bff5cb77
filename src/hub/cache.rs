use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::types::{is_commit_hash, Repo};

/// A cache root laid out the way the Hugging Face tooling expects.
#[derive(Clone, Debug)]
pub struct HubCache {
    root: PathBuf,
}

impl HubCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn repo(&self, repo: &Repo) -> CacheRepo {
        CacheRepo {
            path: self.root.join(repo.folder_name()),
            revision: repo.revision().to_string(),
        }
    }
}

/// One repo folder inside a [`HubCache`].
#[derive(Clone, Debug)]
pub struct CacheRepo {
    path: PathBuf,
    revision: String,
}

impl CacheRepo {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ref_path(&self) -> PathBuf {
        self.path.join("refs").join(&self.revision)
    }

    pub fn blob_path(&self, etag: &str) -> PathBuf {
        self.path.join("blobs").join(etag)
    }

    pub fn incomplete_path(&self, etag: &str) -> PathBuf {
        self.path.join("blobs").join(format!("{etag}.incomplete"))
    }

    pub fn snapshot_path(&self, commit_hash: &str, filename: &str) -> PathBuf {
        filename
            .split('/')
            .fold(self.path.join("snapshots").join(commit_hash), |p, segment| {
                p.join(segment)
            })
    }

    /// Commit the revision points at, if it is known locally.
    pub fn commit_hash(&self) -> Option<String> {
        if is_commit_hash(&self.revision) {
            return Some(self.revision.clone());
        }
        let content = fs::read_to_string(self.ref_path()).ok()?;
        let commit = content.trim();
        (!commit.is_empty()).then(|| commit.to_string())
    }

    pub fn write_ref(&self, commit_hash: &str) -> io::Result<()> {
        let ref_path = self.ref_path();
        if let Some(parent) = ref_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(ref_path, commit_hash)
    }

    /// Snapshot path of `filename` when it is fully cached.
    pub fn get(&self, filename: &str) -> Option<PathBuf> {
        let commit = self.commit_hash()?;
        let path = self.snapshot_path(&commit, filename);
        path.exists().then_some(path)
    }

    /// Points `snapshots/<commit>/<filename>` at the blob for `etag`.
    pub fn create_pointer(&self, etag: &str, commit_hash: &str, filename: &str) -> io::Result<PathBuf> {
        let blob = self.blob_path(etag);
        let pointer = self.snapshot_path(commit_hash, filename);
        if let Some(parent) = pointer.parent() {
            fs::create_dir_all(parent)?;
        }
        if pointer.symlink_metadata().is_ok() {
            fs::remove_file(&pointer)?;
        }

        let depth = filename.split('/').count() + 1;
        let mut relative = PathBuf::new();
        for _ in 0..depth {
            relative.push("..");
        }
        relative.push("blobs");
        relative.push(etag);

        link_or_copy(&relative, &blob, &pointer)?;
        Ok(pointer)
    }
}

#[cfg(unix)]
fn link_or_copy(relative: &Path, blob: &Path, pointer: &Path) -> io::Result<()> {
    if std::os::unix::fs::symlink(relative, pointer).is_ok() {
        return Ok(());
    }
    fs::copy(blob, pointer).map(|_| ())
}

#[cfg(not(unix))]
fn link_or_copy(_relative: &Path, blob: &Path, pointer: &Path) -> io::Result<()> {
    fs::copy(blob, pointer).map(|_| ())
}
