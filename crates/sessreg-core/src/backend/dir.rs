//! Directory backend: one file per key.
//!
//! Layout:
//! ```text
//! root/
//! └── sessions/
//!     ├── 5f0c2a4e-....json
//!     └── 9b1d07e2-....json
//! ```
//!
//! Writes go to a hidden temp file first. `put` renames it over the target;
//! `create` hard-links it into place, which fails if the target exists, so
//! readers never observe a half-written value.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{Backend, BackendError, BackendResult};

const EXTENSION: &str = "json";

/// Backend storing each key as a file under `root/<namespace>/`.
#[derive(Debug, Clone)]
pub struct DirBackend {
    root: PathBuf,
}

impl DirBackend {
    /// Open (creating if needed) a backend rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> BackendResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "opened directory backend");
        Ok(Self { root })
    }

    fn namespace_dir(&self, namespace: &str) -> BackendResult<PathBuf> {
        check_component("namespace", namespace)?;
        Ok(self.root.join(namespace))
    }

    fn key_path(&self, namespace: &str, key: &str) -> BackendResult<PathBuf> {
        check_component("key", key)?;
        Ok(self.namespace_dir(namespace)?.join(format!("{key}.{EXTENSION}")))
    }

    /// Write `value` to a fresh temp file next to `target`.
    async fn write_temp(&self, target: &Path, value: &[u8]) -> BackendResult<PathBuf> {
        let dir = target
            .parent()
            .ok_or_else(|| BackendError::Other(format!("no parent for {}", target.display())))?;
        fs::create_dir_all(dir).await?;

        let name = target.file_name().and_then(|n| n.to_str()).unwrap_or("value");
        let tmp = dir.join(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()));

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(value).await?;
        file.sync_all().await?;
        Ok(tmp)
    }
}

#[async_trait]
impl Backend for DirBackend {
    async fn create(&self, namespace: &str, key: &str, value: Vec<u8>) -> BackendResult<()> {
        let path = self.key_path(namespace, key)?;
        let tmp = self.write_temp(&path, &value).await?;

        let linked = fs::hard_link(&tmp, &path).await;
        if let Err(e) = fs::remove_file(&tmp).await {
            warn!(path = %tmp.display(), error = %e, "failed to remove temp file");
        }
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(BackendError::already_exists(namespace, key))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, namespace: &str, key: &str, value: Vec<u8>) -> BackendResult<()> {
        let path = self.key_path(namespace, key)?;
        let tmp = self.write_temp(&path, &value).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> BackendResult<Vec<u8>> {
        let path = self.key_path(namespace, key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BackendError::not_found(namespace, key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_all(&self, namespace: &str) -> BackendResult<Vec<(String, Vec<u8>)>> {
        let dir = self.namespace_dir(namespace)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(key) = key_from_path(&path) else {
                continue;
            };
            match fs::read(&path).await {
                Ok(bytes) => out.push((key, bytes)),
                // deleted between listing and reading
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    async fn delete(&self, namespace: &str, key: &str) -> BackendResult<()> {
        let path = self.key_path(namespace, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BackendError::not_found(namespace, key)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keys and namespaces become path components; keep them to one plain segment.
fn check_component(what: &str, s: &str) -> BackendResult<()> {
    let ok = !s.is_empty()
        && !s.starts_with('.')
        && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(BackendError::Other(format!("invalid {what} {s:?}")))
    }
}

/// `<key>.json` -> `key`; temp files and anything else are skipped.
fn key_from_path(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.starts_with('.') {
        return None;
    }
    Some(stem.to_string())
}
