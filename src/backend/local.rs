//! Local directory backend driver
//!
//! Maps backend references to absolute filesystem paths. Metadata writes go through a
//! temporary file and an atomic rename so readers never observe a torn fragment. Temporary
//! names carry a random suffix so they cannot overwrite a user item, and the listing never
//! reports them.

use crate::backend::{BackendDriver, ListingEntry};
use crate::error::BackendError;
use crate::types::BackendRef;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

const TEMP_SUFFIX: &str = ".tmp";

/// Driver over a local directory tree
pub struct LocalFsDriver {
    root: PathBuf,
}

impl LocalFsDriver {
    /// Create a driver rooted at an existing directory
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, BackendError> {
        let root = dunce::canonicalize(root.as_ref())?;
        if !root.is_dir() {
            return Err(BackendError::Failed {
                operation: "open",
                message: format!("{} is not a directory", root.display()),
            });
        }
        Ok(Self { root })
    }

    /// Reference to the driver root
    pub fn root(&self) -> BackendRef {
        BackendRef::new(self.root.to_string_lossy().into_owned())
    }

    /// Resolve a reference, refusing anything outside the root.
    fn resolve(&self, item: &BackendRef) -> Result<PathBuf, BackendError> {
        let path = PathBuf::from(item.as_str());
        if !path.starts_with(&self.root)
            || path
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(BackendError::Failed {
                operation: "resolve",
                message: format!("{} is outside {}", item, self.root.display()),
            });
        }
        Ok(path)
    }
}

fn map_io(err: std::io::Error, path: &Path) -> BackendError {
    match err.kind() {
        ErrorKind::NotFound => BackendError::NotFound(path.display().to_string()),
        ErrorKind::AlreadyExists => BackendError::AlreadyExists(path.display().to_string()),
        _ => BackendError::IoError(err),
    }
}

/// Sibling path for a pending metadata write: `.{name}.{uuid}.tmp`.
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(
        ".{}.{}{}",
        name,
        Uuid::new_v4().simple(),
        TEMP_SUFFIX
    ))
}

/// Whether a listed name is a pending or abandoned metadata write.
fn is_temp_name(name: &str) -> bool {
    let Some(stem) = name
        .strip_prefix('.')
        .and_then(|n| n.strip_suffix(TEMP_SUFFIX))
    else {
        return false;
    };
    match stem.rsplit_once('.') {
        Some((base, id)) => {
            !base.is_empty() && id.len() == 32 && Uuid::try_parse(id).is_ok()
        }
        None => false,
    }
}

fn to_ref(path: &Path) -> BackendRef {
    BackendRef::new(path.to_string_lossy().into_owned())
}

/// Recursive directory copy; runs on the blocking pool.
fn copy_tree(from: &Path, to: &Path) -> Result<(), BackendError> {
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(|e| BackendError::Failed {
            operation: "copy_item",
            message: format!("Failed to walk {}: {}", from.display(), e),
        })?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| BackendError::Failed {
                operation: "copy_item",
                message: e.to_string(),
            })?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| map_io(e, &target))?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target).map_err(|e| map_io(e, &target))?;
        }
    }
    Ok(())
}

#[async_trait]
impl BackendDriver for LocalFsDriver {
    fn name(&self) -> &str {
        "local"
    }

    fn child_ref(&self, parent: &BackendRef, name: &str) -> BackendRef {
        to_ref(&Path::new(parent.as_str()).join(name))
    }

    fn item_name(&self, item: &BackendRef) -> Option<String> {
        Path::new(item.as_str())
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    }

    async fn list(&self, container: &BackendRef) -> Result<Vec<ListingEntry>, BackendError> {
        let path = self.resolve(container)?;
        let mut reader = fs::read_dir(&path).await.map_err(|e| map_io(e, &path))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_symlink() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                debug!(path = %entry.path().display(), "Skipping non-UTF8 entry");
                continue;
            };
            if is_temp_name(&name) {
                debug!(name = %name, "Skipping pending metadata write");
                continue;
            }
            entries.push(ListingEntry {
                name,
                is_container: file_type.is_dir(),
                backend_ref: to_ref(&entry.path()),
            });
        }
        Ok(entries)
    }

    async fn read_metadata_file(&self, item: &BackendRef) -> Result<String, BackendError> {
        let path = self.resolve(item)?;
        fs::read_to_string(&path).await.map_err(|e| map_io(e, &path))
    }

    async fn write_metadata_file(
        &self,
        item: &BackendRef,
        text: &str,
    ) -> Result<(), BackendError> {
        let path = self.resolve(item)?;
        let temp_path = temp_path_for(&path);
        fs::write(&temp_path, text)
            .await
            .map_err(|e| map_io(e, &temp_path))?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(map_io(e, &path));
        }
        Ok(())
    }

    async fn create_container(
        &self,
        parent: &BackendRef,
        name: &str,
    ) -> Result<BackendRef, BackendError> {
        let path = self.resolve(parent)?.join(name);
        fs::create_dir(&path).await.map_err(|e| map_io(e, &path))?;
        Ok(to_ref(&path))
    }

    async fn create_leaf_item(
        &self,
        parent: &BackendRef,
        name: &str,
        content: &[u8],
    ) -> Result<BackendRef, BackendError> {
        use tokio::io::AsyncWriteExt;

        let path = self.resolve(parent)?.join(name);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| map_io(e, &path))?;
        file.write_all(content).await?;
        file.flush().await?;
        Ok(to_ref(&path))
    }

    async fn delete_container(&self, item: &BackendRef) -> Result<(), BackendError> {
        let path = self.resolve(item)?;
        if path == self.root {
            return Err(BackendError::Failed {
                operation: "delete_container",
                message: "cannot delete the driver root".to_string(),
            });
        }
        fs::remove_dir_all(&path).await.map_err(|e| map_io(e, &path))
    }

    async fn delete_leaf_item(&self, item: &BackendRef) -> Result<(), BackendError> {
        let path = self.resolve(item)?;
        fs::remove_file(&path).await.map_err(|e| map_io(e, &path))
    }

    async fn move_item(&self, from: &BackendRef, to: &BackendRef) -> Result<(), BackendError> {
        let from = self.resolve(from)?;
        let to = self.resolve(to)?;
        if fs::try_exists(&to).await? {
            return Err(BackendError::AlreadyExists(to.display().to_string()));
        }
        fs::rename(&from, &to).await.map_err(|e| map_io(e, &from))
    }

    async fn copy_item(&self, from: &BackendRef, to: &BackendRef) -> Result<(), BackendError> {
        let from = self.resolve(from)?;
        let to = self.resolve(to)?;
        if fs::try_exists(&to).await? {
            return Err(BackendError::AlreadyExists(to.display().to_string()));
        }
        let metadata = fs::metadata(&from).await.map_err(|e| map_io(e, &from))?;
        if metadata.is_dir() {
            tokio::task::spawn_blocking(move || copy_tree(&from, &to))
                .await
                .map_err(|e| BackendError::Failed {
                    operation: "copy_item",
                    message: e.to_string(),
                })?
        } else {
            fs::copy(&from, &to).await.map_err(|e| map_io(e, &to))?;
            Ok(())
        }
    }

    async fn public_url(&self, item: &BackendRef) -> Result<String, BackendError> {
        let path = self.resolve(item)?;
        let canonical = dunce::canonicalize(&path).map_err(|e| map_io(e, &path))?;
        Ok(format!("file://{}", canonical.to_string_lossy()))
    }
}
