//! Virtual filesystem - a real directory tree exposed to the shell
//!
//! Paths coming from the browser are relative to the filesystem root
//! (`"/Desktop"`, `"Documents/notes.txt"`). A leading `/` is accepted and
//! means "the root". Every path is normalised before it touches the disk and
//! anything that would leave the root is rejected.

use std::path::{Component, Path, PathBuf};

use base64::Engine;
use shared_types::{AppShortcut, FsItem, FsItemKind, LinkShortcut};
use tokio::fs;

/// Directories every desktop expects to find
pub const STANDARD_DIRS: [&str; 3] = ["Desktop", "Documents", "Downloads"];

const APP_EXTENSION: &str = ".app";
const LINK_SUFFIX: &str = " - Shortcut";
const LINK_EXTENSION: &str = ".lnk";

#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    #[error("Path escapes the filesystem root: {0}")]
    PathTraversal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not a file: {0}")]
    NotAFile(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid shortcut {path}: {reason}")]
    InvalidShortcut { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VfsError {
    fn from_io(e: std::io::Error, user_path: &str) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => VfsError::NotFound(user_path.to_string()),
            std::io::ErrorKind::AlreadyExists => VfsError::AlreadyExists(user_path.to_string()),
            _ => VfsError::Io(e),
        }
    }
}

/// Text content of a file together with its identity
#[derive(Debug, Clone, serde::Serialize)]
pub struct FileContent {
    pub name: String,
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct VirtualFs {
    root: PathBuf,
}

impl VirtualFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a browser path onto the disk, refusing anything outside the root.
    pub fn resolve(&self, user_path: &str) -> Result<PathBuf, VfsError> {
        if user_path.contains('\0') {
            return Err(VfsError::PathTraversal(
                "path contains null bytes".to_string(),
            ));
        }

        let unified = user_path.replace('\\', "/");
        let mut normalized = PathBuf::new();
        for comp in Path::new(&unified).components() {
            match comp {
                Component::Normal(s) => normalized.push(s),
                Component::CurDir | Component::RootDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(VfsError::PathTraversal(user_path.to_string()));
                    }
                }
                Component::Prefix(_) => {
                    return Err(VfsError::PathTraversal(user_path.to_string()));
                }
            }
        }

        let full_path = self.root.join(&normalized);

        // Symlinks inside the tree must not point outside of it either.
        let mut existing = full_path.as_path();
        while !existing.exists() {
            match existing.parent() {
                Some(parent) => existing = parent,
                None => break,
            }
        }
        if let (Ok(real), Ok(root)) = (existing.canonicalize(), self.root.canonicalize()) {
            if !real.starts_with(&root) {
                return Err(VfsError::PathTraversal(user_path.to_string()));
            }
        }

        Ok(full_path)
    }

    /// Create the root, the standard folders and seed `.app` shortcuts on the desktop.
    pub async fn ensure_layout(&self, seed_dir: Option<&Path>) -> Result<(), VfsError> {
        fs::create_dir_all(&self.root).await?;
        for dir in STANDARD_DIRS {
            fs::create_dir_all(self.root.join(dir)).await?;
        }

        let Some(seed_dir) = seed_dir else {
            return Ok(());
        };
        let mut read_dir = match fs::read_dir(seed_dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let desktop = self.root.join("Desktop");
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with(APP_EXTENSION) {
                continue;
            }
            let dest = desktop.join(&name);
            if dest.exists() {
                continue;
            }
            fs::copy(entry.path(), &dest).await?;
            tracing::info!(shortcut = %name, "Seeded desktop shortcut");
        }
        Ok(())
    }

    /// List a directory. A missing directory lists as empty.
    pub async fn list(&self, user_path: &str) -> Result<Vec<FsItem>, VfsError> {
        let dir_path = self.resolve(user_path)?;

        match fs::metadata(&dir_path).await {
            Ok(m) if !m.is_dir() => return Err(VfsError::NotADirectory(user_path.to_string())),
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        }

        let mut items = Vec::new();
        let mut read_dir = fs::read_dir(&dir_path).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            // Follow symlinks so links to folders list as folders.
            let metadata = match fs::metadata(entry.path()).await {
                Ok(m) => m,
                Err(_) => continue,
            };

            let content = if name.ends_with(APP_EXTENSION) && metadata.is_file() {
                fs::read_to_string(entry.path()).await.ok()
            } else {
                None
            };

            items.push(FsItem {
                path: join_ui_path(user_path, &name),
                name,
                kind: if metadata.is_dir() {
                    FsItemKind::Folder
                } else {
                    FsItemKind::File
                },
                content,
            });
        }

        items.sort_by(|a, b| {
            b.kind
                .is_folder()
                .cmp(&a.kind.is_folder())
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        Ok(items)
    }

    pub async fn read_text(&self, user_path: &str) -> Result<FileContent, VfsError> {
        let (name, bytes) = self.read_bytes(user_path).await?;
        Ok(FileContent {
            name,
            path: user_path.to_string(),
            content: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    pub async fn read_base64(&self, user_path: &str) -> Result<FileContent, VfsError> {
        let (name, bytes) = self.read_bytes(user_path).await?;
        Ok(FileContent {
            name,
            path: user_path.to_string(),
            content: base64::engine::general_purpose::STANDARD.encode(bytes),
        })
    }

    /// Raw bytes of a file plus its file name
    pub async fn read_bytes(&self, user_path: &str) -> Result<(String, Vec<u8>), VfsError> {
        let file_path = self.resolve(user_path)?;
        let metadata = fs::metadata(&file_path)
            .await
            .map_err(|e| VfsError::from_io(e, user_path))?;
        if metadata.is_dir() {
            return Err(VfsError::NotAFile(user_path.to_string()));
        }

        let bytes = fs::read(&file_path)
            .await
            .map_err(|e| VfsError::from_io(e, user_path))?;
        Ok((file_name_of(&file_path), bytes))
    }

    /// Write text to a file, creating it if needed. The parent must exist.
    pub async fn save(&self, user_path: &str, content: &str) -> Result<(), VfsError> {
        let file_path = self.resolve(user_path)?;
        if file_path == self.resolve("")? || file_path.is_dir() {
            return Err(VfsError::NotAFile(user_path.to_string()));
        }
        fs::write(&file_path, content)
            .await
            .map_err(|e| VfsError::from_io(e, user_path))
    }

    /// First name of the form `base[ (n)]ext` not present in `dir`.
    pub async fn find_unique_name(
        &self,
        dir: &str,
        base_name: &str,
        is_folder: bool,
        extension: &str,
    ) -> Result<String, VfsError> {
        let dir_path = self.resolve(dir)?;
        let ext = if is_folder { "" } else { extension };
        Ok(unique_name(base_name, ext, |candidate| {
            dir_path.join(candidate).exists()
        }))
    }

    pub async fn create_folder(&self, dir: &str, name: &str) -> Result<String, VfsError> {
        validate_name(name)?;
        let user_path = join_ui_path(dir, name);
        let folder = self.resolve(&user_path)?;
        if folder.is_file() {
            return Err(VfsError::AlreadyExists(user_path));
        }
        fs::create_dir_all(&folder).await?;
        Ok(user_path)
    }

    pub async fn create_file(
        &self,
        dir: &str,
        name: &str,
        content: &str,
    ) -> Result<String, VfsError> {
        validate_name(name)?;
        let user_path = join_ui_path(dir, name);
        let file_path = self.resolve(&user_path)?;
        if file_path.is_dir() {
            return Err(VfsError::AlreadyExists(user_path));
        }
        fs::write(&file_path, content)
            .await
            .map_err(|e| VfsError::from_io(e, &user_path))?;
        Ok(user_path)
    }

    /// Drop a `<app name>.app` shortcut on the desktop.
    pub async fn create_shortcut(&self, app_id: &str, app_name: &str) -> Result<String, VfsError> {
        let file_name = format!("{app_name}{APP_EXTENSION}");
        validate_name(&file_name)?;
        let shortcut = AppShortcut {
            app_id: app_id.to_string(),
            ..AppShortcut::default()
        };
        let body = serde_json::to_string(&shortcut).map_err(|e| VfsError::InvalidShortcut {
            path: file_name.clone(),
            reason: e.to_string(),
        })?;
        self.create_file("Desktop", &file_name, &body).await
    }

    /// Create `<stem> - Shortcut.lnk` next to `target`, returning its path.
    pub async fn create_link(&self, target: &str) -> Result<String, VfsError> {
        let target_path = self.resolve(target)?;
        let metadata = fs::metadata(&target_path)
            .await
            .map_err(|e| VfsError::from_io(e, target))?;

        let stem = target_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| VfsError::InvalidName(target.to_string()))?;
        let dir = ui_parent(target);
        let dir_path = self.resolve(&dir)?;
        let link_name = unique_name(&format!("{stem}{LINK_SUFFIX}"), LINK_EXTENSION, |c| {
            dir_path.join(c).exists()
        });

        let link = LinkShortcut {
            target: target.to_string(),
            kind: if metadata.is_dir() {
                FsItemKind::Folder
            } else {
                FsItemKind::File
            },
        };
        let body = serde_json::to_string(&link).map_err(|e| VfsError::InvalidShortcut {
            path: link_name.clone(),
            reason: e.to_string(),
        })?;
        fs::write(dir_path.join(&link_name), body).await?;
        Ok(join_ui_path(&dir, &link_name))
    }

    pub async fn delete(&self, item: &FsItem) -> Result<(), VfsError> {
        let item_path = self.resolve_item(&item.path)?;
        if item.kind.is_folder() {
            match fs::remove_dir_all(&item_path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        } else {
            fs::remove_file(&item_path)
                .await
                .map_err(|e| VfsError::from_io(e, &item.path))
        }
    }

    /// Rename an item inside its current folder.
    pub async fn rename(&self, item: &FsItem, new_name: &str) -> Result<String, VfsError> {
        validate_name(new_name)?;
        let source = self.resolve_item(&item.path)?;
        let target_user_path = join_ui_path(&ui_parent(&item.path), new_name);
        let target = self.resolve(&target_user_path)?;

        if !source.exists() {
            return Err(VfsError::NotFound(item.path.clone()));
        }
        if target.exists() {
            return Err(VfsError::AlreadyExists(target_user_path));
        }
        fs::rename(&source, &target).await?;
        Ok(target_user_path)
    }

    pub async fn move_item(&self, item: &FsItem, dest_dir: &str) -> Result<String, VfsError> {
        let (source, target, target_user_path) = self.transfer_paths(item, dest_dir)?;
        fs::rename(&source, &target).await?;
        Ok(target_user_path)
    }

    pub async fn copy_item(&self, item: &FsItem, dest_dir: &str) -> Result<String, VfsError> {
        let (source, target, target_user_path) = self.transfer_paths(item, dest_dir)?;
        tokio::task::spawn_blocking(move || copy_recursive(&source, &target))
            .await
            .map_err(|e| VfsError::Io(std::io::Error::other(e)))??;
        Ok(target_user_path)
    }

    /// Parse a `.app` shortcut file.
    pub async fn read_app_file(&self, user_path: &str) -> Result<AppShortcut, VfsError> {
        let file = self.read_text(user_path).await?;
        serde_json::from_str(&file.content).map_err(|e| VfsError::InvalidShortcut {
            path: user_path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Resolve an existing item path, refusing the root itself.
    fn resolve_item(&self, user_path: &str) -> Result<PathBuf, VfsError> {
        let path = self.resolve(user_path)?;
        if path == self.root {
            return Err(VfsError::InvalidName(
                "the filesystem root cannot be modified".to_string(),
            ));
        }
        Ok(path)
    }

    fn transfer_paths(
        &self,
        item: &FsItem,
        dest_dir: &str,
    ) -> Result<(PathBuf, PathBuf, String), VfsError> {
        validate_name(&item.name)?;
        let source = self.resolve_item(&item.path)?;
        let dest_dir_path = self.resolve(dest_dir)?;
        let target_user_path = join_ui_path(dest_dir, &item.name);
        let target = dest_dir_path.join(&item.name);

        if !source.exists() {
            return Err(VfsError::NotFound(item.path.clone()));
        }
        if !dest_dir_path.is_dir() {
            return Err(VfsError::NotADirectory(dest_dir.to_string()));
        }
        if target.starts_with(&source) {
            return Err(VfsError::InvalidName(format!(
                "cannot place {} inside itself",
                item.path
            )));
        }
        if target.exists() {
            return Err(VfsError::AlreadyExists(target_user_path));
        }
        Ok((source, target, target_user_path))
    }
}

/// Join a browser directory path and an entry name with `/`.
pub fn join_ui_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Parent of a browser path (`"/Desktop/a.txt"` -> `"/Desktop"`).
pub fn ui_parent(user_path: &str) -> String {
    let trimmed = user_path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => trimmed[..idx].to_string(),
        None => String::new(),
    }
}

/// `base + ext`, or `base (n) + ext` for the smallest free n.
pub fn unique_name(base: &str, ext: &str, exists: impl Fn(&str) -> bool) -> String {
    let mut candidate = format!("{base}{ext}");
    let mut counter = 0u32;
    while exists(&candidate) {
        counter += 1;
        candidate = format!("{base} ({counter}){ext}");
    }
    candidate
}

fn validate_name(name: &str) -> Result<(), VfsError> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(VfsError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn copy_recursive(source: &Path, target: &Path) -> Result<(), VfsError> {
    if source.is_file() {
        std::fs::copy(source, target)?;
        return Ok(());
    }

    for entry in walkdir::WalkDir::new(source) {
        let entry = entry.map_err(|e| VfsError::Io(std::io::Error::other(e)))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| VfsError::Io(std::io::Error::other(e)))?;
        let dest = target.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest)?;
        } else {
            std::fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}
