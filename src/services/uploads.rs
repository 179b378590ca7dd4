//! Disk storage for uploaded files.
//!
//! Files land under `<public root>/uploads/{avatars,images}` with a
//! generated name; callers get back the public path (`/uploads/...`),
//! never the absolute filesystem path.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Avatars,
    Images,
}

impl UploadKind {
    #[must_use]
    pub const fn dir(self) -> &'static str {
        match self {
            Self::Avatars => "avatars",
            Self::Images => "images",
        }
    }
}

/// Content types accepted by the upload endpoints.
#[must_use]
pub fn is_image(content_type: &str) -> bool {
    content_type.starts_with("image/")
}

/// Map a content type to a file extension; unknown types keep a neutral
/// one so the stored name never depends on client-supplied filenames.
#[must_use]
pub fn extension_for(content_type: &str) -> &'static str {
    mime_guess::get_mime_extensions_str(content_type)
        .and_then(|exts| exts.first())
        .copied()
        .unwrap_or("bin")
}

#[derive(Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Filesystem directory served statically at `/uploads`.
    #[must_use]
    pub fn public_root(&self) -> PathBuf {
        self.root.join("uploads")
    }

    #[must_use]
    pub fn dir_for(&self, kind: UploadKind) -> PathBuf {
        self.public_root().join(kind.dir())
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        for kind in [UploadKind::Avatars, UploadKind::Images] {
            tokio::fs::create_dir_all(self.dir_for(kind))
                .await
                .with_context(|| format!("Failed to create uploads dir: {}", kind.dir()))?;
        }
        Ok(())
    }

    /// Write validated bytes to disk and return the public path.
    pub async fn save(
        &self,
        kind: UploadKind,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String> {
        let name = format!("{}.{}", Uuid::new_v4(), extension_for(content_type));
        let dir = self.dir_for(kind);

        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create uploads dir: {}", dir.display()))?;
        tokio::fs::write(dir.join(&name), bytes)
            .await
            .with_context(|| format!("Failed to write upload: {name}"))?;

        Ok(format!("/uploads/{}/{}", kind.dir(), name))
    }

    #[must_use]
    pub fn resolve(&self, public_path: &str) -> PathBuf {
        self.root.join(Path::new(public_path.trim_start_matches('/')))
    }
}
