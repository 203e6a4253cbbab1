use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;

use crate::models::AppError;

/// URL prefix under which the upload directory is served.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Avatar files on local disk, named `<unix-millis>-<original name>`.
#[derive(Debug, Clone)]
pub struct AvatarStore { dir: PathBuf }

impl AvatarStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

    pub fn dir(&self) -> &Path { &self.dir }

    /// Writes `bytes` and returns the public path of the stored file.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<String, AppError> {
        // Only the last path component of the client name is kept.
        let base = Path::new(original_name)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .unwrap_or("avatar");
        let file_name = format!("{}-{}", Utc::now().timestamp_millis(), base);
        fs::create_dir_all(&self.dir).await?;
        fs::write(self.dir.join(&file_name), bytes).await?;
        tracing::debug!(file = %file_name, size = bytes.len(), "stored avatar");
        Ok(format!("{PUBLIC_PREFIX}/{file_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saves_under_timestamped_name() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AvatarStore::new(tmp.path().join("uploads"));
        let public = store.save("me.png", b"png-bytes").await.unwrap();
        assert!(public.starts_with("/uploads/"));
        assert!(public.ends_with("-me.png"));
        let file_name = public.trim_start_matches("/uploads/");
        assert_eq!(std::fs::read(store.dir().join(file_name)).unwrap(), b"png-bytes");
    }

    #[tokio::test]
    async fn strips_directories_from_client_name() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AvatarStore::new(tmp.path());
        let public = store.save("../../etc/passwd", b"x").await.unwrap();
        assert!(public.ends_with("-passwd"));
        assert!(!public.contains(".."));
    }
}
