use log::{debug, error, warn};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::errors::ApiError;

pub const UPLOADS_URL_PREFIX: &str = "/static/uploads";
const DEFAULT_EXTENSION: &str = ".jpg";

/// Product images written to a fixed directory under collision-free names.
#[derive(Clone, Debug)]
pub struct UploadStore {
    dir: PathBuf,
    max_file_size: usize,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_file_size: usize) -> Self {
        Self { dir: dir.into(), max_file_size }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> Result<(), ApiError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            error!("Failed to create uploads directory {}: {}", self.dir.display(), e);
            ApiError::InternalError(e.to_string())
        })
    }

    /// `<uuid><ext>` where `ext` is the original extension when it is plain
    /// alphanumeric, `.jpg` otherwise.
    fn unique_name(original_name: Option<&str>) -> String {
        let extension = original_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| format!(".{}", ext))
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
        format!("{}{}", Uuid::new_v4(), extension)
    }

    fn check_size(&self, size: usize, original_name: Option<&str>) -> Result<(), ApiError> {
        if size > self.max_file_size {
            return Err(ApiError::ValidationError(format!(
                "{} exceeds the {} byte upload limit",
                original_name.unwrap_or("Upload"),
                self.max_file_size
            )));
        }
        Ok(())
    }

    fn write_with<F>(&self, original_name: Option<&str>, write: F) -> Result<String, ApiError>
    where
        F: FnOnce(&Path) -> std::io::Result<()>,
    {
        self.ensure_dir()?;
        let file_name = Self::unique_name(original_name);
        let target = self.dir.join(&file_name);

        write(&target).map_err(|e| {
            error!("Failed to store upload at {}: {}", target.display(), e);
            ApiError::InternalError(e.to_string())
        })?;

        debug!("Stored upload {:?} as {}", original_name, target.display());
        Ok(format!("{}/{}", UPLOADS_URL_PREFIX, file_name))
    }

    /// Copies a spooled upload into the store and returns its web path.
    pub fn save_file(&self, source: &Path, original_name: Option<&str>, size: usize) -> Result<String, ApiError> {
        self.check_size(size, original_name)?;
        self.write_with(original_name, |target| fs::copy(source, target).map(|_| ()))
    }

    pub fn save_bytes(&self, bytes: &[u8], original_name: Option<&str>) -> Result<String, ApiError> {
        self.check_size(bytes.len(), original_name)?;
        self.write_with(original_name, |target| fs::write(target, bytes))
    }

    /// Maps a web path back to a file inside the store. Paths outside the
    /// uploads prefix or with directory components are refused.
    pub fn path_for(&self, web_path: &str) -> Option<PathBuf> {
        let name = web_path.strip_prefix(UPLOADS_URL_PREFIX)?.strip_prefix('/')?;
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return None;
        }
        Some(self.dir.join(name))
    }

    /// Best effort: failures are logged, never returned.
    pub fn remove(&self, web_path: &str) -> bool {
        let path = match self.path_for(web_path) {
            Some(p) => p,
            None => return false,
        };
        if !path.exists() {
            return false;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("File {} deleted from disk", path.display());
                true
            }
            Err(e) => {
                warn!("Could not delete file {} from disk: {}", path.display(), e);
                false
            }
        }
    }
}
