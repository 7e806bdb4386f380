use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::format::sanitize_filename;

/// Stored document bytes, laid out as `<root>/<owner>/<record>_<file name>`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write the uploaded bytes for a record. Returns the stored path.
    pub fn stage_file(
        &self,
        owner_id: &Uuid,
        record_id: &Uuid,
        file_name: &str,
        bytes: &[u8],
    ) -> std::io::Result<PathBuf> {
        let target_dir = self.root.join(owner_id.to_string());
        std::fs::create_dir_all(&target_dir)?;

        let target_path =
            target_dir.join(format!("{}_{}", record_id, sanitize_filename(file_name)));
        std::fs::write(&target_path, bytes)?;

        tracing::debug!(
            record_id = %record_id,
            size = bytes.len(),
            "Document bytes staged"
        );
        Ok(target_path)
    }

    /// Remove stored bytes. A file that is already gone is not an error.
    /// Returns whether a file was actually removed.
    pub fn remove_staged(&self, path: &Path) -> std::io::Result<bool> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Stored file already missing");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
