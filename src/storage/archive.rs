//! Zip extraction

use async_trait::async_trait;
use std::path::Path;

use super::ArchiveExtractor;
use crate::error::AppError;

/// Extracts zip archives on the blocking thread pool
#[derive(Debug, Clone, Default)]
pub struct ZipExtractor;

impl ZipExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArchiveExtractor for ZipExtractor {
    async fn unzip(&self, archive: &Path, target: &Path) -> Result<(), AppError> {
        let archive = archive.to_path_buf();
        let target = target.to_path_buf();

        tokio::task::spawn_blocking(move || -> Result<(), AppError> {
            let file = std::fs::File::open(&archive).map_err(|e| {
                AppError::Archive(format!("Cannot open {}: {}", archive.display(), e))
            })?;
            let mut zip = zip::ZipArchive::new(file)?;
            let entries = zip.len();
            // Entries escaping `target` are rejected by the zip crate
            zip.extract(&target)?;

            tracing::debug!(
                archive = %archive.display(),
                target = %target.display(),
                entries,
                "Extracted archive"
            );
            Ok(())
        })
        .await
        .map_err(|e| AppError::Internal(e.into()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_archive(path: &Path) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .add_directory("module/", SimpleFileOptions::default())
            .unwrap();
        writer
            .start_file("module/index.html", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<html></html>").unwrap();
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn unzip_extracts_into_target() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("tmp_1.zip");
        write_archive(&archive);

        ZipExtractor::new()
            .unzip(&archive, temp_dir.path())
            .await
            .unwrap();

        let content = std::fs::read_to_string(temp_dir.path().join("module/index.html")).unwrap();
        assert_eq!(content, "<html></html>");
    }

    #[tokio::test]
    async fn unzip_rejects_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("broken.zip");
        std::fs::write(&archive, b"definitely not a zip").unwrap();

        let result = ZipExtractor::new().unzip(&archive, temp_dir.path()).await;
        assert!(matches!(result, Err(AppError::Archive(_))));
    }
}
