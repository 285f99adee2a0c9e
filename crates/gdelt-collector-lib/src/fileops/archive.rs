use crate::error::CollectorError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extracts a ZIP archive into `target_dir` and returns the written file
/// paths in entry order. Directory entries are created but not returned.
///
/// Entry names are validated before anything is written: an entry whose name
/// escapes `target_dir` (absolute paths or `..` components) fails the whole
/// extraction, so a hostile archive materializes no files at all.
pub async fn extract_zip(
    zip_path: &Path,
    target_dir: &Path,
) -> Result<Vec<PathBuf>, CollectorError> {
    let zip_path = zip_path.to_path_buf();
    let target_dir = target_dir.to_path_buf();
    let archive_name = file_name_of(&zip_path);

    tokio::task::spawn_blocking(move || extract_zip_blocking(&zip_path, &target_dir))
        .await
        .map_err(|e| CollectorError::Extraction {
            archive: archive_name,
            reason: format!("extraction task failed: {}", e),
        })?
}

fn extract_zip_blocking(zip_path: &Path, target_dir: &Path) -> Result<Vec<PathBuf>, CollectorError> {
    let archive_name = file_name_of(zip_path);
    let file = std::fs::File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| CollectorError::Extraction {
        archive: archive_name.clone(),
        reason: e.to_string(),
    })?;

    // Validate every entry name before writing anything.
    for index in 0..archive.len() {
        let entry = archive.by_index(index).map_err(|e| CollectorError::Extraction {
            archive: archive_name.clone(),
            reason: e.to_string(),
        })?;
        if entry.enclosed_name().is_none() {
            return Err(CollectorError::ZipTraversal {
                entry: entry.name().to_string(),
            });
        }
    }

    let mut written = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| CollectorError::Extraction {
            archive: archive_name.clone(),
            reason: e.to_string(),
        })?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| CollectorError::ZipTraversal {
                entry: entry.name().to_string(),
            })?;
        let out_path = target_dir.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out_file = std::fs::File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out_file)?;
        debug!(entry = entry.name(), path = %out_path.display(), "Extracted archive member");
        written.push(out_path);
    }

    Ok(written)
}

/// Idempotently creates a directory. Fails if the path exists as a
/// non-directory.
pub fn ensure_dir(path: &Path) -> Result<PathBuf, CollectorError> {
    if path.exists() {
        if path.is_dir() {
            return Ok(path.to_path_buf());
        }
        return Err(CollectorError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} exists and is not a directory", path.display()),
        )));
    }
    std::fs::create_dir_all(path)?;
    Ok(path.to_path_buf())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
