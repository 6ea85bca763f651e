//! Directory intake: turn the photos in a folder into [`IntakeFile`]s.

use std::path::Path;

use atelier_core::intake::{media_type_for_extension, IntakeFile, MAX_UPLOAD_BYTES};

/// Read every file in `dir` whose extension names an accepted image type,
/// sorted by filename. Files that fail validation are skipped with a
/// warning so one bad photo does not block the batch. Oversized files
/// are rejected from their metadata without being read.
pub async fn scan_dir(dir: &Path) -> std::io::Result<Vec<IntakeFile>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut candidates = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        let Some(media_type) = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(media_type_for_extension)
        else {
            tracing::debug!(path = %path.display(), "Skipping non-image file");
            continue;
        };
        let filename = entry.file_name().to_string_lossy().into_owned();
        let size = entry.metadata().await?.len();
        if size > MAX_UPLOAD_BYTES as u64 {
            tracing::warn!(filename = %filename, size, "Skipping file: too large");
            continue;
        }
        candidates.push((filename, media_type));
    }
    candidates.sort();

    let mut files = Vec::with_capacity(candidates.len());
    for (filename, media_type) in candidates {
        let bytes = tokio::fs::read(dir.join(&filename)).await?;
        let file = IntakeFile::new(filename, bytes, media_type);
        match file.validate() {
            Ok(()) => files.push(file),
            Err(e) => tracing::warn!(filename = %file.filename, error = %e, "Skipping file"),
        }
    }
    Ok(files)
}
