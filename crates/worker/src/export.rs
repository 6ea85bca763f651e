//! Write completed results next to each other in an output folder.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use atelier_core::intake::extension_for_media_type;
use atelier_core::job::{Job, JobStatus};
use atelier_core::types::JobId;

fn file_stem(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("result")
}

/// Output filename for a job: `{stem}.relit.{ext}`, where the extension
/// follows the result's media type rather than the upload's.
pub fn output_name(filename: &str, media_type: &str) -> String {
    format!(
        "{}.relit.{}",
        file_stem(filename),
        extension_for_media_type(media_type)
    )
}

/// Like [`output_name`] with the first eight characters of the job id
/// before the suffix: `{stem}.{id}.relit.{ext}`.
pub fn disambiguated_name(filename: &str, media_type: &str, id: JobId) -> String {
    let id = id.simple().to_string();
    format!(
        "{}.{}.relit.{}",
        file_stem(filename),
        &id[..8],
        extension_for_media_type(media_type)
    )
}

/// Write the result of every completed job into `dir`, creating it if
/// needed. Returns the paths written.
///
/// Jobs whose names collide within one export (`mug.jpg` and `mug.png`)
/// get the job id folded into the name instead of overwriting each other.
pub async fn write_results(dir: &Path, jobs: &[Job]) -> std::io::Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir).await?;

    let mut used = HashSet::new();
    let mut written = Vec::new();
    for job in jobs.iter().filter(|j| j.status == JobStatus::Completed) {
        let Some(result) = &job.result else {
            continue;
        };
        let mut name = output_name(&job.filename, &result.media_type);
        if used.contains(&name) {
            name = disambiguated_name(&job.filename, &result.media_type, job.id);
        }
        used.insert(name.clone());
        let path = dir.join(name);
        tokio::fs::write(&path, &result.bytes).await?;
        tracing::debug!(job_id = %job.id, path = %path.display(), "Result written");
        written.push(path);
    }
    Ok(written)
}
