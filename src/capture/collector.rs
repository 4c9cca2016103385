use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error};

/// Regular files directly under `dir` whose name contains any of `names`,
/// ignoring case. Sorted by path; an unreadable directory yields nothing.
pub async fn collect_files(dir: &Path, names: &[String]) -> Vec<PathBuf> {
    match scan(dir, names).await {
        Ok(mut files) => {
            files.sort();
            debug!(dir = %dir.display(), count = files.len(), "Collected log files");
            files
        }
        Err(e) => {
            error!(dir = %dir.display(), error = %e, "Error collecting files");
            Vec::new()
        }
    }
}

async fn scan(dir: &Path, names: &[String]) -> std::io::Result<Vec<PathBuf>> {
    let needles: Vec<String> = names
        .iter()
        .filter(|n| !n.is_empty())
        .map(|n| n.to_lowercase())
        .collect();

    let mut matched = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_lowercase();
        if needles.iter().any(|needle| file_name.contains(needle)) {
            matched.push(entry.path());
        }
    }
    Ok(matched)
}
