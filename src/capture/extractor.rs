use std::path::Path;
use tokio::fs;
use tracing::error;

use super::collector::collect_files;

/// Concatenate matching files, each introduced by a `#FileName:` header line
pub async fn extract_text(dir: &Path, names: &[String]) -> String {
    let mut text = String::new();

    for path in collect_files(dir, names).await {
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) => {
                error!(file = %path.display(), error = %e, "Error extracting text from file");
                continue;
            }
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        text.push_str(&format!("#FileName: {file_name}\n"));
        text.push_str(&contents);
        text.push_str("\n\n");
    }

    text
}
