//! Completion transcript persistence.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use atelier_core::RuntimeError;

/// Writes the workspace transcript: one UTF-8 text file under `dir`
/// (created if missing), named from the workspace and a separator-scrubbed
/// timestamp, listing each task's output in execution order.
pub async fn persist_transcript(
    dir: &Path,
    workspace_name: &str,
    entries: &[(String, String)],
) -> Result<PathBuf, RuntimeError> {
    let now = Utc::now();
    let stamp = now
        .to_rfc3339()
        .replace([':', '.'], "-");
    let file_name = format!("{workspace_name}_{stamp}.txt");
    let path = dir.join(file_name);

    let mut contents = format!(
        "Workspace: {workspace_name}\nGenerated: {}\n\n",
        now.to_rfc3339()
    );
    for (task_id, output) in entries {
        contents.push_str(&format!("=== Task {task_id} ===\n{output}\n\n"));
    }

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| RuntimeError::Persistence(e.to_string()))?;
    tokio::fs::write(&path, contents)
        .await
        .map_err(|e| RuntimeError::Persistence(e.to_string()))?;

    info!("TRANSCRIPT: wrote {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_tasks_in_order_with_scrubbed_filename() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            ("t1".to_string(), "first output".to_string()),
            ("t2".to_string(), "second output".to_string()),
        ];

        let path = persist_transcript(dir.path(), "Research", &entries)
            .await
            .unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("Research_"));
        assert!(name.ends_with(".txt"));
        assert!(!name.contains(':'));

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("Workspace: Research"));
        let first = contents.find("Task t1").unwrap();
        let second = contents.find("Task t2").unwrap();
        assert!(first < second);
        assert!(contents.contains("first output"));
    }

    #[tokio::test]
    async fn creates_the_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("Output");

        persist_transcript(&nested, "W", &[]).await.unwrap();
        assert!(nested.is_dir());
    }
}
