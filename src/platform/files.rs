//! OS-independent file operations shared by every executor

use crate::core::error::{Result, VoxError};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Entry names in `dir`, sorted
pub async fn read_dir(dir: &Path) -> Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().to_string());
    }
    names.sort();
    Ok(names)
}

/// Write `contents`, creating parent directories as needed
pub async fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    Ok(())
}

pub async fn delete_file(path: &Path) -> Result<()> {
    tokio::fs::remove_file(path).await?;
    Ok(())
}

pub async fn copy_file(source: &Path, destination: &Path) -> Result<()> {
    tokio::fs::copy(source, destination).await?;
    Ok(())
}

pub async fn move_file(source: &Path, destination: &Path) -> Result<()> {
    tokio::fs::rename(source, destination).await?;
    Ok(())
}

/// Recursive, case-insensitive file-name search
pub async fn find_files(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let root = root.to_path_buf();
    let needle = pattern.to_lowercase();
    tokio::task::spawn_blocking(move || {
        WalkDir::new(&root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .to_lowercase()
                    .contains(&needle)
            })
            .map(|entry| entry.into_path())
            .collect()
    })
    .await
    .map_err(|e| VoxError::Executor(format!("File search aborted: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_parents_and_lists() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/notes.txt");
        write_file(&nested, "hello").await.unwrap();

        assert_eq!(tokio::fs::read_to_string(&nested).await.unwrap(), "hello");
        assert_eq!(read_dir(&dir.path().join("a")).await.unwrap(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_find_files_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("Report-2024.TXT"), "").await.unwrap();
        write_file(&dir.path().join("sub/report-draft.md"), "").await.unwrap();
        write_file(&dir.path().join("other.txt"), "").await.unwrap();

        let found = find_files(dir.path(), "report").await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = delete_file(&dir.path().join("nope.txt")).await;
        assert!(matches!(result, Err(VoxError::IoError(_))));
    }
}
