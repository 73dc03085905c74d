//! Reading source files into ingest requests.

use ragpipe_core::{AppError, AppResult};
use ragpipe_rag::{DataSource, IngestRequest, IngestSummary, RagPipeline};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expand files and directories into a sorted, de-duplicated file list.
///
/// Hidden entries (dot files and dot directories) below a given directory
/// are skipped.
pub fn collect_files(paths: &[PathBuf]) -> AppResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
            {
                let entry = entry.map_err(|e| AppError::Io(e.into()))?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
        } else {
            return Err(AppError::NotFound(format!(
                "source path {}",
                path.display()
            )));
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Build an ingest request for a file, keyed by its path.
///
/// Returns `None` for files that are not UTF-8 text.
pub fn read_source(path: &Path) -> AppResult<Option<IngestRequest>> {
    let bytes = std::fs::read(path)?;
    let Ok(content) = String::from_utf8(bytes) else {
        tracing::warn!("Skipping non-UTF-8 file: {}", path.display());
        return Ok(None);
    };

    let id = path.display().to_string();
    Ok(Some(
        IngestRequest::new(content)
            .with_id(id.clone())
            .with_source(DataSource::File)
            .with_source_uri(id),
    ))
}

/// Ingest every readable file under `paths`, one summary per file.
pub async fn ingest_paths(
    pipeline: &RagPipeline,
    paths: &[PathBuf],
) -> AppResult<Vec<IngestSummary>> {
    let files = collect_files(paths)?;
    tracing::info!("Ingesting {} files", files.len());

    let mut summaries = Vec::with_capacity(files.len());
    for file in &files {
        if let Some(request) = read_source(file)? {
            summaries.push(pipeline.ingest(request).await?);
        }
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_files_walks_directories() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("nested")).unwrap();
        std::fs::create_dir_all(temp.path().join(".git")).unwrap();
        std::fs::write(temp.path().join("b.txt"), "b").unwrap();
        std::fs::write(temp.path().join("nested/a.md"), "a").unwrap();
        std::fs::write(temp.path().join(".git/config"), "x").unwrap();
        std::fs::write(temp.path().join(".hidden"), "x").unwrap();

        let files = collect_files(&[temp.path().to_path_buf()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(temp.path()).unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names.len(), 2);
        assert!(names.contains(&"b.txt".to_string()));
        assert!(names.iter().any(|n| n.ends_with("a.md")));
    }

    #[test]
    fn test_collect_files_missing_path() {
        let result = collect_files(&[PathBuf::from("/definitely/not/here")]);
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_read_source_skips_binary() {
        let temp = TempDir::new().unwrap();
        let text = temp.path().join("sky.txt");
        let binary = temp.path().join("blob.bin");
        std::fs::write(&text, "The sky is blue.").unwrap();
        std::fs::write(&binary, [0xff, 0xfe, 0x00]).unwrap();

        let request = read_source(&text).unwrap().unwrap();
        assert_eq!(request.content, "The sky is blue.");
        assert_eq!(request.id.as_deref(), Some(text.display().to_string().as_str()));
        assert_eq!(request.source, DataSource::File);

        assert!(read_source(&binary).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ingest_paths() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("sky.txt"), "The sky is blue.").unwrap();
        std::fs::write(temp.path().join("grass.txt"), "Grass is green.").unwrap();

        let pipeline = RagPipeline::builder().build().unwrap();
        let summaries = ingest_paths(&pipeline, &[temp.path().to_path_buf()])
            .await
            .unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(pipeline.stats().await.unwrap().documents, 2);
    }
}
