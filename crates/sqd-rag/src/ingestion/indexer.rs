//! Directory indexing: read, chunk, embed and upload

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use walkdir::WalkDir;

use super::chunker::TextChunker;
use crate::config::IndexingConfig;
use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, VectorSearchProvider};
use crate::types::{FileType, IndexDocument};

/// Outcome of an indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Files that produced at least one chunk
    pub files_indexed: usize,
    /// Files skipped (unsupported type, not UTF-8, or blank)
    pub skipped: Vec<PathBuf>,
    /// Documents accepted by the search service
    pub chunks_uploaded: usize,
    /// Wall time in milliseconds
    pub elapsed_ms: u64,
}

/// A chunk waiting for its embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChunk {
    pub id: String,
    pub title: String,
    pub content: String,
}

/// Uploads the text files under a directory to the search index
pub struct Indexer {
    embedder: Arc<dyn EmbeddingProvider>,
    search: Arc<dyn VectorSearchProvider>,
    chunker: TextChunker,
    batch_size: usize,
}

impl Indexer {
    pub fn new(
        config: &IndexingConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        search: Arc<dyn VectorSearchProvider>,
    ) -> Self {
        Self {
            embedder,
            search,
            chunker: TextChunker::new(config.tokens_per_chunk, config.token_overlap),
            batch_size: config.upload_batch_size.max(1),
        }
    }

    /// Index every supported file under `dir`
    pub async fn index_directory(&self, dir: &Path) -> Result<IndexReport> {
        self.index_directory_with_progress(dir, |_, _| {}).await
    }

    /// Index every supported file under `dir`, reporting `(uploaded, total)` chunk counts
    pub async fn index_directory_with_progress<F>(
        &self,
        dir: &Path,
        mut on_progress: F,
    ) -> Result<IndexReport>
    where
        F: FnMut(usize, usize),
    {
        let start = Instant::now();

        // Directory walk and file reads are sync, run them off the async workers
        let chunker = self.chunker.clone();
        let root = dir.to_path_buf();
        let (chunks, mut report) =
            tokio::task::spawn_blocking(move || scan_directory(&chunker, &root))
                .await
                .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??;

        tracing::info!(
            "Indexing {} chunks from {} files in {} ({} via {}, {} dims)",
            chunks.len(),
            report.files_indexed,
            dir.display(),
            self.search.name(),
            self.embedder.name(),
            self.embedder.dimensions()
        );
        on_progress(0, chunks.len());

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(Error::internal(format!(
                    "Embedding provider returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                )));
            }

            let documents: Vec<IndexDocument> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| IndexDocument {
                    id: chunk.id.clone(),
                    content: chunk.content.clone(),
                    title: chunk.title.clone(),
                    vector,
                })
                .collect();

            report.chunks_uploaded += self.search.upload(&documents).await?;
            on_progress(report.chunks_uploaded, chunks.len());
        }

        report.elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Indexed {} chunks in {}ms ({} files skipped)",
            report.chunks_uploaded,
            report.elapsed_ms,
            report.skipped.len()
        );
        Ok(report)
    }

    /// Read and chunk every supported file, without any network call
    pub fn collect_chunks(&self, dir: &Path) -> Result<(Vec<PendingChunk>, IndexReport)> {
        scan_directory(&self.chunker, dir)
    }
}

fn scan_directory(chunker: &TextChunker, dir: &Path) -> Result<(Vec<PendingChunk>, IndexReport)> {
    if !dir.is_dir() {
        return Err(Error::input(format!(
            "Data directory {} does not exist",
            dir.display()
        )));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(Error::input(format!(
            "Data directory {} is empty",
            dir.display()
        )));
    }

    let mut report = IndexReport::default();
    let mut chunks = Vec::new();

    for path in files {
        let title = relative_title(dir, &path);
        let file_type = path
            .extension()
            .and_then(|e| e.to_str())
            .map(FileType::from_extension)
            .unwrap_or(FileType::Unknown);

        if !file_type.is_supported() {
            tracing::debug!("Skipping unsupported file {}", title);
            report.skipped.push(path);
            continue;
        }

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                tracing::warn!("Skipping non-UTF-8 file {}", title);
                report.skipped.push(path);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let file_chunks = chunker.chunk(&text);
        if file_chunks.is_empty() {
            report.skipped.push(path);
            continue;
        }

        let prefix = document_prefix(&title);
        chunks.extend(file_chunks.into_iter().map(|chunk| PendingChunk {
            id: format!("{}-{}", prefix, chunk.index),
            title: title.clone(),
            content: chunk.content,
        }));
        report.files_indexed += 1;
    }

    if chunks.is_empty() {
        return Err(Error::input(format!(
            "No indexable text found in {}",
            dir.display()
        )));
    }

    Ok((chunks, report))
}

/// Path relative to the data directory, with `/` separators
fn relative_title(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Stable id prefix so re-indexing the same file overwrites its chunks
fn document_prefix(title: &str) -> String {
    let digest = Sha256::digest(title.as_bytes());
    hex::encode(digest)[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamKind;
    use crate::providers::mock::{MockEmbedder, MockSearch};
    use std::fs;
    use tempfile::TempDir;

    fn indexer(search: &MockSearch, batch: usize) -> Indexer {
        let config = IndexingConfig {
            tokens_per_chunk: 5,
            token_overlap: 0,
            upload_batch_size: batch,
            ..IndexingConfig::default()
        };
        Indexer::new(&config, Arc::new(MockEmbedder::default()), Arc::new(search.clone()))
    }

    #[tokio::test]
    async fn test_missing_directory_is_input_error() {
        let search = MockSearch::default();
        let err = indexer(&search, 10)
            .index_directory(Path::new("/definitely/not/here"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }

    #[tokio::test]
    async fn test_empty_directory_is_input_error() {
        let dir = TempDir::new().unwrap();
        let search = MockSearch::default();
        let err = indexer(&search, 10).index_directory(dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::Input(ref m) if m.contains("empty")));
    }

    #[tokio::test]
    async fn test_indexes_supported_files_in_batches() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("team")).unwrap();
        fs::write(dir.path().join("team/ceo.md"), "Jane Doe is CEO. She joined in 2019.").unwrap();
        fs::write(dir.path().join("about.txt"), "SQD builds tools.").unwrap();
        fs::write(dir.path().join("logo.png"), [0u8, 1, 2]).unwrap();

        let search = MockSearch::default();
        let mut progress = Vec::new();
        let report = indexer(&search, 2)
            .index_directory_with_progress(dir.path(), |done, total| progress.push((done, total)))
            .await
            .unwrap();

        assert_eq!(report.files_indexed, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.chunks_uploaded, 3);
        assert_eq!(progress.first(), Some(&(0, 3)));
        assert_eq!(progress.last(), Some(&(3, 3)));

        let uploaded = search.uploaded();
        assert_eq!(uploaded[0].title, "about.txt");
        assert_eq!(uploaded[1].title, "team/ceo.md");
        assert_eq!(uploaded[1].content, "Jane Doe is CEO.");
        assert!(uploaded[1].id.ends_with("-0"));
        assert!(uploaded[2].id.ends_with("-1"));
        assert!(!uploaded[0].vector.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_blocking_scan_skips_non_utf8_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.md"), "Jane Doe is CEO.").unwrap();
        fs::write(dir.path().join("latin1.txt"), [0x63u8, 0x61, 0x66, 0xe9]).unwrap();

        let search = MockSearch::default();
        let report = indexer(&search, 10).index_directory(dir.path()).await.unwrap();

        assert_eq!(report.files_indexed, 1);
        assert_eq!(report.skipped, vec![dir.path().join("latin1.txt")]);
        assert_eq!(search.uploaded().len(), 1);
    }

    #[test]
    fn test_ids_stable_across_runs() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.md"), "one two three").unwrap();

        let search = MockSearch::default();
        let (first, _) = indexer(&search, 10).collect_chunks(dir.path()).unwrap();
        let (second, _) = indexer(&search, 10).collect_chunks(dir.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].id, format!("{}-0", document_prefix("a.md")));
        assert_eq!(document_prefix("a.md").len(), 16);
    }

    #[tokio::test]
    async fn test_upload_failure_propagates() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.md"), "text").unwrap();

        let search = MockSearch::failing(UpstreamKind::AuthFailure);
        let err = indexer(&search, 10).index_directory(dir.path()).await.unwrap_err();
        assert_eq!(err.upstream_kind(), Some(UpstreamKind::AuthFailure));
    }
}
