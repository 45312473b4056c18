pub mod language;
pub mod segmenter;
pub mod splitter;
pub mod walker;

pub use language::LanguageHint;
pub use segmenter::{segment_source, ContentKind, Segment};
pub use splitter::{RecursiveCharacterSplitter, CODE_SEPARATORS};
pub use walker::{discover_files, FileMetadata};

use crate::config::IngestConfig;
use crate::error::Result;
use std::path::Path;

/// A slice of one source file, the unit of embedding and retrieval
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub text: String,
    /// Path relative to the repository root, `/`-separated
    pub source_path: String,
    pub language: LanguageHint,
    pub content_kind: ContentKind,
}

/// Load every matching file under `root` and segment it.
///
/// Files that cannot be read as UTF-8 are dropped.
pub fn load_documents(root: &Path, config: &IngestConfig) -> Result<Vec<DocumentChunk>> {
    let files = discover_files(root, &config.suffixes)?;
    let mut chunks = Vec::new();
    let mut skipped = 0usize;

    for file in &files {
        let content = match std::fs::read_to_string(&file.absolute_path) {
            Ok(c) => c,
            Err(e) => {
                log::debug!("Skipping {}: {}", file.relative_path, e);
                skipped += 1;
                continue;
            }
        };

        let language = LanguageHint::from_extension(&file.extension);
        for segment in segment_source(&content, language, config.parser_threshold) {
            chunks.push(DocumentChunk {
                text: segment.text,
                source_path: file.relative_path.clone(),
                language,
                content_kind: segment.kind,
            });
        }
    }

    if skipped > 0 {
        log::info!("Skipped {} unreadable files", skipped);
    }
    log::info!(
        "Loaded {} documents from {} files",
        chunks.len(),
        files.len() - skipped
    );

    Ok(chunks)
}

/// Re-split every document into overlapping windows, keeping its metadata.
pub fn split_documents(
    documents: &[DocumentChunk],
    splitter: &RecursiveCharacterSplitter,
) -> Vec<DocumentChunk> {
    log::info!("Splitting {} documents", documents.len());

    let split: Vec<DocumentChunk> = documents
        .iter()
        .flat_map(|doc| {
            splitter
                .split_text(&doc.text)
                .into_iter()
                .map(move |text| DocumentChunk {
                    text,
                    source_path: doc.source_path.clone(),
                    language: doc.language,
                    content_kind: doc.content_kind,
                })
        })
        .collect();

    log::info!("Created {} chunks", split.len());
    split
}
