//! In-memory vector index over embedded chunks, with an optional SQLite
//! snapshot so a restarted process can answer questions without re-analysis.

use crate::db::{migrate, Db};
use crate::embeddings::Embedder;
use crate::error::{CodescribeError, Result};
use crate::ingest::{ContentKind, DocumentChunk, LanguageHint};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Metadata carried by every record
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMetadata {
    pub source_path: String,
    pub language: LanguageHint,
    pub content_kind: ContentKind,
    /// Position of the chunk within the store's build order
    pub chunk_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub record_id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: RecordMetadata,
}

/// A search hit
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: VectorRecord,
    pub score: f32,
    /// 1-based rank
    pub rank: usize,
}

/// Summary of a persisted store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreInfo {
    pub repo_url: Option<String>,
    pub analyzed_at: Option<String>,
    pub record_count: usize,
}

#[derive(Debug, Default)]
pub struct VectorStore {
    records: Vec<VectorRecord>,
}

impl VectorStore {
    pub fn from_records(records: Vec<VectorRecord>) -> Self {
        Self { records }
    }

    /// Embed all chunk texts in one bulk call and index them.
    pub async fn from_documents(chunks: Vec<DocumentChunk>, embedder: &dyn Embedder) -> Result<Self> {
        log::info!("Creating vector store from {} chunks", chunks.len());
        if chunks.is_empty() {
            return Ok(Self::default());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_documents(&texts).await?;

        if vectors.len() != chunks.len() {
            return Err(CodescribeError::Index(format!(
                "Embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let records = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(index, (chunk, vector))| VectorRecord {
                record_id: record_id(&chunk.source_path, index, &chunk.text),
                vector,
                text: chunk.text,
                metadata: RecordMetadata {
                    source_path: chunk.source_path,
                    language: chunk.language,
                    content_kind: chunk.content_kind,
                    chunk_index: index,
                },
            })
            .collect();

        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[VectorRecord] {
        &self.records
    }

    /// Top-`k` records by cosine similarity, best first.
    ///
    /// Records whose dimension differs from the query are skipped.
    pub fn similarity_search(&self, query: &[f32], k: usize) -> Vec<ScoredRecord> {
        let mut scored: Vec<(f32, &VectorRecord)> = self
            .records
            .iter()
            .filter(|r| r.vector.len() == query.len())
            .map(|r| (cosine_similarity(query, &r.vector), r))
            .collect();

        // stable sort keeps build order among equal scores
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .enumerate()
            .map(|(i, (score, record))| ScoredRecord {
                record: record.clone(),
                score,
                rank: i + 1,
            })
            .collect()
    }

    /// Replace the persisted snapshot with this store in one transaction.
    pub async fn persist(&self, db: &Db, repo_url: &str) -> Result<()> {
        let records = self.records.clone();
        let repo_url = repo_url.to_string();
        let analyzed_at = chrono::Utc::now().to_rfc3339();

        let count = db
            .with_connection(move |conn| {
                migrate::run_migrations(conn)?;

                let tx = conn.transaction()?;
                tx.execute("DELETE FROM vector_records", [])?;
                tx.execute("DELETE FROM store_meta", [])?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO vector_records
                         (record_id, position, source_path, language, content_kind, chunk_index, chunk_text, embedding)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    )?;
                    for (position, record) in records.iter().enumerate() {
                        stmt.execute(params![
                            record.record_id,
                            position as i64,
                            record.metadata.source_path,
                            record.metadata.language.as_str(),
                            record.metadata.content_kind.as_str(),
                            record.metadata.chunk_index as i64,
                            record.text,
                            encode_embedding(&record.vector),
                        ])?;
                    }

                    let mut meta = tx.prepare("INSERT INTO store_meta (key, value) VALUES (?1, ?2)")?;
                    meta.execute(params!["repo_url", repo_url])?;
                    meta.execute(params!["analyzed_at", analyzed_at])?;
                    meta.execute(params!["record_count", records.len().to_string()])?;
                }
                tx.commit()?;
                Ok(records.len())
            })
            .await?;

        log::info!("Persisted {} records to {}", count, db.path().display());
        Ok(())
    }

    /// Restore the persisted snapshot, or None when nothing was persisted.
    ///
    /// A snapshot of an analysis that produced no chunks restores as an empty
    /// store; the `record_count` meta row tells it apart from no snapshot.
    pub async fn load(db: &Db) -> Result<Option<Self>> {
        let info = match Self::persisted_info(db).await? {
            Some(info) => info,
            None => return Ok(None),
        };

        let records = db
            .with_connection(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT record_id, source_path, language, content_kind, chunk_index, chunk_text, embedding
                     FROM vector_records ORDER BY position",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, Vec<u8>>(6)?,
                    ))
                })?;

                let mut records = Vec::new();
                for row in rows {
                    let (record_id, source_path, language, kind, chunk_index, text, blob) = row?;
                    let vector = parse_embedding(&blob).ok_or_else(|| {
                        CodescribeError::Index(format!("Corrupt embedding for record {}", record_id))
                    })?;
                    records.push(VectorRecord {
                        record_id,
                        vector,
                        text,
                        metadata: RecordMetadata {
                            source_path,
                            language: LanguageHint::from_name(&language),
                            content_kind: ContentKind::from_name(&kind),
                            chunk_index: chunk_index.max(0) as usize,
                        },
                    });
                }
                Ok(records)
            })
            .await?;

        if records.len() != info.record_count {
            return Err(CodescribeError::Index(format!(
                "Snapshot lists {} records but holds {}",
                info.record_count,
                records.len()
            )));
        }

        log::info!(
            "Restored {} records for {} from {}",
            records.len(),
            info.repo_url.as_deref().unwrap_or("unknown repository"),
            db.path().display()
        );
        Ok(Some(Self { records }))
    }

    /// Read the `store_meta` summary of the persisted snapshot.
    pub async fn persisted_info(db: &Db) -> Result<Option<StoreInfo>> {
        if !db.path().exists() {
            return Ok(None);
        }

        db.with_connection(|conn| {
            migrate::run_migrations(conn)?;

            let get = |key: &str| -> Result<Option<String>> {
                Ok(conn
                    .query_row("SELECT value FROM store_meta WHERE key = ?1", [key], |row| row.get(0))
                    .optional()?)
            };

            let record_count = match get("record_count")? {
                Some(count) => count.parse::<usize>().map_err(|e| {
                    CodescribeError::Index(format!("Invalid record_count '{}': {}", count, e))
                })?,
                None => return Ok(None),
            };

            Ok(Some(StoreInfo {
                repo_url: get("repo_url")?,
                analyzed_at: get("analyzed_at")?,
                record_count,
            }))
        })
        .await
    }
}

fn record_id(source_path: &str, index: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_path.as_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Encode a vector as a little-endian f32 BLOB
fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Parse a little-endian f32 BLOB; None if the length is not a multiple of 4
fn parse_embedding(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }

    blob.chunks_exact(4)
        .map(|chunk| <[u8; 4]>::try_from(chunk).ok().map(f32::from_le_bytes))
        .collect()
}

/// Cosine similarity; 0.0 when either vector has zero magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
