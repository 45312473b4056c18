//! Owns the current answer pipeline and runs repository analyses.

use crate::config::Config;
use crate::db::Db;
use crate::embeddings::Embedder;
use crate::error::{CodescribeError, Result};
use crate::fetch::{shallow_clone, CloneWorkspace};
use crate::ingest::{load_documents, split_documents, DocumentChunk, RecursiveCharacterSplitter};
use crate::llm::LanguageModel;
use crate::pipeline::AnswerPipeline;
use crate::vector_store::{StoreInfo, VectorStore};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Uninitialized,
    Analyzing,
    Ready,
}

/// Counts from one successful analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    pub repo_url: String,
    pub documents: usize,
    pub chunks: usize,
}

/// Point-in-time view of the service for health reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStatus {
    pub state: ServiceState,
    /// Records in the store currently answering queries
    pub records: Option<usize>,
    /// Persisted snapshot, when persistence is on and one exists
    pub snapshot: Option<StoreInfo>,
}

/// At most one analysis runs at a time. A new pipeline replaces the current
/// one only when its analysis succeeds, so queries keep using the previous
/// store meanwhile.
pub struct CodebaseService {
    config: Config,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LanguageModel>,
    db: Option<Db>,
    pipeline: RwLock<Option<Arc<AnswerPipeline>>>,
    analysis: Mutex<()>,
}

impl CodebaseService {
    pub fn new(config: Config, embedder: Arc<dyn Embedder>, llm: Arc<dyn LanguageModel>) -> Self {
        let db = config
            .vector_store
            .persist
            .then(|| Db::new(config.vector_db_path()));

        Self {
            config,
            embedder,
            llm,
            db,
            pipeline: RwLock::new(None),
            analysis: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A persisted snapshot counts as ready even before the first query
    /// restores it.
    pub async fn status(&self) -> ServiceStatus {
        let analyzing = self.analysis.try_lock().is_err();
        let records = self.record_count();

        let snapshot = match &self.db {
            Some(db) if records.is_none() => VectorStore::persisted_info(db).await.unwrap_or_else(|e| {
                log::warn!("Failed to read snapshot info from {}: {}", db.path().display(), e);
                None
            }),
            _ => None,
        };

        let state = if analyzing {
            ServiceState::Analyzing
        } else if records.is_some() || snapshot.is_some() {
            ServiceState::Ready
        } else {
            ServiceState::Uninitialized
        };

        ServiceStatus {
            state,
            records,
            snapshot,
        }
    }

    pub async fn state(&self) -> ServiceState {
        self.status().await.state
    }

    /// Clone, load, split, embed and index `repo_url`, then swap the new
    /// pipeline in. Fails with `Busy` if another analysis is running.
    pub async fn analyze(&self, repo_url: &str) -> Result<AnalysisReport> {
        let _guard = self.analysis.try_lock().map_err(|_| CodescribeError::Busy)?;
        log::info!("Starting analysis for repository: {}", repo_url);

        let result = self.build_pipeline(repo_url).await;
        match result {
            Ok((pipeline, report)) => {
                *self.pipeline.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(pipeline));
                log::info!(
                    "Success: {} chunks from {} documents indexed for {}",
                    report.chunks,
                    report.documents,
                    repo_url
                );
                Ok(report)
            }
            Err(e) => {
                log::error!("Analysis of {} failed: {}", repo_url, e);
                Err(e)
            }
        }
    }

    async fn build_pipeline(&self, repo_url: &str) -> Result<(AnswerPipeline, AnalysisReport)> {
        let url = repo_url.to_string();
        let config = self.config.clone();
        let (documents, chunks) = tokio::task::spawn_blocking(move || fetch_and_split(&url, &config))
            .await
            .map_err(|e| CodescribeError::Load(format!("Loading task failed: {}", e)))??;

        let chunk_count = chunks.len();
        let store = VectorStore::from_documents(chunks, self.embedder.as_ref()).await?;
        if let Some(db) = &self.db {
            store.persist(db, repo_url).await?;
        }

        let pipeline = AnswerPipeline::new(
            Some(Arc::new(store)),
            self.embedder.clone(),
            self.llm.clone(),
            self.config.retrieval.top_k,
        )?;

        Ok((
            pipeline,
            AnalysisReport {
                repo_url: repo_url.to_string(),
                documents,
                chunks: chunk_count,
            },
        ))
    }

    /// Answer `question` from the current pipeline. Fails with `NotReady`
    /// before the first successful analysis.
    pub async fn query(&self, question: &str) -> Result<String> {
        let pipeline = self.pipeline_or_restore().await?;
        log::info!("Answering question: {}", question);
        pipeline.answer(question).await
    }

    /// Number of records in the current store, if any.
    pub fn record_count(&self) -> Option<usize> {
        self.current().map(|p| p.store().len())
    }

    fn current(&self) -> Option<Arc<AnswerPipeline>> {
        self.pipeline
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn pipeline_or_restore(&self) -> Result<Arc<AnswerPipeline>> {
        if let Some(pipeline) = self.current() {
            return Ok(pipeline);
        }

        let db = self.db.as_ref().ok_or(CodescribeError::NotReady)?;
        let store = VectorStore::load(db).await?.ok_or(CodescribeError::NotReady)?;
        let restored = Arc::new(AnswerPipeline::new(
            Some(Arc::new(store)),
            self.embedder.clone(),
            self.llm.clone(),
            self.config.retrieval.top_k,
        )?);

        // an analysis may have finished while the snapshot was loading
        let mut slot = self.pipeline.write().unwrap_or_else(PoisonError::into_inner);
        Ok(slot.get_or_insert(restored).clone())
    }
}

/// Blocking part of an analysis. The clone workspace is removed before
/// returning, whatever the outcome.
fn fetch_and_split(repo_url: &str, config: &Config) -> Result<(usize, Vec<DocumentChunk>)> {
    let splitter = RecursiveCharacterSplitter::for_code(&config.ingest)?;
    let mut workspace = CloneWorkspace::create(&config.repository.workdir_prefix)?;

    let loaded = shallow_clone(repo_url, workspace.path(), config.repository.clone_depth).and_then(|()| {
        log::info!("Loading documents from {}", workspace.path().display());
        load_documents(workspace.path(), &config.ingest)
    });

    if let Err(e) = workspace.remove() {
        log::warn!("Failed to remove workspace {}: {}", workspace.path().display(), e);
    }

    let documents = loaded?;
    let chunks = split_documents(&documents, &splitter);
    Ok((documents.len(), chunks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::init_repo_with;
    use async_trait::async_trait;
    use std::path::Path;
    use tempfile::TempDir;

    /// Bag-of-words hashed into a small fixed vector
    struct HashingEmbedder;

    fn hash_embed(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; 16];
        for word in text.split_whitespace() {
            let bucket = word.bytes().fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
            v[bucket % 16] += 1.0;
        }
        v
    }

    #[async_trait]
    impl Embedder for HashingEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| hash_embed(t)).collect())
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
            Ok(hash_embed(text))
        }

        fn dimensions(&self) -> usize {
            16
        }
    }

    /// Answers with the first line of context it was given
    struct EchoLlm;

    #[async_trait]
    impl LanguageModel for EchoLlm {
        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(prompt.lines().nth(2).unwrap_or("").to_string())
        }
    }

    fn test_config(root: &Path) -> Config {
        let mut config = Config::default();
        config.repository.workdir_prefix = root.join("repo_data");
        config.repository.clone_depth = 0;
        config.vector_store.db_path = root.join("vector_db").join("store.db");
        config
    }

    fn service(config: Config) -> CodebaseService {
        CodebaseService::new(config, Arc::new(HashingEmbedder), Arc::new(EchoLlm))
    }

    fn origin(root: &Path) -> String {
        let origin = root.join("origin");
        init_repo_with(
            &origin,
            &[
                ("README.md", "# Demo\n\nThe demo project greets the user.\n"),
                ("app/main.py", "def greet():\n    print('hello')\n"),
                ("web/index.js", "export function add(a, b) {\n  return a + b;\n}\n"),
                ("assets/logo.svg", "<svg/>"),
            ],
        );
        origin.to_string_lossy().into_owned()
    }

    fn leftover_workspaces(root: &Path) -> usize {
        std::fs::read_dir(root)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("repo_data_"))
            .count()
    }

    #[tokio::test]
    async fn test_query_before_analyze_is_not_ready() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(test_config(temp_dir.path()));

        assert_eq!(service.state().await, ServiceState::Uninitialized);
        let err = service.query("anything?").await.unwrap_err();
        assert!(matches!(err, CodescribeError::NotReady));
    }

    #[tokio::test]
    async fn test_analyze_then_query() {
        let temp_dir = TempDir::new().unwrap();
        let url = origin(temp_dir.path());
        let service = service(test_config(temp_dir.path()));

        let report = service.analyze(&url).await.unwrap();
        assert_eq!(report.documents, 3);
        assert_eq!(report.chunks, 3);
        assert_eq!(service.state().await, ServiceState::Ready);
        assert_eq!(leftover_workspaces(temp_dir.path()), 0);

        let answer = service.query("What does the demo project do?").await.unwrap();
        assert!(!answer.is_empty());
    }

    #[tokio::test]
    async fn test_reanalysis_is_stable() {
        let temp_dir = TempDir::new().unwrap();
        let url = origin(temp_dir.path());
        let service = service(test_config(temp_dir.path()));

        let first = service.analyze(&url).await.unwrap();
        let count = service.record_count();
        let second = service.analyze(&url).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(service.record_count(), count);
    }

    #[tokio::test]
    async fn test_bad_url_fails_and_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(test_config(temp_dir.path()));
        let missing = temp_dir.path().join("no-such-repo");

        let err = service.analyze(missing.to_str().unwrap()).await.unwrap_err();

        assert!(matches!(err, CodescribeError::Fetch(_)));
        assert_eq!(leftover_workspaces(temp_dir.path()), 0);
        assert_eq!(service.state().await, ServiceState::Uninitialized);
    }

    #[tokio::test]
    async fn test_failed_analysis_keeps_previous_store() {
        let temp_dir = TempDir::new().unwrap();
        let url = origin(temp_dir.path());
        let service = service(test_config(temp_dir.path()));

        service.analyze(&url).await.unwrap();
        let count = service.record_count();
        let missing = temp_dir.path().join("no-such-repo");
        assert!(service.analyze(missing.to_str().unwrap()).await.is_err());

        assert_eq!(service.record_count(), count);
        assert!(service.query("greet?").await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_analysis_is_busy() {
        let temp_dir = TempDir::new().unwrap();
        let url = origin(temp_dir.path());
        let service = service(test_config(temp_dir.path()));

        let _running = service.analysis.try_lock().unwrap();
        assert_eq!(service.state().await, ServiceState::Analyzing);

        let err = service.analyze(&url).await.unwrap_err();
        assert!(matches!(err, CodescribeError::Busy));
    }

    #[tokio::test]
    async fn test_persisted_store_restored_on_query() {
        let temp_dir = TempDir::new().unwrap();
        let url = origin(temp_dir.path());
        let mut config = test_config(temp_dir.path());
        config.vector_store.persist = true;

        service(config.clone()).analyze(&url).await.unwrap();

        let restarted = service(config);
        assert_eq!(restarted.record_count(), None);
        let status = restarted.status().await;
        assert_eq!(status.state, ServiceState::Ready);
        assert_eq!(status.snapshot.map(|info| info.record_count), Some(3));

        assert!(restarted.query("What does greet print?").await.is_ok());
        assert_eq!(restarted.record_count(), Some(3));
    }

    #[tokio::test]
    async fn test_empty_persisted_store_is_queryable_after_restart() {
        let temp_dir = TempDir::new().unwrap();
        let origin = temp_dir.path().join("origin");
        init_repo_with(&origin, &[("assets/logo.svg", "<svg/>")]);
        let url = origin.to_string_lossy().into_owned();
        let mut config = test_config(temp_dir.path());
        config.vector_store.persist = true;

        let report = service(config.clone()).analyze(&url).await.unwrap();
        assert_eq!(report.chunks, 0);

        let restarted = service(config);
        assert_eq!(restarted.state().await, ServiceState::Ready);
        assert!(restarted.query("Is there any code?").await.is_ok());
        assert_eq!(restarted.record_count(), Some(0));
    }

    #[tokio::test]
    async fn test_analyze_local_repository_with_default_depth() {
        let temp_dir = TempDir::new().unwrap();
        let url = origin(temp_dir.path());
        let mut config = Config::default();
        config.repository.workdir_prefix = temp_dir.path().join("repo_data");
        assert_eq!(config.repository.clone_depth, 1);

        let report = service(config).analyze(&url).await.unwrap();
        assert_eq!(report.documents, 3);

        let file_url = format!("file://{}", url);
        let mut config = Config::default();
        config.repository.workdir_prefix = temp_dir.path().join("repo_data");
        let report = service(config).analyze(&file_url).await.unwrap();
        assert_eq!(report.chunks, 3);
        assert_eq!(leftover_workspaces(temp_dir.path()), 0);
    }
}
