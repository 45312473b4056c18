//! Retrieval-augmented answering over the current vector store.

use crate::embeddings::Embedder;
use crate::error::{CodescribeError, Result};
use crate::llm::LanguageModel;
use crate::vector_store::{ScoredRecord, VectorStore};
use std::sync::Arc;

const PROMPT_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Embed the question, retrieve, stuff the hits into one prompt, generate.
pub struct AnswerPipeline {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LanguageModel>,
    k: usize,
}

impl AnswerPipeline {
    /// Fails with `NotReady` when no store has been built.
    pub fn new(
        store: Option<Arc<VectorStore>>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LanguageModel>,
        k: usize,
    ) -> Result<Self> {
        let store = store.ok_or(CodescribeError::NotReady)?;
        Ok(Self {
            store,
            embedder,
            llm,
            k,
        })
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredRecord>> {
        let query = self.embedder.embed_query(question).await?;
        Ok(self.store.similarity_search(&query, self.k))
    }

    /// Answer `question` with the model's text, unmodified.
    pub async fn answer(&self, question: &str) -> Result<String> {
        let hits = self.retrieve(question).await?;
        log::debug!("Retrieved {} chunks for question", hits.len());

        let context: Vec<&str> = hits.iter().map(|h| h.record.text.as_str()).collect();
        let prompt = build_prompt(&context, question);
        self.llm.generate(&prompt).await
    }
}

pub fn build_prompt(context: &[&str], question: &str) -> String {
    format!(
        "{}\n\n{}\n\nQuestion: {}\nHelpful Answer:",
        PROMPT_PREAMBLE,
        context.join("\n\n"),
        question
    )
}
