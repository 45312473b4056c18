pub mod openai;

pub use openai::OpenAIEmbedder;

use crate::error::Result;
use async_trait::async_trait;

/// Maps text to fixed-size vectors
///
/// One instance is shared by analysis and querying for the whole process.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed many texts, one vector per input in the same order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single question.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    fn dimensions(&self) -> usize;
}
