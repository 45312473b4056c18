pub mod cache;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod llm;
pub mod pipeline;
pub mod server;
pub mod service;
pub mod vector_store;

pub use config::Config;
pub use error::{CodescribeError, Result};
pub use service::{AnalysisReport, CodebaseService, ServiceState, ServiceStatus};
