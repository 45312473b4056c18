use anyhow::Result;
use codescribe::embeddings::OpenAIEmbedder;
use codescribe::llm::OpenAICompatibleLlm;
use codescribe::server::HttpServer;
use codescribe::{CodebaseService, Config};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");

    match command {
        "serve" => run_http_server().await?,
        other => anyhow::bail!("Unknown command '{}'. Usage: codescribe [serve]", other),
    }

    Ok(())
}

async fn run_http_server() -> Result<()> {
    log::info!("Starting CodeScribe AI Core v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;

    // one embedder and one model client for the whole process
    let embedder = Arc::new(OpenAIEmbedder::from_config(&config.embeddings)?);
    let llm = Arc::new(OpenAICompatibleLlm::from_config(&config.llm)?);

    if config.vector_store.persist {
        log::info!(
            "Vector store persistence enabled at {}",
            config.vector_db_path().display()
        );
    }

    let service = Arc::new(CodebaseService::new(config, embedder, llm));
    HttpServer::new(service).run().await?;

    Ok(())
}
