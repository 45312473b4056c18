use anyhow::Result;
use clap::Parser;
use codescribe::embeddings::OpenAIEmbedder;
use codescribe::llm::OpenAICompatibleLlm;
use codescribe::{CodebaseService, Config};
use std::sync::Arc;
use std::time::Instant;

/// Analyze a repository and answer questions about it without the HTTP server
#[derive(Parser, Debug)]
#[command(name = "ask", version)]
struct Args {
    /// Repository to clone and index
    #[arg(long)]
    repo_url: String,

    /// Question to answer; repeat for several
    #[arg(long = "question", short = 'q', required = true)]
    questions: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();
    let config = Config::load()?;

    let embedder = Arc::new(OpenAIEmbedder::from_config(&config.embeddings)?);
    let llm = Arc::new(OpenAICompatibleLlm::from_config(&config.llm)?);
    let service = CodebaseService::new(config, embedder, llm);

    let start = Instant::now();
    let report = service.analyze(&args.repo_url).await?;
    println!(
        "Indexed {} chunks from {} documents in {:.1}s",
        report.chunks,
        report.documents,
        start.elapsed().as_secs_f64()
    );

    for question in &args.questions {
        let answer = service.query(question).await?;
        println!("\nQ: {}\nA: {}", question, answer.trim());
    }

    Ok(())
}
