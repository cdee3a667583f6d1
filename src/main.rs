mod config;
mod error;
mod llm;
mod research;
mod search;
mod session;

use std::sync::Arc;

use anyhow::Context;
use tokio::io::BufReader;
use tracing::info;

use config::Config;
use llm::LlmClient;
use research::ResearchEngine;
use search::SerperClient;
use session::Session;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load env
    let config = Config::from_env()?;

    // Logs go to stderr; stdout is the conversation
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_writer(std::io::stderr)
        .init();

    // One HTTP client shared by both services
    let http = reqwest::Client::builder()
        .timeout(config.research.service_timeout)
        .build()
        .context("Failed to create HTTP client")?;

    // Init LLM client
    let llm = Arc::new(LlmClient::new(&config.llm, http.clone()));
    info!(model = %config.llm.model, "LLM client initialized");

    // Init search client
    let search = Arc::new(SerperClient::new(&config.search, http));
    info!(gl = %config.search.gl, hl = %config.search.hl, "Search client initialized");

    let engine = ResearchEngine::new(llm, search, &config.research);

    // Read queries until the exit sentinel or EOF
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    Session::new(&engine).run(stdin, &mut stdout).await?;

    Ok(())
}
