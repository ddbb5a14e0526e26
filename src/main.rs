mod agent;
mod cli;
mod config;
mod context;
mod conversation;
mod error;
mod llm;
mod tools;
mod types;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent::Agent;
use cli::Cli;
use config::AppConfig;
use context::AgentContext;
use tools::create_default_registry;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout carries only the answer
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sales_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let input = cli.input()?;

    // Auto-generate config file on first run
    let config_path = AppConfig::config_path()?;
    if !config_path.exists() {
        let path = AppConfig::save_default()?;
        info!("Created default config: {}", path.display());
    }

    let mut config = AppConfig::load()?;
    cli.apply(&mut config);
    info!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        dataset = %config.data.dataset_path.display(),
        "loaded configuration"
    );

    let llm = llm::create_provider(
        &config.llm.provider,
        config.api_key()?,
        config.llm.api_base.clone(),
    )?;
    let ctx = Arc::new(AgentContext::new(Arc::from(llm), config));
    let registry = Arc::new(create_default_registry(ctx.clone())?);
    info!(tools = registry.len(), names = ?registry.names(), "registered tools");
    let agent = Agent::new(ctx, registry);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling run");
                cancel.cancel();
            }
        });
    }

    if cli.transcript {
        let run = agent.run_with_transcript(input, &cancel).await?;
        println!("{}", run.answer);
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        println!("{}", agent.run(input, &cancel).await?);
    }

    Ok(())
}
