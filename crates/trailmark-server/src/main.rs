//! trailmark binary

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use trailmark_extras::{init_tracing, load_dotenv, Environment, TokenVerifier};
use trailmark_server::{build_app, AppContext, ServerConfig};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    load_dotenv();
    let cli = Cli::parse();
    let config = ServerConfig::from_env()?;

    match cli.command {
        Commands::Serve { seed } => serve(config, seed).await,
        Commands::IssueToken { actor, ttl } => {
            let verifier = TokenVerifier::new(config.jwt_secret)
                .with_ttl(ttl.unwrap_or(config.jwt_ttl_secs));
            println!("{}", verifier.issue(actor)?);
            Ok(())
        }
    }
}

async fn serve(config: ServerConfig, seed: bool) -> Result<(), BoxError> {
    let env = Environment::current();
    init_tracing(config.log_format, &env)?;

    let ctx = AppContext::from_config(&config)?;
    if seed {
        ctx.seed().await;
    }

    let addr = config.addr();
    tracing::info!(%addr, environment = %env, "Starting trailmark");

    build_app(&ctx)
        .run_until(&addr, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown requested");
        })
        .await?;

    tracing::info!(pending = ctx.recorder.pending(), "Waiting for in-flight audit records");
    ctx.recorder.settle().await;
    if let Err(err) = ctx.recorder.store().flush() {
        tracing::error!(error = %err, "Failed to flush audit store");
    }

    Ok(())
}
