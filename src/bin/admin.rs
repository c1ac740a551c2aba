use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use scholaris::{init_tracing, AppState, Config, UserRole};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Scholaris maintenance tasks", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild the per-category user-item matrices from the activity ledger
    RefreshMatrix,
    /// Rebuild item similarity from the cached matrices
    RefreshSimilarity,
    /// Run both refresh stages
    RefreshAll,
    /// Give an existing account the administrator role
    GrantAdmin {
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing().await;

    let config = Config::load(&args.config)?;
    if !config.database.backend.is_shared() {
        bail!(
            "database backend {:?} is private to each process; point scholaris-admin at the \
             server's postgres database (database.backend = \"postgres\")",
            config.database.backend
        );
    }

    let state = AppState::new(config).await?;

    match args.command {
        Command::RefreshMatrix => {
            let summary = state.recommendations.refresh_matrix().await?;
            info!("Matrix refreshed: {:?}", summary);
        }
        Command::RefreshSimilarity => {
            let summary = state.recommendations.refresh_similarity().await?;
            info!("Similarity refreshed: {:?}", summary);
        }
        Command::RefreshAll => {
            let summary = state.recommendations.refresh_all().await?;
            info!("Matrix and similarity refreshed: {:?}", summary);
        }
        Command::GrantAdmin { email } => {
            let user = state.accounts.set_role(&email, UserRole::Admin).await?;
            info!("Granted administrator role to {}", user.email);
        }
    }

    Ok(())
}
