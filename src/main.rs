//! # Repo Knowledge CLI (`harvest`)
//!
//! ## Usage
//!
//! ```bash
//! harvest --config ./config/harvest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `harvest sync` | Harvest new entities for every configured repository |
//! | `harvest legacy` | Update the legacy `{org}-{repo}.json` files |
//! | `harvest show <org/name>` | Summarize stored knowledge of one repository |
//! | `harvest repos` | List configured repositories and storage targets |
//!
//! ## Examples
//!
//! ```bash
//! # Harvest one repository only, with JSON progress on stderr
//! harvest sync --repo thoth-station/amun-api --progress json
//!
//! # See how many pull requests would be analysed, without fetching them
//! harvest sync --dry-run
//!
//! # Store on S3 instead of the configured backend
//! KNOWLEDGE_STORAGE=s3 harvest sync
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use repo_knowledge::progress::ProgressMode;
use repo_knowledge::{config, legacy, repos, show, sync};

/// Repo Knowledge: incremental harvesting of pull request metadata
/// into append-only per-repository knowledge files.
#[derive(Parser)]
#[command(name = "harvest", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/harvest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest new entities and append them to stored knowledge.
    ///
    /// Every (repository, entity type) pass runs even if an earlier one
    /// failed; the command exits non-zero if any pass failed.
    Sync {
        /// Only this repository (`organization/name`), configured or not.
        #[arg(long)]
        repo: Option<String>,

        /// Only this entity type (e.g. `PullRequest`).
        #[arg(long)]
        entity: Option<String>,

        /// List and diff only: no detail fetches, no writes.
        #[arg(long)]
        dry_run: bool,

        /// Progress on stderr. Defaults to human when stderr is a TTY, off otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Update the legacy single-file pull request knowledge.
    Legacy {
        /// Only this repository (`organization/name`).
        #[arg(long)]
        repo: Option<String>,
    },

    /// Summarize stored knowledge of one repository.
    Show {
        /// Repository as `organization/name`.
        repository: String,

        #[arg(long, default_value = "PullRequest")]
        entity: String,
    },

    /// List configured repositories and where their knowledge is stored.
    Repos,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Sync {
            repo,
            entity,
            dry_run,
            progress,
        } => {
            let progress = progress.unwrap_or_else(ProgressMode::default_for_tty);
            sync::run_sync(&cfg, repo.as_deref(), entity.as_deref(), dry_run, progress).await?;
        }
        Commands::Legacy { repo } => {
            legacy::run_legacy(&cfg, repo.as_deref()).await?;
        }
        Commands::Show { repository, entity } => {
            show::run_show(&cfg, &repository, &entity).await?;
        }
        Commands::Repos => {
            repos::list_repositories(&cfg)?;
        }
    }

    Ok(())
}
