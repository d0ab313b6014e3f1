//! # Clip Bridge CLI (`cb`)
//!
//! Manage captured clips and compile them into context bridges.
//!
//! ## Usage
//!
//! ```bash
//! cb --config ./config/bridge.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cb init` | Create the SQLite database and schema |
//! | `cb serve` | Start the HTTP server |
//! | `cb projects list` | List projects |
//! | `cb projects add <name>` | Create a project |
//! | `cb clip add --project <p> --url <u>` | Save a clip |
//! | `cb clips` | List clips, newest first |
//! | `cb bridge <project>` | Compile a context bridge |
//! | `cb export <project>` | Flat text export of a project |
//!
//! ## Examples
//!
//! ```bash
//! cb init
//! cb projects add Launch --description "Q1 launch"
//! cb clip add --project Launch --url https://github.com/org/repo --text "Alice: ship it"
//! cb bridge Launch --format markdown --max-tokens 800
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use clip_bridge::{commands, config, migrate, server};

/// Clip Bridge: compile captured web clips into portable context for AI
/// assistants.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/bridge.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "cb",
    about = "Clip Bridge: compile captured web clips into portable context for AI assistants",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/bridge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Manage projects.
    Projects {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Manage individual clips.
    Clip {
        #[command(subcommand)]
        action: ClipAction,
    },

    /// List clips, newest first.
    Clips {
        /// Project id or name to filter by.
        #[arg(long)]
        project: Option<String>,

        #[arg(long, default_value_t = 50)]
        limit: i64,

        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Compile the context bridge for a project.
    ///
    /// Prints the rendered bridge to stdout. The API key defaults to the
    /// environment variable named by `[synthesis].api_key_env`.
    Bridge {
        /// Project id or name.
        project: String,

        /// Output format: `yaml`, `json`, or `markdown`.
        #[arg(long)]
        format: Option<String>,

        /// Keep only meta, situation, entities, and decisions.
        #[arg(long)]
        compact: bool,

        /// Approximate token ceiling. Ignored with `--compact`.
        #[arg(long)]
        max_tokens: Option<usize>,

        /// API key for this invocation only.
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Export every clip of a project as plain text.
    Export {
        /// Project id or name.
        project: String,

        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    List,
    Add {
        name: String,

        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
enum ClipAction {
    /// Save a new clip.
    Add {
        /// Project id or name.
        #[arg(long)]
        project: String,

        #[arg(long)]
        url: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        text: Option<String>,

        /// Source domain. Derived from the URL when omitted.
        #[arg(long)]
        domain: Option<String>,

        /// `text`, `image`, `screenshot`, or `file`.
        #[arg(long)]
        media_type: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("clip_bridge=info,clip_bridge_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Projects { action } => match action {
            ProjectAction::List => commands::run_projects_list(&cfg).await?,
            ProjectAction::Add { name, description } => {
                commands::run_projects_add(&cfg, &name, description).await?
            }
        },
        Commands::Clip { action } => match action {
            ClipAction::Add {
                project,
                url,
                title,
                text,
                domain,
                media_type,
            } => {
                commands::run_clip_add(&cfg, &project, url, title, text, domain, media_type)
                    .await?
            }
        },
        Commands::Clips {
            project,
            limit,
            offset,
        } => {
            commands::run_clips(&cfg, project.as_deref(), limit, offset).await?;
        }
        Commands::Bridge {
            project,
            format,
            compact,
            max_tokens,
            api_key,
        } => {
            commands::run_bridge(
                &cfg,
                &project,
                format.as_deref(),
                compact,
                max_tokens,
                api_key.as_deref(),
            )
            .await?;
        }
        Commands::Export { project, output } => {
            commands::run_export(&cfg, &project, output.as_deref()).await?;
        }
    }

    Ok(())
}
