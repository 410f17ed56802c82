//! # CodeMate CLI (`codemate`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `codemate init` | Create the SQLite database and run schema migrations |
//! | `codemate credits <url>` | Count the files an index of the repository would use |
//! | `codemate index <project> <url>` | Summarise, embed and store every file |
//! | `codemate search <project> "<question>"` | Rank a project's files against a question |
//! | `codemate meeting upload <project> <file>` | Upload a recording and trigger processing |
//! | `codemate repair` | Remove embedding rows that never received a vector |
//!
//! Logs go to stderr; filter with `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use codemate_ingest::progress::ProgressMode;
use codemate_ingest::{config, embedding, index_cmd, meeting_cmd, migrate, search};

/// Repository indexing and meeting uploads for CodeMate projects.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/codemate.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "codemate", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/codemate.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Count the files in a GitHub repository.
    ///
    /// One file is one credit. Prints 0 when the URL does not name an
    /// owner and a repository.
    Credits {
        /// Repository URL, e.g. `https://github.com/acme/widgets`.
        url: String,

        /// Access token; defaults to `GITHUB_TOKEN`.
        #[arg(long)]
        token: Option<String>,
    },

    /// Load a repository, summarise and embed each file, and store the
    /// results under a project.
    Index {
        project_id: String,
        url: String,

        /// Access token; defaults to `GITHUB_TOKEN`.
        #[arg(long)]
        token: Option<String>,

        /// Progress output on stderr. Defaults to human when stderr is a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressArg>,
    },

    /// Semantic search over a project's indexed files.
    Search {
        project_id: String,
        question: String,

        /// Maximum number of results; defaults to `pipeline.search_limit`.
        #[arg(long)]
        limit: Option<usize>,

        /// Print hits as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Meeting recordings.
    Meeting {
        #[command(subcommand)]
        action: MeetingAction,
    },

    /// Delete embedding rows left without a vector.
    Repair,
}

#[derive(Subcommand)]
enum MeetingAction {
    /// Upload an audio file (.mp3, .wav, .m4a; at most 50 MB).
    Upload { project_id: String, file: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Off,
    Human,
    Json,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Credits { url, token } => {
            index_cmd::run_credits(&cfg, &url, token).await?;
        }
        Commands::Index {
            project_id,
            url,
            token,
            progress,
        } => {
            let mode = progress
                .map(ProgressMode::from)
                .unwrap_or_else(ProgressMode::default_for_tty);
            index_cmd::run_index(&cfg, &project_id, &url, token, mode).await?;
        }
        Commands::Search {
            project_id,
            question,
            limit,
            json,
        } => {
            let embedder = embedding::create_embedder(&cfg.embedding)?;
            search::run_search(&cfg, embedder.as_ref(), &project_id, &question, limit, json)
                .await?;
        }
        Commands::Meeting { action } => match action {
            MeetingAction::Upload { project_id, file } => {
                meeting_cmd::run_meeting_upload(&cfg, &project_id, &file).await?;
            }
        },
        Commands::Repair => {
            index_cmd::run_repair(&cfg).await?;
        }
    }

    Ok(())
}
