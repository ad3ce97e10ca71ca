//! Gau Gyan Control - CLI client for the Gau Gyan daemon
//!
//! Sign in, send a cattle photo for analysis, and browse or clear your
//! analysis history.

use anyhow::Result;
use clap::{Parser, Subcommand};
use gaugyan_common::DEFAULT_SERVER_URL;
use gaugyanctl::commands::{self, CommandContext};
use gaugyanctl::errors::{exit_code_for, EXIT_SUCCESS};
use gaugyanctl::session_file::SessionFile;
use owo_colors::OwoColorize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gaugyanctl")]
#[command(about = "Gau Gyan - cattle trait extraction and ATC scoring", long_about = None)]
#[command(version = gaugyan_common::VERSION)]
struct Cli {
    /// Daemon URL
    #[arg(long, global = true, env = "GAUGYAN_SERVER", default_value = DEFAULT_SERVER_URL)]
    server: String,

    /// Print machine-readable JSON instead of the formatted view
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account (does not log in)
    Register {
        #[arg(long)]
        email: String,

        /// Display name
        #[arg(long, default_value = "")]
        name: String,

        /// Password; prefer GAUGYAN_PASSWORD or the hidden prompt over the flag
        #[arg(long, env = "GAUGYAN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Log in and store the session
    Login {
        #[arg(long)]
        email: Option<String>,

        /// Password; prefer GAUGYAN_PASSWORD or the hidden prompt over the flag
        #[arg(long, env = "GAUGYAN_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Log in with a provider-issued custom token instead
        #[arg(long, conflicts_with = "email")]
        custom_token: Option<String>,
    },

    /// End the session
    Logout,

    /// Analyze a cattle photo and print its scorecard
    Analyze {
        /// Photo (jpg, jpeg, png, webp, gif or heic)
        path: PathBuf,
    },

    /// Show past analyses, newest first
    History {
        /// Show at most this many records
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Delete all of your analyses
    ClearHistory {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Ask which traits most influence a score
    Relevant {
        /// Animal type (e.g. "Gir cow", "Murrah buffalo")
        #[arg(long)]
        animal_type: String,

        /// ATC score
        #[arg(long)]
        score: f64,

        /// Trait value as name=value (repeatable)
        #[arg(long = "trait", value_name = "NAME=VALUE", required = true)]
        traits: Vec<String>,
    },

    /// Check that the daemon is up
    Health,
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = CommandContext {
        server: cli.server.trim_end_matches('/').to_string(),
        json: cli.json,
        session_file: SessionFile::default_location()?,
    };

    match cli.command {
        Commands::Register { email, name, password } => commands::register(&ctx, name, email, password).await,
        Commands::Login { email, password, custom_token } => {
            commands::login(&ctx, email, password, custom_token).await
        }
        Commands::Logout => commands::logout(&ctx).await,
        Commands::Analyze { path } => commands::analyze(&ctx, &path).await,
        Commands::History { limit } => commands::history(&ctx, limit).await,
        Commands::ClearHistory { yes } => commands::clear_history(&ctx, yes).await,
        Commands::Relevant { animal_type, score, traits } => {
            commands::relevant(&ctx, animal_type, score, &traits).await
        }
        Commands::Health => commands::health(&ctx).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".bright_red().bold(), e);
            exit_code_for(&e)
        }
    };
    std::process::exit(code);
}
