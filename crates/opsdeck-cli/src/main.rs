mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use opsdeck_core::{Actor, ItemId};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "opsdeck",
    about = "Shared operator/agent task dashboard kept in sync with a remote store",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file
    #[arg(long, global = true, env = "OPSDECK_CONFIG", default_value = opsdeck_core::config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API and live event stream
    Serve {
        #[arg(long, default_value = "3141")]
        port: u16,
    },

    /// Print the dashboard once
    Snapshot {
        /// Include done items
        #[arg(long)]
        show_completed: bool,
        /// Only this owner's lane (Z or JARVIS)
        #[arg(long)]
        owner: Option<Actor>,
    },

    /// Reprint the dashboard whenever the remote changes
    Watch {
        #[arg(long)]
        show_completed: bool,
        #[arg(long)]
        owner: Option<Actor>,
    },

    /// Create a pending work item
    Add {
        owner: Actor,
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },

    /// Flip a work item between done and pending
    Toggle { id: ItemId },

    /// Change a work item's title
    Rename {
        id: ItemId,
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },

    /// Delete a work item (succeeds if already gone)
    Delete { id: ItemId },

    /// Publish an actor's status line
    Status {
        actor: Actor,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        /// Mark the actor offline
        #[arg(long)]
        offline: bool,
    },

    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } | Commands::Watch { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_path();

    let result = match cli.command {
        Commands::Serve { port } => cmd::serve::run(config, port),
        Commands::Snapshot {
            show_completed,
            owner,
        } => cmd::board::snapshot(config, show_completed, owner, cli.json),
        Commands::Watch {
            show_completed,
            owner,
        } => cmd::board::watch(config, show_completed, owner, cli.json),
        Commands::Add { owner, title } => cmd::item::add(config, owner, &title.join(" "), cli.json),
        Commands::Toggle { id } => cmd::item::toggle(config, id, cli.json),
        Commands::Rename { id, title } => cmd::item::rename(config, id, &title.join(" "), cli.json),
        Commands::Delete { id } => cmd::item::delete(config, id, cli.json),
        Commands::Status {
            actor,
            text,
            offline,
        } => cmd::status::run(config, actor, &text.join(" "), !offline, cli.json),
        Commands::Config { subcommand } => cmd::config::run(config, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
