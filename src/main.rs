use clap::{Parser, Subcommand};
use std::process;

mod cli;

use cli::config::{cmd_config, ConfigArgs};
use cli::edges::{cmd_edges, EdgesArgs};
use cli::forward::{cmd_forward, ForwardArgs};
use cli::relations::{cmd_relations, RelationsArgs};

#[derive(Parser)]
#[command(
    name = "dialogue-gcn",
    version,
    about = "DialogueGCN: emotion recognition over conversation graphs"
)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the window edge set of one dialogue
    Edges(EdgesArgs),
    /// Print or save the relation label map
    Relations(RelationsArgs),
    /// Print or save a default model config
    Config(ConfigArgs),
    /// Run one forward pass with freshly initialized weights
    Forward(ForwardArgs),
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "dialogue_gcn=debug"
    } else {
        "dialogue_gcn=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Edges(args) => cmd_edges(args),
        Command::Relations(args) => cmd_relations(args),
        Command::Config(args) => cmd_config(args),
        Command::Forward(args) => cmd_forward(args),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
