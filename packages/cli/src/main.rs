mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{check, init, inspect, roundtrip, CheckArgs, InitArgs, InspectArgs, RoundtripArgs};
use config::LexicalConfig;
use std::path::PathBuf;

/// Lexical CLI - inspect and validate serialized editor states
#[derive(Parser, Debug)]
#[command(name = "lexical")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to lexical.config.json in the working directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log editor activity
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a config file and a sample document
    Init(InitArgs),

    /// Print the node tree of a document
    Inspect(InspectArgs),

    /// Import then export a document and compare
    Roundtrip(RoundtripArgs),

    /// Validate one document or every document in a directory
    Check(CheckArgs),
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    let load = || LexicalConfig::resolve(cli.config.as_ref(), &cwd);

    match cli.command {
        Command::Init(args) => init(args, &cwd),
        Command::Inspect(args) => inspect(args, &load()?),
        Command::Roundtrip(args) => roundtrip(args, &load()?),
        Command::Check(args) => check(args, &load()?),
    }
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli) {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
