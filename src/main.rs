use clap::{Parser, Subcommand};
use color_eyre::Result;
use gwasload::cli;
use gwasload::config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gwasload")]
#[command(about = "Fetch remote JSON documents through a durable ETag-revalidated cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./gwasload.yaml or $XDG_CONFIG_HOME/gwasload/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Increase log verbosity (-v info, -vv debug)
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Load a resource, revalidating the cached copy, and print it as JSON
  Load {
    /// Resource name (defaults to the configured default resource)
    name: Option<String>,

    /// Write the document to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Do not draw a progress bar
    #[arg(long)]
    no_progress: bool,
  },
  /// List configured resources
  List,
  /// Show what is cached for a resource
  Show {
    /// Resource name (defaults to the configured default resource)
    name: Option<String>,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // RUST_LOG wins over -v; logs go to stderr so stdout stays JSON
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match args.verbose {
    0 => EnvFilter::new("gwasload=warn"),
    1 => EnvFilter::new("gwasload=info"),
    _ => EnvFilter::new("gwasload=debug"),
  });
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(false)
    .with_writer(std::io::stderr)
    .init();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  match args.command {
    Command::List => cli::list(&config.catalog()),
    Command::Load {
      name,
      output,
      no_progress,
    } => {
      let loader = cli::open_loader(&config)?;
      cli::load(&loader, name.as_deref(), output.as_deref(), !no_progress).await?;
    }
    Command::Show { name } => {
      let loader = cli::open_loader(&config)?;
      cli::show(&loader, name.as_deref()).await?;
    }
  }

  Ok(())
}
