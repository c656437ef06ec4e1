mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{backup::BackupCommand, list::ListCommand, restore::RestoreCommand, verify::VerifyCommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(
    name = "dirvault",
    about = "Rotating directory backups with integrity checks",
    long_about = "Dirvault creates timestamped tar.gz archives of a directory tree, verifies them with SHA-256 fingerprints, and prunes old archives with tiered daily/weekly/monthly retention"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, env = "DIRVAULT_CONFIG", help = "Config file path")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    verbose: bool,

    #[arg(short, long, help = "Enable quiet mode")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create a backup, verify it, and rotate old archives")]
    Backup(BackupCommand),

    #[command(about = "Restore an archive into a directory")]
    Restore {
        #[arg(help = "Archive name to restore")]
        name: String,

        #[arg(help = "Target directory for restore")]
        target: PathBuf,
    },

    #[command(about = "List archives at the destination")]
    List(ListCommand),

    #[command(about = "Re-check an archive against its stored checksum")]
    Verify {
        #[arg(help = "Archive name to verify")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Backup(ref cmd) => cmd.run(&cli).await,
        Commands::Restore { ref name, ref target } => {
            RestoreCommand::run(name.clone(), target.clone(), &cli).await
        }
        Commands::List(ref cmd) => cmd.run(&cli).await,
        Commands::Verify { ref name } => VerifyCommand::run(name.clone(), &cli).await,
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(format!(
            "dirvault_core={level},dirvault_cli={level}"
        )))
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Setting default subscriber failed");
}
