use anyhow::Result;
use clap::Args;
use dirvault_core::{BackupLifecycle, Config, RunOutcome};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Args)]
pub struct BackupCommand {
    #[arg(help = "Source directory to back up")]
    source: PathBuf,

    #[arg(long, help = "Log the intended action without writing anything")]
    dry_run: bool,

    #[arg(long, help = "Extra exclude patterns (comma-separated)")]
    exclude: Option<String>,
}

impl BackupCommand {
    pub async fn run(&self, cli: &crate::Cli) -> Result<()> {
        let config = Config::load(cli.config.as_deref()).await?;
        let lifecycle = BackupLifecycle::new(config);

        let extra: Vec<String> = self
            .exclude
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();

        info!("Starting backup of {}", self.source.display());

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap(),
        );
        pb.set_message("Creating archive...");
        pb.enable_steady_tick(Duration::from_millis(120));

        let outcome = lifecycle.run(&self.source, self.dry_run, &extra).await;
        pb.finish_and_clear();

        match outcome? {
            RunOutcome::Planned(plan) => {
                println!("Dry run - no data was written");
                println!(
                    "Would create {} archive {} ({} files, {:.2} MB)",
                    if plan.full { "full" } else { "incremental" },
                    plan.name,
                    plan.file_count,
                    plan.total_bytes as f64 / 1024.0 / 1024.0
                );
            }
            RunOutcome::Completed {
                archive,
                digest,
                rotation,
            } => {
                println!("✅ Backup completed successfully!");
                println!("📦 Archive: {}", archive.name);
                println!(
                    "📁 Files: {} ({})",
                    archive.file_count,
                    if archive.full { "full" } else { "incremental" }
                );
                println!("💾 Size: {:.2} MB", archive.total_bytes as f64 / 1024.0 / 1024.0);
                println!("🔐 SHA-256: {}", digest);
                if !rotation.deleted.is_empty() {
                    println!("🗑️  Pruned: {}", rotation.deleted.join(", "));
                }
            }
        }

        Ok(())
    }
}
