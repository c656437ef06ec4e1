use anyhow::Result;
use dirvault_core::{BackupLifecycle, Config};
use std::path::PathBuf;
use tracing::info;

pub struct RestoreCommand;

impl RestoreCommand {
    pub async fn run(name: String, target: PathBuf, cli: &crate::Cli) -> Result<()> {
        let config = Config::load(cli.config.as_deref()).await?;
        let lifecycle = BackupLifecycle::new(config);

        info!("Restoring {} into {}", name, target.display());
        let summary = lifecycle.restore(&name, &target).await?;

        println!("✅ Restore completed!");
        println!("📦 Archive: {}", summary.archive);
        println!("📁 Files: {}", summary.files);
        println!("📂 Location: {}", target.display());

        Ok(())
    }
}
