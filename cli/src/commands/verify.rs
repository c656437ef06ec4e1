use anyhow::Result;
use dirvault_core::{BackupLifecycle, Config};
use tracing::info;

pub struct VerifyCommand;

impl VerifyCommand {
    pub async fn run(name: String, cli: &crate::Cli) -> Result<()> {
        let config = Config::load(cli.config.as_deref()).await?;
        let lifecycle = BackupLifecycle::new(config);

        info!("Verifying archive {}", name);
        let digest = lifecycle.verify(&name).await?;

        println!("✅ Archive {} verified", name);
        println!("🔐 SHA-256: {}", digest);

        Ok(())
    }
}
