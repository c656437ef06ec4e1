use anyhow::{anyhow, Result};
use clap::Args;
use dirvault_core::{BackupLifecycle, Config};
use tracing::warn;

#[derive(Args)]
pub struct ListCommand {
    #[arg(long, help = "Output format (table, json)")]
    format: Option<String>,
}

impl ListCommand {
    pub async fn run(&self, cli: &crate::Cli) -> Result<()> {
        let config = Config::load(cli.config.as_deref()).await?;
        let lifecycle = BackupLifecycle::new(config);

        let archives = lifecycle.list().await?;
        if archives.is_empty() {
            warn!("No archives found at destination");
            println!("No backups found");
            return Ok(());
        }

        match self.format.as_deref().unwrap_or("table") {
            "table" => {
                println!("{:<26} {:>10} {:<20}", "Name", "Size", "Created");
                println!("{:-<58}", "");
                for entry in &archives {
                    println!(
                        "{:<26} {:>10} {:<20}",
                        entry.name,
                        human_size(entry.size),
                        entry.modified.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
            "json" => {
                println!("{}", serde_json::to_string_pretty(&archives)?);
            }
            other => {
                return Err(anyhow!("Unsupported format: {}", other));
            }
        }

        Ok(())
    }
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_size_picks_the_right_unit() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(human_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }
}
