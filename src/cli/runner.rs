//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands};
use crate::cli::server::serve;
use crate::config::{LarkConfig, DEFAULT_REDIRECT_URI};
use crate::error::{Error, Result};
use crate::lark::LarkClient;
use crate::snapshot::{SnapshotConfig, SnapshotEngine};
use serde::Serialize;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let lark = self.cli.lark.to_config();

        match &self.cli.command {
            command @ Commands::Serve { .. } => {
                let config = command
                    .server_config(lark)
                    .ok_or_else(|| Error::config("serve settings unavailable"))?;
                serve(config).await
            }
            Commands::Snapshot {
                source,
                name,
                tables,
                preserve_attachments,
                grant_admin,
                user_token,
            } => {
                let config = SnapshotConfig::new(source.as_str(), name.as_str())
                    .with_selected_tables(tables.clone())
                    .with_preserve_attachments(*preserve_attachments)
                    .with_grant_admin(*grant_admin);
                self.snapshot(&lark, user_token.as_deref(), &config).await
            }
            Commands::Preview { source, user_token } => {
                self.preview(&lark, user_token.as_deref(), source).await
            }
        }
    }

    async fn snapshot(
        &self,
        lark: &LarkConfig,
        user_token: Option<&str>,
        config: &SnapshotConfig,
    ) -> Result<()> {
        let engine = SnapshotEngine::new(client(lark, user_token)?);
        info!(source = %config.source_base_url, target = %config.target_base_name, "Starting snapshot");

        let result = engine.run(config).await;
        print_json(&result);

        if result.success {
            info!(
                tables = result.tables_processed,
                records = result.records_processed,
                errors = result.errors.len(),
                "Snapshot finished"
            );
            Ok(())
        } else {
            let message = result
                .errors
                .first()
                .map_or_else(|| "snapshot failed".to_string(), |e| e.message.clone());
            Err(Error::Other(message))
        }
    }

    async fn preview(&self, lark: &LarkConfig, user_token: Option<&str>, source: &str) -> Result<()> {
        let engine = SnapshotEngine::new(client(lark, user_token)?);
        let preview = engine.preview(source).await?;
        print_json(&preview);
        Ok(())
    }
}

/// Tenant client, or the user's when a token is given
fn client(lark: &LarkConfig, user_token: Option<&str>) -> Result<LarkClient> {
    lark.validate()?;
    let (client, _) = lark.build_clients(DEFAULT_REDIRECT_URI);
    Ok(match user_token.filter(|t| !t.trim().is_empty()) {
        Some(token) => client.as_user(token),
        None => client,
    })
}

fn print_json<T: Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}
