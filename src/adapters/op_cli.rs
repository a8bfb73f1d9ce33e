//! Destination backed by the 1Password command line tool (`op`).
//!
//! The tool must already be signed in; this adapter never starts or ends a
//! session. Each call spawns one `op` process under a timeout.

use crate::domain::model::{DestinationRecord, ItemId, OtpFieldState, TotpUri};
use crate::domain::ports::{ConfigProvider, Destination};
use crate::utils::error::{MigrationError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::process::Command;

pub const DEFAULT_FIELD_LABEL: &str = "one-time password";

#[derive(Debug, Clone)]
pub struct OpCli {
    program: String,
    vault: String,
    field_label: String,
    timeout: Duration,
}

#[derive(Debug)]
struct CommandOutput {
    stdout: String,
    stderr: String,
    success: bool,
}

#[derive(Debug, Deserialize)]
struct ItemSummary {
    id: String,
    #[serde(default)]
    title: String,
    /// Holds the username for login items in list output.
    additional_information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemDetail {
    #[serde(default)]
    fields: Vec<ItemField>,
}

#[derive(Debug, Deserialize)]
struct ItemField {
    label: Option<String>,
    value: Option<String>,
}

impl OpCli {
    pub fn new(program: impl Into<String>, vault: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            vault: vault.into(),
            field_label: DEFAULT_FIELD_LABEL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Self {
        Self::new(config.op_path(), config.vault())
            .with_field_label(config.field_label())
            .with_timeout(config.command_timeout())
    }

    pub fn with_field_label(mut self, label: impl Into<String>) -> Self {
        self.field_label = label.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        let spawned = tokio::time::timeout(
            self.timeout,
            Command::new(&self.program)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let output = match spawned {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(MigrationError::fatal(format!(
                    "'{}' command not found. Is the 1Password CLI installed?",
                    self.program
                )));
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(MigrationError::adapter(
                    "run",
                    format!("{} {}", self.program, args.first().copied().unwrap_or_default()),
                    format!("timed out after {}s", self.timeout.as_secs()),
                ));
            }
        };

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            success: output.status.success(),
        })
    }

    fn edit_args<'a>(&'a self, target: &'a ItemId, assignment: &'a str) -> [&'a str; 6] {
        ["item", "edit", target.as_str(), "--vault", &self.vault, assignment]
    }
}

#[async_trait]
impl Destination for OpCli {
    async fn check_available(&self) -> Result<()> {
        let output = self.run(&["--version"]).await?;
        if !output.success {
            return Err(MigrationError::fatal(format!(
                "'{} --version' failed: {}",
                self.program, output.stderr
            )));
        }
        tracing::debug!("Using op {}", output.stdout.trim());
        Ok(())
    }

    async fn list_items(&self) -> Result<Vec<DestinationRecord>> {
        tracing::info!("--> Fetching items from 1Password vault: '{}'...", self.vault);
        let output = self
            .run(&["item", "list", "--vault", &self.vault, "--format", "json"])
            .await?;
        if !output.success {
            return Err(MigrationError::fatal(format!(
                "could not list items in vault '{}': {}",
                self.vault, output.stderr
            )));
        }
        parse_item_list(&output.stdout)
    }

    async fn inspect_otp_field(&self, target: &ItemId) -> Result<OtpFieldState> {
        let output = self
            .run(&["item", "get", target.as_str(), "--vault", &self.vault, "--format", "json"])
            .await?;
        if !output.success {
            return Err(MigrationError::adapter("inspect", target, output.stderr));
        }
        parse_otp_field(&output.stdout, &self.field_label)
    }

    async fn set_otp_field(&self, target: &ItemId, uri: &TotpUri) -> Result<()> {
        let assignment = format!("{}[otp]={}", self.field_label, uri);
        let output = self.run(&self.edit_args(target, &assignment)).await?;
        if !output.success {
            return Err(MigrationError::adapter("update", target, output.stderr));
        }
        Ok(())
    }

    async fn clear_otp_field(&self, target: &ItemId) -> Result<()> {
        let assignment = format!("{}[delete]", self.field_label);
        let output = self.run(&self.edit_args(target, &assignment)).await?;
        if output.success {
            return Ok(());
        }
        if is_field_not_found(&output.stderr) {
            tracing::info!("    [INFO] Field already gone for: {}", target);
            return Ok(());
        }
        Err(MigrationError::adapter("delete", target, output.stderr))
    }
}

pub fn parse_item_list(stdout: &str) -> Result<Vec<DestinationRecord>> {
    let items: Vec<ItemSummary> = serde_json::from_str(stdout)?;
    Ok(items
        .into_iter()
        .map(|item| {
            DestinationRecord::new(
                item.title,
                item.additional_information.unwrap_or_default(),
                ItemId::new(item.id),
            )
        })
        .collect())
}

pub fn parse_otp_field(stdout: &str, label: &str) -> Result<OtpFieldState> {
    let detail: ItemDetail = serde_json::from_str(stdout)?;
    Ok(detail
        .fields
        .into_iter()
        .find(|field| field.label.as_deref() == Some(label))
        .map(|field| OtpFieldState::present(field.value))
        .unwrap_or_else(OtpFieldState::absent))
}

pub fn is_field_not_found(stderr: &str) -> bool {
    stderr.to_ascii_lowercase().contains("field not found")
}
