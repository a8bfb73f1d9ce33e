pub mod toml_config;

use crate::adapters::op_cli::DEFAULT_FIELD_LABEL;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_range, Validate,
};
use std::time::Duration;
use toml_config::TomlConfig;

#[cfg(feature = "cli")]
use crate::domain::model::Mode;
#[cfg(feature = "cli")]
use crate::utils::logger::LogFormat;
#[cfg(feature = "cli")]
use crate::utils::validation::{validate_file_extensions, validate_required_field};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use std::path::PathBuf;

pub const DEFAULT_VAULT: &str = "Private";

/// Fully resolved settings: defaults, then the TOML file, then flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub vault: String,
    pub op_path: String,
    pub field_label: String,
    pub issuer: Option<String>,
    pub timeout_seconds: u64,
    pub concurrent_requests: usize,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault: DEFAULT_VAULT.to_string(),
            op_path: "op".to_string(),
            field_label: DEFAULT_FIELD_LABEL.to_string(),
            issuer: None,
            timeout_seconds: 30,
            concurrent_requests: 4,
            retry_attempts: 0,
            retry_delay_ms: 500,
        }
    }
}

impl Settings {
    pub fn merge_file(mut self, file: &TomlConfig) -> Self {
        let destination = &file.destination;
        if let Some(vault) = &destination.vault {
            self.vault = vault.clone();
        }
        if let Some(op_path) = &destination.op_path {
            self.op_path = op_path.clone();
        }
        if let Some(label) = &destination.field_label {
            self.field_label = label.clone();
        }
        if let Some(timeout) = destination.timeout_seconds {
            self.timeout_seconds = timeout;
        }
        if let Some(concurrency) = destination.concurrent_requests {
            self.concurrent_requests = concurrency;
        }
        if let Some(retries) = destination.retry_attempts {
            self.retry_attempts = retries;
        }
        if let Some(delay) = destination.retry_delay_ms {
            self.retry_delay_ms = delay;
        }
        if file.normalize.issuer.is_some() {
            self.issuer = file.normalize.issuer.clone();
        }
        self
    }
}

impl ConfigProvider for Settings {
    fn vault(&self) -> &str {
        &self.vault
    }

    fn op_path(&self) -> &str {
        &self.op_path
    }

    fn field_label(&self) -> &str {
        &self.field_label
    }

    fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    fn concurrent_requests(&self) -> usize {
        self.concurrent_requests
    }

    fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("vault", &self.vault)?;
        validate_path("op_path", &self.op_path)?;
        validate_non_empty_string("field_label", &self.field_label)?;
        if let Some(issuer) = &self.issuer {
            validate_non_empty_string("issuer", issuer)?;
        }
        validate_range("timeout_seconds", self.timeout_seconds, 1, 600)?;
        validate_range("concurrent_requests", self.concurrent_requests, 1, 32)?;
        validate_range("retry_attempts", self.retry_attempts, 0, 5)?;
        validate_range("retry_delay_ms", self.retry_delay_ms, 0, 60_000)?;
        Ok(())
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "totp-patcher")]
#[command(about = "Patch missing TOTP secrets from a Bitwarden export into 1Password")]
#[command(after_help = "EXAMPLES:
  1. Dry Run (Safe check):
     totp-patcher -f export.json -d

  2. Cleanup (Remove broken fields from previous attempts):
     totp-patcher -f export.json -c

  3. Live Migration:
     totp-patcher -f export.json")]
pub struct CliConfig {
    /// Path to the unencrypted Bitwarden export (JSON or CSV)
    #[arg(short, long, required_unless_present = "license")]
    pub file: Option<PathBuf>,

    /// Simulate the action without modifying items
    #[arg(short, long)]
    pub dry_run: bool,

    /// DELETE the 'one-time password' field from matched items
    #[arg(short = 'c', long)]
    pub clear: bool,

    /// Display the MIT license and exit
    #[arg(short, long)]
    pub license: bool,

    /// 1Password vault to search
    #[arg(long)]
    pub vault: Option<String>,

    /// Optional TOML settings file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the 1Password CLI binary
    #[arg(long)]
    pub op_path: Option<String>,

    /// Issuer written into generated otpauth URIs (defaults to the item title)
    #[arg(long)]
    pub issuer: Option<String>,

    /// Parallel destination writes
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Timeout for each op invocation, in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Retries for each failed operation
    #[arg(long)]
    pub retries: Option<u32>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Write the run result as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn mode(&self) -> (Mode, bool) {
        Mode::from_flags(self.dry_run, self.clear)
    }

    pub fn source_path(&self) -> Result<String> {
        let file = validate_required_field("file", &self.file)?;
        Ok(file.to_string_lossy().into_owned())
    }

    /// 合併預設值、設定檔與命令列參數
    pub fn resolve(&self) -> Result<Settings> {
        let mut settings = Settings::default();
        if let Some(path) = &self.config {
            settings = settings.merge_file(&TomlConfig::from_file(path)?);
        }

        if let Some(vault) = &self.vault {
            settings.vault = vault.clone();
        }
        if let Some(op_path) = &self.op_path {
            settings.op_path = op_path.clone();
        }
        if self.issuer.is_some() {
            settings.issuer = self.issuer.clone();
        }
        if let Some(concurrency) = self.concurrency {
            settings.concurrent_requests = concurrency;
        }
        if let Some(timeout) = self.timeout_secs {
            settings.timeout_seconds = timeout;
        }
        if let Some(retries) = self.retries {
            settings.retry_attempts = retries;
        }

        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("file", &self.source_path()?)?;
        if let Some(report) = &self.report {
            validate_file_extensions("report", &[report.to_string_lossy().into_owned()], &["json"])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_overrides_defaults() {
        let file = TomlConfig::from_toml_str(
            "[destination]\nvault = \"Shared\"\nretry_attempts = 2\n[normalize]\nissuer = \"BW\"\n",
        )
        .unwrap();

        let settings = Settings::default().merge_file(&file);

        assert_eq!(settings.vault, "Shared");
        assert_eq!(settings.retry_attempts, 2);
        assert_eq!(settings.issuer(), Some("BW"));
        assert_eq!(settings.op_path, "op");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let settings = Settings {
            concurrent_requests: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            vault: " ".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_cli_flags_override_file() {
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut temp, b"[destination]\nvault = \"Shared\"\nconcurrent_requests = 8\n")
            .unwrap();
        let config_path = temp.path().to_string_lossy().into_owned();

        let cli = CliConfig::parse_from([
            "totp-patcher",
            "-f",
            "export.json",
            "--config",
            config_path.as_str(),
            "--vault",
            "Personal",
        ]);
        let settings = cli.resolve().unwrap();

        assert_eq!(settings.vault, "Personal");
        assert_eq!(settings.concurrent_requests, 8);
        assert_eq!(cli.mode(), (Mode::Live, false));
        assert!(cli.validate().is_ok());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_cli_requires_file_unless_license() {
        assert!(CliConfig::try_parse_from(["totp-patcher", "-d"]).is_err());

        let cli = CliConfig::try_parse_from(["totp-patcher", "--license"]).unwrap();
        assert!(cli.license);
        assert!(cli.file.is_none());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_cli_mode_flags() {
        let cli = CliConfig::parse_from(["totp-patcher", "-f", "e.json", "-d", "-c"]);
        assert_eq!(cli.mode(), (Mode::Cleanup, true));

        let cli = CliConfig::parse_from(["totp-patcher", "-f", "e.json", "--report", "out.txt"]);
        assert!(cli.validate().is_err());
    }
}
