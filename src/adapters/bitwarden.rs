//! Reader for unencrypted Bitwarden exports, in either JSON or CSV form.
//!
//! Only login entries with a populated TOTP value become [`SourceRecord`]s;
//! everything else is filtered out here so the matcher never sees it.

use crate::domain::model::SourceRecord;
use crate::utils::error::{MigrationError, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// Picks the format from the file extension, then from the content.
    pub fn detect(path: &str, data: &[u8]) -> Self {
        let extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("json") => ExportFormat::Json,
            Some("csv") => ExportFormat::Csv,
            _ => match data.iter().find(|b| !b.is_ascii_whitespace()) {
                Some(b'{') | Some(b'[') => ExportFormat::Json,
                _ => ExportFormat::Csv,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonExport {
    #[serde(default)]
    encrypted: bool,
    #[serde(default)]
    items: Vec<JsonItem>,
}

#[derive(Debug, Deserialize)]
struct JsonItem {
    #[serde(default)]
    name: String,
    login: Option<JsonLogin>,
}

#[derive(Debug, Deserialize)]
struct JsonLogin {
    username: Option<String>,
    totp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    r#type: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    login_username: String,
    #[serde(default)]
    login_totp: String,
}

fn login_record(name: String, username: Option<String>, totp: Option<String>) -> Option<SourceRecord> {
    let totp = totp.filter(|t| !t.trim().is_empty())?;
    Some(SourceRecord::new(name, username.unwrap_or_default(), Some(totp)))
}

pub fn parse_json(data: &[u8]) -> Result<Vec<SourceRecord>> {
    let export: JsonExport = serde_json::from_slice(data)?;
    if export.encrypted {
        return Err(MigrationError::fatal(
            "the export is encrypted; export the vault again as unencrypted JSON",
        ));
    }

    let total = export.items.len();
    let records: Vec<SourceRecord> = export
        .items
        .into_iter()
        .filter_map(|item| {
            let login = item.login?;
            login_record(item.name, login.username, login.totp)
        })
        .collect();

    tracing::debug!("{} of {} JSON export items carry a TOTP secret", records.len(), total);
    Ok(records)
}

pub fn parse_csv(data: &[u8]) -> Result<Vec<SourceRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    if !headers.iter().any(|h| h == "login_totp") {
        return Err(MigrationError::fatal(
            "the CSV export has no `login_totp` column",
        ));
    }

    let mut records = Vec::new();
    let mut total = 0;
    for row in reader.deserialize::<CsvRow>() {
        let row = row?;
        total += 1;
        if !row.r#type.is_empty() && row.r#type != "login" {
            continue;
        }
        let username = Some(row.login_username).filter(|u| !u.is_empty());
        if let Some(record) = login_record(row.name, username, Some(row.login_totp)) {
            records.push(record);
        }
    }

    tracing::debug!("{} of {} CSV export rows carry a TOTP secret", records.len(), total);
    Ok(records)
}

pub fn parse_export(path: &str, data: &[u8]) -> Result<Vec<SourceRecord>> {
    match ExportFormat::detect(path, data) {
        ExportFormat::Json => parse_json(data),
        ExportFormat::Csv => parse_csv(data),
    }
}
