use serde::{Deserialize, Serialize};
use std::fmt;

/// A login entry from the source export that carries a TOTP value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub title: String,
    pub username: String,
    /// Raw base32 key or an `otpauth://` URI. `None` is never matched.
    pub secret: Option<String>,
}

impl SourceRecord {
    pub fn new(title: impl Into<String>, username: impl Into<String>, secret: Option<String>) -> Self {
        Self {
            title: title.into(),
            username: username.into(),
            secret,
        }
    }

    pub fn key(&self) -> MatchKey {
        MatchKey::new(&self.title, &self.username)
    }
}

/// Opaque handle of a destination item, as issued by the destination manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpFieldState {
    pub present: bool,
    pub value: Option<String>,
}

impl OtpFieldState {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn present(value: Option<String>) -> Self {
        Self {
            present: true,
            value,
        }
    }
}

/// An existing item in the destination vault and the state of its OTP field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationRecord {
    pub title: String,
    pub username: String,
    pub item_id: ItemId,
    pub otp_field_present: bool,
    pub otp_field_value: Option<String>,
}

impl DestinationRecord {
    pub fn new(title: impl Into<String>, username: impl Into<String>, item_id: ItemId) -> Self {
        Self {
            title: title.into(),
            username: username.into(),
            item_id,
            otp_field_present: false,
            otp_field_value: None,
        }
    }

    pub fn with_otp_field(mut self, state: OtpFieldState) -> Self {
        self.otp_field_present = state.present;
        self.otp_field_value = state.value;
        self
    }

    pub fn key(&self) -> MatchKey {
        MatchKey::new(&self.title, &self.username)
    }
}

/// Composite `(title, username)` key. Both parts are trimmed and otherwise
/// compared byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchKey {
    pub title: String,
    pub username: String,
}

impl MatchKey {
    pub fn new(title: &str, username: &str) -> Self {
        Self {
            title: title.trim().to_string(),
            username: username.trim().to_string(),
        }
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (User: {})", self.title, self.username)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPair {
    pub source: SourceRecord,
    pub destination: DestinationRecord,
}

/// A canonical `otpauth://` URI ready to be written to the destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TotpUri(String);

impl TotpUri {
    pub(crate) fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// The URI with the value of its `secret` parameter masked, for logs.
    pub fn redacted(&self) -> String {
        let Some((head, query)) = self.0.split_once('?') else {
            return self.0.clone();
        };
        let pairs: Vec<String> = query
            .split('&')
            .map(|pair| match pair.split_once('=') {
                Some((name, _)) if name.eq_ignore_ascii_case("secret") => format!("{}=***", name),
                _ => pair.to_string(),
            })
            .collect();
        format!("{}?{}", head, pairs.join("&"))
    }
}

impl fmt::Display for TotpUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Live,
    DryRun,
    Cleanup,
}

impl Mode {
    /// Maps the `--dry-run` / `--clear` flags to a mode and whether writes are
    /// simulated. Cleanup combined with dry-run stays a cleanup plan.
    pub fn from_flags(dry_run: bool, clear: bool) -> (Mode, bool) {
        match (dry_run, clear) {
            (_, true) => (Mode::Cleanup, dry_run),
            (true, false) => (Mode::DryRun, true),
            (false, false) => (Mode::Live, false),
        }
    }

    pub fn action_label(&self) -> &'static str {
        match self {
            Mode::Cleanup => "CLEARING/DELETING",
            Mode::Live | Mode::DryRun => "UPDATING",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    Patch { target: ItemId, uri: TotpUri },
    Delete { target: ItemId },
    Skip { target: ItemId, reason: String },
}

impl Operation {
    pub fn target(&self) -> &ItemId {
        match self {
            Operation::Patch { target, .. }
            | Operation::Delete { target }
            | Operation::Skip { target, .. } => target,
        }
    }
}

/// An operation together with the record it came from, as handed to the
/// executor. Simulated operations must never reach the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedOperation {
    pub operation: Operation,
    pub simulated: bool,
    pub key: MatchKey,
}

impl PlannedOperation {
    pub fn target(&self) -> &ItemId {
        self.operation.target()
    }
}
