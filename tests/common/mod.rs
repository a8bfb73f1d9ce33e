#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use totp_patcher::domain::model::{DestinationRecord, ItemId, OtpFieldState, TotpUri};
use totp_patcher::domain::ports::Destination;
use totp_patcher::{MigrationError, Result};

/// In-memory vault that records every mutation it receives.
#[derive(Default)]
pub struct MockVault {
    items: Vec<DestinationRecord>,
    fields: Mutex<HashMap<String, String>>,
    mutations: Mutex<Vec<String>>,
    failing: HashSet<String>,
}

impl MockVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, title: &str, username: &str, id: &str) -> Self {
        self.items
            .push(DestinationRecord::new(title, username, ItemId::new(id)));
        self
    }

    pub fn with_field(self, id: &str, value: &str) -> Self {
        self.fields
            .lock()
            .unwrap()
            .insert(id.to_string(), value.to_string());
        self
    }

    pub fn failing_on(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn field(&self, id: &str) -> Option<String> {
        self.fields.lock().unwrap().get(id).cloned()
    }

    pub fn mutations(&self) -> Vec<String> {
        self.mutations.lock().unwrap().clone()
    }

    fn check(&self, action: &str, target: &ItemId) -> Result<()> {
        if self.failing.contains(target.as_str()) {
            return Err(MigrationError::adapter(action, target, "item is locked"));
        }
        Ok(())
    }
}

#[async_trait]
impl Destination for MockVault {
    async fn list_items(&self) -> Result<Vec<DestinationRecord>> {
        Ok(self.items.clone())
    }

    async fn inspect_otp_field(&self, target: &ItemId) -> Result<OtpFieldState> {
        Ok(match self.field(target.as_str()) {
            Some(value) => OtpFieldState::present(Some(value)),
            None => OtpFieldState::absent(),
        })
    }

    async fn set_otp_field(&self, target: &ItemId, uri: &TotpUri) -> Result<()> {
        self.check("update", target)?;
        self.mutations
            .lock()
            .unwrap()
            .push(format!("set {}", target));
        self.fields
            .lock()
            .unwrap()
            .insert(target.to_string(), uri.to_string());
        Ok(())
    }

    async fn clear_otp_field(&self, target: &ItemId) -> Result<()> {
        self.check("delete", target)?;
        self.mutations
            .lock()
            .unwrap()
            .push(format!("clear {}", target));
        self.fields.lock().unwrap().remove(target.as_str());
        Ok(())
    }
}

pub fn bitwarden_export(items: &[(&str, &str, &str)]) -> Vec<u8> {
    let items: Vec<serde_json::Value> = items
        .iter()
        .map(|(name, username, totp)| {
            serde_json::json!({
                "type": 1,
                "name": name,
                "login": {"username": username, "password": "hunter2", "totp": totp}
            })
        })
        .collect();
    serde_json::to_vec(&serde_json::json!({"encrypted": false, "items": items})).unwrap()
}
