use crate::domain::model::{DestinationRecord, ItemId, OtpFieldState, TotpUri};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn vault(&self) -> &str;
    fn op_path(&self) -> &str;
    fn field_label(&self) -> &str;
    fn issuer(&self) -> Option<&str>;
    fn command_timeout(&self) -> Duration;
    fn concurrent_requests(&self) -> usize;
    fn retry_attempts(&self) -> u32;
    fn retry_delay(&self) -> Duration;
}

/// The password manager receiving the secrets. Any session or authentication
/// state is owned by the implementation.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Fails when the destination cannot be reached at all.
    async fn check_available(&self) -> Result<()> {
        Ok(())
    }

    async fn list_items(&self) -> Result<Vec<DestinationRecord>>;

    async fn inspect_otp_field(&self, target: &ItemId) -> Result<OtpFieldState>;

    async fn set_otp_field(&self, target: &ItemId, uri: &TotpUri) -> Result<()>;

    async fn clear_otp_field(&self, target: &ItemId) -> Result<()>;
}
