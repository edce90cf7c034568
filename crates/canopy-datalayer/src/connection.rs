use std::collections::HashSet;

use async_trait::async_trait;
use canopy_cloudvar::CloudVarSample;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{
    Account, AccessLevel, Device, DeviceQuery, Notification, NotificationType, Organization,
    ShareLevel,
};

/// Storage contract for the Canopy backend: accounts, devices,
/// organizations, Cloud Variable samples, and the pigeon listener/worker
/// registry, all behind one abstract connection so the message bus and
/// job handlers never touch a concrete database driver directly.
///
/// Flattened from the original's object-interface design (`Account`,
/// `Device`, `Organization` each carrying their own behavior) into a single
/// repository-style trait keyed by id, the way a Rust store trait usually
/// reads.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn create_account(&self, username: &str, email: &str, password: &str) -> Result<Account>;
    async fn delete_account(&self, username: &str) -> Result<()>;
    async fn is_name_available(&self, name: &str) -> Result<bool>;
    async fn lookup_account(&self, username_or_email: &str) -> Result<Account>;
    async fn lookup_account_verify_password(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<Account>;
    async fn set_password(&self, username: &str, new_password: &str) -> Result<()>;
    async fn gen_reset_password_code(&self, username: &str) -> Result<String>;
    async fn reset_password(&self, username: &str, code: &str, new_password: &str) -> Result<()>;
    async fn activate_account(&self, username: &str, code: &str) -> Result<()>;

    async fn create_device(
        &self,
        name: &str,
        device_id: Option<Uuid>,
        secret_key: Option<String>,
        public_access: AccessLevel,
    ) -> Result<Device>;
    async fn delete_device(&self, device_id: Uuid) -> Result<()>;
    async fn lookup_device(&self, device_id: Uuid) -> Result<Device>;
    async fn lookup_device_verify_secret_key(&self, device_id: Uuid, secret: &str) -> Result<Device>;
    async fn extend_sddl(&self, device_id: Uuid, partial: Value) -> Result<()>;
    async fn insert_sample(
        &self,
        device_id: Uuid,
        varname: &str,
        sample: CloudVarSample,
    ) -> Result<()>;
    async fn historic_data(
        &self,
        device_id: Uuid,
        varname: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CloudVarSample>>;
    async fn latest_data_by_name(
        &self,
        device_id: Uuid,
        varname: &str,
    ) -> Result<Option<CloudVarSample>>;
    async fn update_last_activity_time(
        &self,
        device_id: Uuid,
        t: Option<DateTime<Utc>>,
    ) -> Result<()>;
    async fn update_ws_connected(&self, device_id: Uuid, connected: bool) -> Result<()>;
    async fn set_account_access(
        &self,
        device_id: Uuid,
        username: &str,
        access: AccessLevel,
        sharing: ShareLevel,
    ) -> Result<()>;
    async fn device_list(&self, query: &DeviceQuery, start: i32, count: i32) -> Result<Vec<Device>>;
    async fn insert_notification(
        &self,
        device_id: Uuid,
        notify_type: NotificationType,
        msg: &str,
    ) -> Result<Notification>;
    async fn historic_notifications(&self, device_id: Uuid) -> Result<Vec<Notification>>;
    async fn dismiss_notification(&self, notification_id: i64) -> Result<()>;

    async fn create_organization(&self, owner_username: &str, name: &str) -> Result<Organization>;
    async fn delete_organization(&self, name: &str) -> Result<()>;
    async fn lookup_organization(&self, name: &str) -> Result<Organization>;
    async fn add_member(&self, org: &str, username: &str, is_owner: bool) -> Result<()>;
    async fn remove_member(&self, org: &str, username: &str) -> Result<()>;
    async fn create_team(&self, org: &str, team_name: &str, alias: &str) -> Result<()>;
    async fn delete_team(&self, org: &str, alias: &str) -> Result<()>;

    async fn get_listeners(&self, key: &str) -> Result<HashSet<String>>;
    async fn register_listener(&self, hostname: &str, key: &str) -> Result<()>;
    async fn register_worker(&self, hostname: &str) -> Result<()>;
    async fn workers(&self) -> Result<Vec<String>>;
}
