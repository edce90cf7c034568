use chrono::{DateTime, Utc};
use canopy_cloudvar::SddlDocument;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    NoAccess,
    ReadOnlyAccess,
    ReadWriteAccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareLevel {
    NoSharing,
    SharingAllowed,
    ShareRevokeAllowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    LowPriority,
    MedPriority,
    HighPriority,
    Sms,
    Email,
    InApp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub username: String,
    pub email: String,
    pub activation_code: String,
    pub is_activated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: Uuid,
    pub name: String,
    pub secret_key: String,
    pub location_note: String,
    pub public_access_level: AccessLevel,
    pub sddl: SddlDocument,
    pub last_activity_time: Option<DateTime<Utc>>,
    pub ws_connected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrganizationMemberInfo {
    pub username: String,
    pub is_owner: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: i64,
    pub device_id: Uuid,
    pub notify_type: NotificationType,
    pub datetime: DateTime<Utc>,
    pub msg: String,
    pub is_dismissed: bool,
}

/// Sort order and pagination for [`crate::Connection::device_list`].
#[derive(Debug, Clone, Default)]
pub struct DeviceQuery {
    pub sort_by: Vec<String>,
    pub filter: Option<String>,
}

impl DeviceQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort_by(mut self, fields: impl IntoIterator<Item = String>) -> Self {
        self.sort_by = fields.into_iter().collect();
        self
    }

    pub fn filter(mut self, expr: impl Into<String>) -> Self {
        self.filter = Some(expr.into());
        self
    }
}
