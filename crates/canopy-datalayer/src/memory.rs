use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use canopy_cloudvar::{CloudVarSample, SddlDocument, VarDef};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{hash_password, verify_password};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::types::{
    Account, AccessLevel, Device, DeviceQuery, Notification, NotificationType, Organization,
    ShareLevel,
};

#[derive(Debug, Clone)]
struct AccountRecord {
    account: Account,
    password_hash: String,
    reset_code: Option<String>,
}

#[derive(Debug, Clone)]
struct DeviceRecord {
    device: Device,
    samples: HashMap<String, Vec<CloudVarSample>>,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, AccountRecord>,
    devices: HashMap<Uuid, DeviceRecord>,
    organizations: HashMap<String, Organization>,
    org_members: HashMap<String, Vec<(String, bool)>>,
    listeners: HashMap<String, HashSet<String>>,
    workers: HashSet<String>,
    notifications: Vec<Notification>,
    next_notification_id: i64,
}

/// In-process `Connection` implementation used for tests and local
/// development. Mirrors the plain `HashMap` + single `RwLock` shape of
/// `SessionMetadata`'s in-memory index rather than reaching for a database
/// driver when nothing is actually persisted across process restarts.
#[derive(Default, Clone)]
pub struct InMemoryConnection {
    state: Arc<RwLock<State>>,
}

impl InMemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }
}

fn normalize(name: &str) -> String {
    name.to_lowercase()
}

#[async_trait]
impl Connection for InMemoryConnection {
    async fn create_account(&self, username: &str, email: &str, password: &str) -> Result<Account> {
        let mut state = self.state.write().await;
        let key = normalize(username);
        if state.accounts.contains_key(&key) || state.organizations.contains_key(&key) {
            return Err(Error::Validation(format!("name {username} already taken")));
        }
        let account = Account {
            username: username.to_string(),
            email: email.to_string(),
            activation_code: Uuid::new_v4().to_string(),
            is_activated: false,
        };
        state.accounts.insert(
            key,
            AccountRecord {
                account: account.clone(),
                password_hash: hash_password(password)?,
                reset_code: None,
            },
        );
        Ok(account)
    }

    async fn delete_account(&self, username: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .accounts
            .remove(&normalize(username))
            .map(|_| ())
            .ok_or(Error::NotFound)
    }

    async fn is_name_available(&self, name: &str) -> Result<bool> {
        let state = self.state.read().await;
        let key = normalize(name);
        Ok(!state.accounts.contains_key(&key) && !state.organizations.contains_key(&key))
    }

    async fn lookup_account(&self, username_or_email: &str) -> Result<Account> {
        let state = self.state.read().await;
        find_account(&state.accounts, username_or_email)
            .map(|r| r.account.clone())
            .ok_or(Error::NotFound)
    }

    async fn lookup_account_verify_password(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<Account> {
        let state = self.state.read().await;
        let record = find_account(&state.accounts, username_or_email).ok_or(Error::NotFound)?;
        if !verify_password(password, &record.password_hash) {
            return Err(Error::InvalidPassword);
        }
        Ok(record.account.clone())
    }

    async fn set_password(&self, username: &str, new_password: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let key = normalize(username);
        let hash = hash_password(new_password)?;
        let record = state.accounts.get_mut(&key).ok_or(Error::NotFound)?;
        record.password_hash = hash;
        Ok(())
    }

    async fn gen_reset_password_code(&self, username: &str) -> Result<String> {
        let mut state = self.state.write().await;
        let key = normalize(username);
        let code = Uuid::new_v4().to_string();
        let record = state.accounts.get_mut(&key).ok_or(Error::NotFound)?;
        record.reset_code = Some(code.clone());
        Ok(code)
    }

    async fn reset_password(&self, username: &str, code: &str, new_password: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let key = normalize(username);
        let hash = hash_password(new_password)?;
        let record = state.accounts.get_mut(&key).ok_or(Error::NotFound)?;
        if record.reset_code.as_deref() != Some(code) {
            return Err(Error::Validation("invalid reset code".into()));
        }
        record.password_hash = hash;
        record.reset_code = None;
        Ok(())
    }

    async fn activate_account(&self, username: &str, code: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let key = normalize(username);
        let record = state.accounts.get_mut(&key).ok_or(Error::NotFound)?;
        if record.account.activation_code != code {
            return Err(Error::Validation("invalid activation code".into()));
        }
        record.account.is_activated = true;
        Ok(())
    }

    async fn create_device(
        &self,
        name: &str,
        device_id: Option<Uuid>,
        secret_key: Option<String>,
        public_access: AccessLevel,
    ) -> Result<Device> {
        let mut state = self.state.write().await;
        let id = device_id.unwrap_or_else(Uuid::new_v4);
        if state.devices.contains_key(&id) {
            return Err(Error::Validation(format!("device {id} already exists")));
        }
        let device = Device {
            id,
            name: name.to_string(),
            secret_key: secret_key.unwrap_or_else(|| Uuid::new_v4().to_string()),
            location_note: String::new(),
            public_access_level: public_access,
            sddl: SddlDocument::new(),
            last_activity_time: None,
            ws_connected: false,
        };
        state.devices.insert(
            id,
            DeviceRecord {
                device: device.clone(),
                samples: HashMap::new(),
            },
        );
        Ok(device)
    }

    async fn delete_device(&self, device_id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        state.devices.remove(&device_id).map(|_| ()).ok_or(Error::NotFound)
    }

    async fn lookup_device(&self, device_id: Uuid) -> Result<Device> {
        let state = self.state.read().await;
        state
            .devices
            .get(&device_id)
            .map(|r| r.device.clone())
            .ok_or(Error::NotFound)
    }

    async fn lookup_device_verify_secret_key(&self, device_id: Uuid, secret: &str) -> Result<Device> {
        let device = self.lookup_device(device_id).await?;
        if device.secret_key != secret {
            return Err(Error::InvalidPassword);
        }
        Ok(device)
    }

    async fn extend_sddl(&self, device_id: Uuid, partial: Value) -> Result<()> {
        let mut state = self.state.write().await;
        let record = state.devices.get_mut(&device_id).ok_or(Error::NotFound)?;
        let Value::Object(map) = partial else {
            return Err(Error::Validation("sddl extension must be a JSON object".into()));
        };
        for (name, spec) in map {
            let vardef = VarDef::from_wire(name.clone(), spec)
                .map_err(|e| Error::Validation(format!("invalid vardef for {name}: {e}")))?;
            record
                .device
                .sddl
                .extend(vardef)
                .map_err(|e| Error::Validation(e.to_string()))?;
        }
        Ok(())
    }

    async fn insert_sample(
        &self,
        device_id: Uuid,
        varname: &str,
        sample: CloudVarSample,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let record = state.devices.get_mut(&device_id).ok_or(Error::NotFound)?;
        record
            .samples
            .entry(varname.to_string())
            .or_default()
            .push(sample);
        Ok(())
    }

    async fn historic_data(
        &self,
        device_id: Uuid,
        varname: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CloudVarSample>> {
        let state = self.state.read().await;
        let record = state.devices.get(&device_id).ok_or(Error::NotFound)?;
        let mut samples: Vec<_> = record
            .samples
            .get(varname)
            .map(|v| v.iter().filter(|s| s.timestamp >= start && s.timestamp <= end).cloned().collect())
            .unwrap_or_default();
        samples.sort_by_key(|s| s.timestamp);
        Ok(samples)
    }

    async fn latest_data_by_name(
        &self,
        device_id: Uuid,
        varname: &str,
    ) -> Result<Option<CloudVarSample>> {
        let state = self.state.read().await;
        let record = state.devices.get(&device_id).ok_or(Error::NotFound)?;
        Ok(record
            .samples
            .get(varname)
            .and_then(|v| v.iter().max_by_key(|s| s.timestamp))
            .cloned())
    }

    async fn update_last_activity_time(
        &self,
        device_id: Uuid,
        t: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let record = state.devices.get_mut(&device_id).ok_or(Error::NotFound)?;
        record.device.last_activity_time = Some(t.unwrap_or_else(Utc::now));
        Ok(())
    }

    async fn update_ws_connected(&self, device_id: Uuid, connected: bool) -> Result<()> {
        let mut state = self.state.write().await;
        let record = state.devices.get_mut(&device_id).ok_or(Error::NotFound)?;
        record.device.ws_connected = connected;
        Ok(())
    }

    async fn set_account_access(
        &self,
        device_id: Uuid,
        _username: &str,
        _access: AccessLevel,
        _sharing: ShareLevel,
    ) -> Result<()> {
        let state = self.state.read().await;
        if !state.devices.contains_key(&device_id) {
            return Err(Error::NotFound);
        }
        // Per-account access-control-list storage is not modeled in the
        // in-memory backend; the sqlite backend persists it in
        // `device_access`.
        Ok(())
    }

    async fn device_list(&self, query: &DeviceQuery, start: i32, count: i32) -> Result<Vec<Device>> {
        let state = self.state.read().await;
        let mut devices: Vec<Device> = state.devices.values().map(|r| r.device.clone()).collect();
        if query.sort_by.iter().any(|f| f == "name") {
            devices.sort_by(|a, b| a.name.cmp(&b.name));
        }
        let start = start.max(0) as usize;
        if count < 0 {
            Ok(devices.split_off(start.min(devices.len())))
        } else {
            let end = (start + count as usize).min(devices.len());
            Ok(devices.get(start.min(devices.len())..end).unwrap_or_default().to_vec())
        }
    }

    async fn insert_notification(
        &self,
        device_id: Uuid,
        notify_type: NotificationType,
        msg: &str,
    ) -> Result<Notification> {
        let mut state = self.state.write().await;
        if !state.devices.contains_key(&device_id) {
            return Err(Error::NotFound);
        }
        state.next_notification_id += 1;
        let notification = Notification {
            id: state.next_notification_id,
            device_id,
            notify_type,
            datetime: Utc::now(),
            msg: msg.to_string(),
            is_dismissed: false,
        };
        state.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn historic_notifications(&self, device_id: Uuid) -> Result<Vec<Notification>> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.device_id == device_id)
            .cloned()
            .collect())
    }

    async fn dismiss_notification(&self, notification_id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        let notification = state
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or(Error::NotFound)?;
        notification.is_dismissed = true;
        Ok(())
    }

    async fn create_organization(&self, owner_username: &str, name: &str) -> Result<Organization> {
        let mut state = self.state.write().await;
        let key = normalize(name);
        if state.accounts.contains_key(&key) || state.organizations.contains_key(&key) {
            return Err(Error::Validation(format!("name {name} already taken")));
        }
        let org = Organization {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };
        state.organizations.insert(key.clone(), org.clone());
        state
            .org_members
            .insert(key, vec![(owner_username.to_string(), true)]);
        Ok(org)
    }

    async fn delete_organization(&self, name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let key = normalize(name);
        state.org_members.remove(&key);
        state.organizations.remove(&key).map(|_| ()).ok_or(Error::NotFound)
    }

    async fn lookup_organization(&self, name: &str) -> Result<Organization> {
        let state = self.state.read().await;
        state
            .organizations
            .get(&normalize(name))
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn add_member(&self, org: &str, username: &str, is_owner: bool) -> Result<()> {
        let mut state = self.state.write().await;
        let key = normalize(org);
        if !state.organizations.contains_key(&key) {
            return Err(Error::NotFound);
        }
        let members = state.org_members.entry(key).or_default();
        members.retain(|(u, _)| u != username);
        members.push((username.to_string(), is_owner));
        Ok(())
    }

    async fn remove_member(&self, org: &str, username: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let key = normalize(org);
        let members = state.org_members.get_mut(&key).ok_or(Error::NotFound)?;
        let remaining_owners = members
            .iter()
            .filter(|(u, owner)| *owner && u != username)
            .count();
        let was_owner = members.iter().any(|(u, owner)| *owner && u == username);
        if was_owner && remaining_owners == 0 {
            return Err(Error::Validation(
                "cannot remove the last owner of an organization".into(),
            ));
        }
        members.retain(|(u, _)| u != username);
        Ok(())
    }

    async fn create_team(&self, org: &str, _team_name: &str, _alias: &str) -> Result<()> {
        let state = self.state.read().await;
        if !state.organizations.contains_key(&normalize(org)) {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    async fn delete_team(&self, org: &str, _alias: &str) -> Result<()> {
        let state = self.state.read().await;
        if !state.organizations.contains_key(&normalize(org)) {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    async fn get_listeners(&self, key: &str) -> Result<HashSet<String>> {
        let state = self.state.read().await;
        Ok(state.listeners.get(key).cloned().unwrap_or_default())
    }

    async fn register_listener(&self, hostname: &str, key: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .listeners
            .entry(key.to_string())
            .or_default()
            .insert(hostname.to_string());
        Ok(())
    }

    async fn register_worker(&self, hostname: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.workers.insert(hostname.to_string());
        Ok(())
    }

    async fn workers(&self) -> Result<Vec<String>> {
        let state = self.state.read().await;
        Ok(state.workers.iter().cloned().collect())
    }
}

fn find_account<'a>(
    accounts: &'a HashMap<String, AccountRecord>,
    username_or_email: &str,
) -> Option<&'a AccountRecord> {
    let key = normalize(username_or_email);
    accounts
        .get(&key)
        .or_else(|| accounts.values().find(|r| normalize(&r.account.email) == key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_lookup_account() {
        let conn = InMemoryConnection::new();
        conn.create_account("alice", "alice@example.com", "hunter2")
            .await
            .unwrap();
        let account = conn.lookup_account("alice").await.unwrap();
        assert_eq!(account.username, "alice");

        let verified = conn
            .lookup_account_verify_password("alice", "hunter2")
            .await
            .unwrap();
        assert_eq!(verified.username, "alice");

        let err = conn
            .lookup_account_verify_password("alice", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPassword));
    }

    #[tokio::test]
    async fn sample_append_and_range_query() {
        let conn = InMemoryConnection::new();
        let device = conn
            .create_device("thermostat", None, None, AccessLevel::NoAccess)
            .await
            .unwrap();

        let t1 = DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let t2 = DateTime::parse_from_rfc3339("2020-01-01T01:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        conn.insert_sample(
            device.id,
            "cpu",
            CloudVarSample::new(t1, canopy_cloudvar::CloudVarValue::F32(0.5)),
        )
        .await
        .unwrap();
        conn.insert_sample(
            device.id,
            "cpu",
            CloudVarSample::new(t2, canopy_cloudvar::CloudVarValue::F32(0.7)),
        )
        .await
        .unwrap();

        let history = conn.historic_data(device.id, "cpu", t1, t2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].timestamp, t1);

        let latest = conn.latest_data_by_name(device.id, "cpu").await.unwrap().unwrap();
        assert_eq!(latest.value, canopy_cloudvar::CloudVarValue::F32(0.7));
    }

    #[tokio::test]
    async fn remove_member_rejects_removing_last_owner() {
        let conn = InMemoryConnection::new();
        conn.create_account("bob", "bob@example.com", "pw").await.unwrap();
        conn.create_organization("bob", "acme").await.unwrap();
        let err = conn.remove_member("acme", "bob").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn listener_registry_is_idempotent() {
        let conn = InMemoryConnection::new();
        conn.register_listener("host-a", "device:123").await.unwrap();
        conn.register_listener("host-a", "device:123").await.unwrap();
        let listeners = conn.get_listeners("device:123").await.unwrap();
        assert_eq!(listeners.len(), 1);
    }
}
