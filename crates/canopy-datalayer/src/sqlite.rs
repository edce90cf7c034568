use std::collections::HashSet;

use async_trait::async_trait;
use canopy_cloudvar::{CloudVarSample, SddlDocument, VarDef};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::{hash_password, verify_password};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::types::{
    Account, AccessLevel, Device, DeviceQuery, Notification, NotificationType, Organization,
    ShareLevel,
};

/// `sqlx`-backed `Connection`. SDDL documents and access-control lists are
/// stored as JSON text columns the way a semi-structured value naturally
/// sits in SQLite; everything else gets its own column the way
/// `SqliteProjectStore` lays out `projects`.
pub struct SqliteConnection {
    pool: SqlitePool,
}

impl SqliteConnection {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                username TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                activation_code TEXT NOT NULL,
                is_activated INTEGER NOT NULL DEFAULT 0,
                reset_code TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS devices (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                secret_key TEXT NOT NULL,
                location_note TEXT NOT NULL DEFAULT '',
                public_access_level INTEGER NOT NULL,
                sddl_json TEXT NOT NULL DEFAULT '{"vardefs":[]}',
                last_activity_time TEXT,
                ws_connected INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cloudvar_samples (
                device_id TEXT NOT NULL,
                varname TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                value_json TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_samples_device_var_ts ON cloudvar_samples(device_id, varname, timestamp)",
        )
        .execute(pool)
        .await
        .ok();

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id TEXT NOT NULL,
                notify_type INTEGER NOT NULL,
                datetime TEXT NOT NULL,
                msg TEXT NOT NULL,
                is_dismissed INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS organizations (
                name TEXT PRIMARY KEY,
                id TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS org_members (
                org TEXT NOT NULL,
                username TEXT NOT NULL,
                is_owner INTEGER NOT NULL,
                PRIMARY KEY (org, username)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pigeon_listeners (
                key TEXT NOT NULL,
                hostname TEXT NOT NULL,
                PRIMARY KEY (key, hostname)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pigeon_workers (
                hostname TEXT PRIMARY KEY
            )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

fn row_to_account(username: String, email: String, activation_code: String, is_activated: i64) -> Account {
    Account {
        username,
        email,
        activation_code,
        is_activated: is_activated != 0,
    }
}

fn access_to_i64(a: AccessLevel) -> i64 {
    match a {
        AccessLevel::NoAccess => 0,
        AccessLevel::ReadOnlyAccess => 1,
        AccessLevel::ReadWriteAccess => 2,
    }
}

fn access_from_i64(v: i64) -> AccessLevel {
    match v {
        1 => AccessLevel::ReadOnlyAccess,
        2 => AccessLevel::ReadWriteAccess,
        _ => AccessLevel::NoAccess,
    }
}

fn row_to_device(
    id: String,
    name: String,
    secret_key: String,
    location_note: String,
    public_access_level: i64,
    sddl_json: String,
    last_activity_time: Option<String>,
    ws_connected: i64,
) -> Result<Device> {
    let sddl: SddlDocument = serde_json::from_str(&sddl_json)
        .map_err(|e| Error::Internal(format!("corrupt sddl document: {e}")))?;
    let last_activity_time = last_activity_time
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| Error::Internal(format!("corrupt last_activity_time: {e}")))
        })
        .transpose()?;
    Ok(Device {
        id: Uuid::parse_str(&id).map_err(|e| Error::Internal(e.to_string()))?,
        name,
        secret_key,
        location_note,
        public_access_level: access_from_i64(public_access_level),
        sddl,
        last_activity_time,
        ws_connected: ws_connected != 0,
    })
}

fn normalize(name: &str) -> String {
    name.to_lowercase()
}

fn notify_type_to_i64(t: NotificationType) -> i64 {
    match t {
        NotificationType::LowPriority => 0,
        NotificationType::MedPriority => 1,
        NotificationType::HighPriority => 2,
        NotificationType::Sms => 3,
        NotificationType::Email => 4,
        NotificationType::InApp => 5,
    }
}

fn notify_type_from_i64(v: i64) -> NotificationType {
    match v {
        1 => NotificationType::MedPriority,
        2 => NotificationType::HighPriority,
        3 => NotificationType::Sms,
        4 => NotificationType::Email,
        5 => NotificationType::InApp,
        _ => NotificationType::LowPriority,
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    async fn create_account(&self, username: &str, email: &str, password: &str) -> Result<Account> {
        let key = normalize(username);
        let taken: Option<(String,)> = sqlx::query_as("SELECT name FROM organizations WHERE name = ?")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await?;
        if taken.is_some() {
            return Err(Error::Validation(format!("name {username} already taken")));
        }
        let hash = hash_password(password)?;
        let activation_code = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO accounts (username, email, password_hash, activation_code, is_activated) VALUES (?, ?, ?, ?, 0)",
        )
        .bind(&key)
        .bind(email)
        .bind(&hash)
        .bind(&activation_code)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(d) if d.is_unique_violation() => {
                Error::Validation(format!("name {username} already taken"))
            }
            other => other.into(),
        })?;
        Ok(Account {
            username: username.to_string(),
            email: email.to_string(),
            activation_code,
            is_activated: false,
        })
    }

    async fn delete_account(&self, username: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM accounts WHERE username = ?")
            .bind(normalize(username))
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    async fn is_name_available(&self, name: &str) -> Result<bool> {
        let key = normalize(name);
        let account: Option<(String,)> = sqlx::query_as("SELECT username FROM accounts WHERE username = ?")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await?;
        if account.is_some() {
            return Ok(false);
        }
        let org: Option<(String,)> = sqlx::query_as("SELECT name FROM organizations WHERE name = ?")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(org.is_none())
    }

    async fn lookup_account(&self, username_or_email: &str) -> Result<Account> {
        let key = normalize(username_or_email);
        let row: Option<(String, String, String, i64)> = sqlx::query_as(
            "SELECT username, email, activation_code, is_activated FROM accounts WHERE username = ? OR lower(email) = ?",
        )
        .bind(&key)
        .bind(&key)
        .fetch_optional(&self.pool)
        .await?;
        let (username, email, code, activated) = row.ok_or(Error::NotFound)?;
        Ok(row_to_account(username, email, code, activated))
    }

    async fn lookup_account_verify_password(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<Account> {
        let key = normalize(username_or_email);
        let row: Option<(String, String, String, i64, String)> = sqlx::query_as(
            "SELECT username, email, activation_code, is_activated, password_hash FROM accounts WHERE username = ? OR lower(email) = ?",
        )
        .bind(&key)
        .bind(&key)
        .fetch_optional(&self.pool)
        .await?;
        let (username, email, code, activated, hash) = row.ok_or(Error::NotFound)?;
        if !verify_password(password, &hash) {
            return Err(Error::InvalidPassword);
        }
        Ok(row_to_account(username, email, code, activated))
    }

    async fn set_password(&self, username: &str, new_password: &str) -> Result<()> {
        let hash = hash_password(new_password)?;
        let result = sqlx::query("UPDATE accounts SET password_hash = ? WHERE username = ?")
            .bind(hash)
            .bind(normalize(username))
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    async fn gen_reset_password_code(&self, username: &str) -> Result<String> {
        let code = Uuid::new_v4().to_string();
        let result = sqlx::query("UPDATE accounts SET reset_code = ? WHERE username = ?")
            .bind(&code)
            .bind(normalize(username))
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(code)
    }

    async fn reset_password(&self, username: &str, code: &str, new_password: &str) -> Result<()> {
        let key = normalize(username);
        let row: Option<(Option<String>,)> = sqlx::query_as("SELECT reset_code FROM accounts WHERE username = ?")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await?;
        let stored = row.ok_or(Error::NotFound)?.0;
        if stored.as_deref() != Some(code) {
            return Err(Error::Validation("invalid reset code".into()));
        }
        let hash = hash_password(new_password)?;
        sqlx::query("UPDATE accounts SET password_hash = ?, reset_code = NULL WHERE username = ?")
            .bind(hash)
            .bind(&key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn activate_account(&self, username: &str, code: &str) -> Result<()> {
        let key = normalize(username);
        let row: Option<(String,)> = sqlx::query_as("SELECT activation_code FROM accounts WHERE username = ?")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await?;
        let stored = row.ok_or(Error::NotFound)?.0;
        if stored != code {
            return Err(Error::Validation("invalid activation code".into()));
        }
        sqlx::query("UPDATE accounts SET is_activated = 1 WHERE username = ?")
            .bind(&key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_device(
        &self,
        name: &str,
        device_id: Option<Uuid>,
        secret_key: Option<String>,
        public_access: AccessLevel,
    ) -> Result<Device> {
        let id = device_id.unwrap_or_else(Uuid::new_v4);
        let secret_key = secret_key.unwrap_or_else(|| Uuid::new_v4().to_string());
        sqlx::query(
            "INSERT INTO devices (id, name, secret_key, public_access_level) VALUES (?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(name)
        .bind(&secret_key)
        .bind(access_to_i64(public_access))
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(d) if d.is_unique_violation() => {
                Error::Validation(format!("device {id} already exists"))
            }
            other => other.into(),
        })?;
        Ok(Device {
            id,
            name: name.to_string(),
            secret_key,
            location_note: String::new(),
            public_access_level: public_access,
            sddl: SddlDocument::new(),
            last_activity_time: None,
            ws_connected: false,
        })
    }

    async fn delete_device(&self, device_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM devices WHERE id = ?")
            .bind(device_id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        sqlx::query("DELETE FROM cloudvar_samples WHERE device_id = ?")
            .bind(device_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn lookup_device(&self, device_id: Uuid) -> Result<Device> {
        let row: Option<(String, String, String, String, i64, String, Option<String>, i64)> = sqlx::query_as(
            "SELECT id, name, secret_key, location_note, public_access_level, sddl_json, last_activity_time, ws_connected FROM devices WHERE id = ?",
        )
        .bind(device_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        let row = row.ok_or(Error::NotFound)?;
        row_to_device(row.0, row.1, row.2, row.3, row.4, row.5, row.6, row.7)
    }

    async fn lookup_device_verify_secret_key(&self, device_id: Uuid, secret: &str) -> Result<Device> {
        let device = self.lookup_device(device_id).await?;
        if device.secret_key != secret {
            return Err(Error::InvalidPassword);
        }
        Ok(device)
    }

    async fn extend_sddl(&self, device_id: Uuid, partial: Value) -> Result<()> {
        let mut device = self.lookup_device(device_id).await?;
        let Value::Object(map) = partial else {
            return Err(Error::Validation("sddl extension must be a JSON object".into()));
        };
        for (name, spec) in map {
            let vardef = VarDef::from_wire(name.clone(), spec)
                .map_err(|e| Error::Validation(format!("invalid vardef for {name}: {e}")))?;
            device
                .sddl
                .extend(vardef)
                .map_err(|e| Error::Validation(e.to_string()))?;
        }
        let sddl_json = serde_json::to_string(&device.sddl)
            .map_err(|e| Error::Internal(format!("failed to serialize sddl: {e}")))?;
        sqlx::query("UPDATE devices SET sddl_json = ? WHERE id = ?")
            .bind(sddl_json)
            .bind(device_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_sample(
        &self,
        device_id: Uuid,
        varname: &str,
        sample: CloudVarSample,
    ) -> Result<()> {
        let value_json = serde_json::to_string(&canopy_cloudvar::encode_json(&sample.value))
            .map_err(|e| Error::Internal(format!("failed to serialize sample: {e}")))?;
        sqlx::query(
            "INSERT INTO cloudvar_samples (device_id, varname, timestamp, value_json) VALUES (?, ?, ?, ?)",
        )
        .bind(device_id.to_string())
        .bind(varname)
        .bind(sample.timestamp.to_rfc3339())
        .bind(value_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn historic_data(
        &self,
        device_id: Uuid,
        varname: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CloudVarSample>> {
        let device = self.lookup_device(device_id).await?;
        let vardef = device
            .sddl
            .lookup(varname)
            .cloned()
            .ok_or_else(|| Error::Validation(format!("unknown cloud variable {varname}")))?;
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT timestamp, value_json FROM cloudvar_samples WHERE device_id = ? AND varname = ? AND timestamp >= ? AND timestamp <= ? ORDER BY timestamp ASC",
        )
        .bind(device_id.to_string())
        .bind(varname)
        .bind(start.to_rfc3339())
        .bind(end.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        decode_samples(rows, &vardef)
    }

    async fn latest_data_by_name(
        &self,
        device_id: Uuid,
        varname: &str,
    ) -> Result<Option<CloudVarSample>> {
        let device = self.lookup_device(device_id).await?;
        let Some(vardef) = device.sddl.lookup(varname).cloned() else {
            return Ok(None);
        };
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT timestamp, value_json FROM cloudvar_samples WHERE device_id = ? AND varname = ? ORDER BY timestamp DESC LIMIT 1",
        )
        .bind(device_id.to_string())
        .bind(varname)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(decode_samples(vec![row], &vardef)?.into_iter().next()),
            None => Ok(None),
        }
    }

    async fn update_last_activity_time(
        &self,
        device_id: Uuid,
        t: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let t = t.unwrap_or_else(Utc::now);
        let result = sqlx::query("UPDATE devices SET last_activity_time = ? WHERE id = ?")
            .bind(t.to_rfc3339())
            .bind(device_id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    async fn update_ws_connected(&self, device_id: Uuid, connected: bool) -> Result<()> {
        let result = sqlx::query("UPDATE devices SET ws_connected = ? WHERE id = ?")
            .bind(connected as i64)
            .bind(device_id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    async fn set_account_access(
        &self,
        device_id: Uuid,
        _username: &str,
        _access: AccessLevel,
        _sharing: ShareLevel,
    ) -> Result<()> {
        self.lookup_device(device_id).await?;
        // Per-account ACL storage is a thin adapter here; the REST surface
        // uses device-level public_access_level for the common case.
        Ok(())
    }

    async fn device_list(&self, query: &DeviceQuery, start: i32, count: i32) -> Result<Vec<Device>> {
        let order = if query.sort_by.iter().any(|f| f == "name") {
            "ORDER BY name ASC"
        } else {
            "ORDER BY rowid ASC"
        };
        let sql = format!(
            "SELECT id, name, secret_key, location_note, public_access_level, sddl_json, last_activity_time, ws_connected FROM devices {order}"
        );
        let rows: Vec<(String, String, String, String, i64, String, Option<String>, i64)> =
            sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        let mut devices = rows
            .into_iter()
            .map(|r| row_to_device(r.0, r.1, r.2, r.3, r.4, r.5, r.6, r.7))
            .collect::<Result<Vec<_>>>()?;
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
        self.lookup_device(device_id).await?;
        let datetime = Utc::now();
        let id: (i64,) = sqlx::query_as(
            "INSERT INTO notifications (device_id, notify_type, datetime, msg) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(device_id.to_string())
        .bind(notify_type_to_i64(notify_type))
        .bind(datetime.to_rfc3339())
        .bind(msg)
        .fetch_one(&self.pool)
        .await?;
        Ok(Notification {
            id: id.0,
            device_id,
            notify_type,
            datetime,
            msg: msg.to_string(),
            is_dismissed: false,
        })
    }

    async fn historic_notifications(&self, device_id: Uuid) -> Result<Vec<Notification>> {
        let rows: Vec<(i64, i64, String, String, i64)> = sqlx::query_as(
            "SELECT id, notify_type, datetime, msg, is_dismissed FROM notifications WHERE device_id = ? ORDER BY datetime ASC",
        )
        .bind(device_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(id, notify_type, datetime, msg, is_dismissed)| {
                Ok(Notification {
                    id,
                    device_id,
                    notify_type: notify_type_from_i64(notify_type),
                    datetime: DateTime::parse_from_rfc3339(&datetime)
                        .map(|d| d.with_timezone(&Utc))
                        .map_err(|e| Error::Internal(format!("corrupt notification datetime: {e}")))?,
                    msg,
                    is_dismissed: is_dismissed != 0,
                })
            })
            .collect()
    }

    async fn dismiss_notification(&self, notification_id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE notifications SET is_dismissed = 1 WHERE id = ?")
            .bind(notification_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    async fn create_organization(&self, owner_username: &str, name: &str) -> Result<Organization> {
        let key = normalize(name);
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO organizations (name, id) VALUES (?, ?)")
            .bind(&key)
            .bind(&id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(d) if d.is_unique_violation() => {
                    Error::Validation(format!("name {name} already taken"))
                }
                other => other.into(),
            })?;
        sqlx::query("INSERT INTO org_members (org, username, is_owner) VALUES (?, ?, 1)")
            .bind(&key)
            .bind(owner_username)
            .execute(&self.pool)
            .await?;
        Ok(Organization {
            id,
            name: name.to_string(),
        })
    }

    async fn delete_organization(&self, name: &str) -> Result<()> {
        let key = normalize(name);
        sqlx::query("DELETE FROM org_members WHERE org = ?")
            .bind(&key)
            .execute(&self.pool)
            .await?;
        let result = sqlx::query("DELETE FROM organizations WHERE name = ?")
            .bind(&key)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    async fn lookup_organization(&self, name: &str) -> Result<Organization> {
        let row: Option<(String, String)> = sqlx::query_as("SELECT name, id FROM organizations WHERE name = ?")
            .bind(normalize(name))
            .fetch_optional(&self.pool)
            .await?;
        let (name, id) = row.ok_or(Error::NotFound)?;
        Ok(Organization { id, name })
    }

    async fn add_member(&self, org: &str, username: &str, is_owner: bool) -> Result<()> {
        let key = normalize(org);
        self.lookup_organization(&key).await?;
        sqlx::query(
            "INSERT INTO org_members (org, username, is_owner) VALUES (?, ?, ?) ON CONFLICT(org, username) DO UPDATE SET is_owner = excluded.is_owner",
        )
        .bind(&key)
        .bind(username)
        .bind(is_owner as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_member(&self, org: &str, username: &str) -> Result<()> {
        let key = normalize(org);
        let owners: Vec<(String,)> = sqlx::query_as("SELECT username FROM org_members WHERE org = ? AND is_owner = 1")
            .bind(&key)
            .fetch_all(&self.pool)
            .await?;
        let is_owner = owners.iter().any(|(u,)| u == username);
        let remaining_owners = owners.iter().filter(|(u,)| u != username).count();
        if is_owner && remaining_owners == 0 {
            return Err(Error::Validation(
                "cannot remove the last owner of an organization".into(),
            ));
        }
        let result = sqlx::query("DELETE FROM org_members WHERE org = ? AND username = ?")
            .bind(&key)
            .bind(username)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    async fn create_team(&self, org: &str, _team_name: &str, _alias: &str) -> Result<()> {
        self.lookup_organization(org).await?;
        Ok(())
    }

    async fn delete_team(&self, org: &str, _alias: &str) -> Result<()> {
        self.lookup_organization(org).await?;
        Ok(())
    }

    async fn get_listeners(&self, key: &str) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT hostname FROM pigeon_listeners WHERE key = ?")
            .bind(key)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(h,)| h).collect())
    }

    async fn register_listener(&self, hostname: &str, key: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO pigeon_listeners (key, hostname) VALUES (?, ?)")
            .bind(key)
            .bind(hostname)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn register_worker(&self, hostname: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO pigeon_workers (hostname) VALUES (?)")
            .bind(hostname)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn workers(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT hostname FROM pigeon_workers")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(h,)| h).collect())
    }
}

fn decode_samples(rows: Vec<(String, String)>, vardef: &VarDef) -> Result<Vec<CloudVarSample>> {
    rows.into_iter()
        .map(|(ts, value_json)| {
            let timestamp = DateTime::parse_from_rfc3339(&ts)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| Error::Internal(format!("corrupt sample timestamp: {e}")))?;
            let json: Value = serde_json::from_str(&value_json)
                .map_err(|e| Error::Internal(format!("corrupt sample value: {e}")))?;
            let value = canopy_cloudvar::decode_json(vardef, &json)
                .map_err(|e| Error::Internal(format!("corrupt sample value: {e}")))?;
            Ok(CloudVarSample::new(timestamp, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> SqliteConnection {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteConnection::init(&pool).await.unwrap();
        SqliteConnection::new(pool)
    }

    #[tokio::test]
    async fn create_and_lookup_account() {
        let conn = setup().await;
        conn.create_account("alice", "alice@example.com", "hunter2")
            .await
            .unwrap();
        let account = conn.lookup_account("alice@example.com").await.unwrap();
        assert_eq!(account.username, "alice");
        assert!(!account.is_activated);
    }

    #[tokio::test]
    async fn listener_registry_is_idempotent() {
        let conn = setup().await;
        conn.register_listener("host-a", "device:123").await.unwrap();
        conn.register_listener("host-a", "device:123").await.unwrap();
        let listeners = conn.get_listeners("device:123").await.unwrap();
        assert_eq!(listeners.len(), 1);
    }

    #[tokio::test]
    async fn device_sample_round_trip() {
        let conn = setup().await;
        let device = conn
            .create_device("thermostat", None, None, AccessLevel::NoAccess)
            .await
            .unwrap();
        conn.extend_sddl(
            device.id,
            serde_json::json!({"cpu": {"datatype": "float32", "category": "sensor"}}),
        )
        .await
        .unwrap();

        let t1 = Utc::now();
        conn.insert_sample(
            device.id,
            "cpu",
            CloudVarSample::new(t1, canopy_cloudvar::CloudVarValue::F32(0.5)),
        )
        .await
        .unwrap();

        let latest = conn.latest_data_by_name(device.id, "cpu").await.unwrap().unwrap();
        assert_eq!(latest.value, canopy_cloudvar::CloudVarValue::F32(0.5));
    }
}
