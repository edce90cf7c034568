pub mod auth;
pub mod connection;
pub mod error;
pub mod memory;
pub mod sqlite;
pub mod types;

pub use connection::Connection;
pub use error::{Error, Result};
pub use memory::InMemoryConnection;
pub use sqlite::SqliteConnection;
pub use types::{
    AccessLevel, Account, Device, DeviceQuery, Notification, NotificationType, Organization,
    OrganizationMemberInfo, ShareLevel,
};
