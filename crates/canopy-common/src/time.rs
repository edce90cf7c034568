use chrono::{DateTime, Utc};

/// Current server time, always used in place of device-supplied timestamps
/// when a sample or activity record is saved.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}
