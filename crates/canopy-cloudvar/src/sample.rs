use chrono::{DateTime, Utc};

use crate::value::CloudVarValue;

/// A single `(timestamp, value)` reading. Samples are append-only and
/// monotone per `(device, varname)` by server-assigned time — the server
/// always stamps `timestamp`, never trusting a device-supplied time.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudVarSample {
    pub timestamp: DateTime<Utc>,
    pub value: CloudVarValue,
}

impl CloudVarSample {
    pub fn new(timestamp: DateTime<Utc>, value: CloudVarValue) -> Self {
        Self { timestamp, value }
    }
}
