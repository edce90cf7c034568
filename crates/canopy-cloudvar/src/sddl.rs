use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The fixed set of SDDL datatypes a Cloud Variable can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datatype {
    Void,
    String,
    Bool,
    Int8,
    Int16,
    Int32,
    Uint8,
    Uint16,
    Uint32,
    Float32,
    Float64,
    Datetime,
}

/// Whether a Cloud Variable is a device-reported sensor or a cloud-to-device
/// control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Sensor,
    Control,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDef {
    pub name: String,
    pub datatype: Datatype,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    pub category: Category,
    #[serde(default)]
    pub control_kind: Option<String>,
}

impl VarDef {
    pub fn new(name: impl Into<String>, datatype: Datatype, category: Category) -> Self {
        Self {
            name: name.into(),
            datatype,
            min: None,
            max: None,
            category,
            control_kind: None,
        }
    }

    /// Builds a `VarDef` from one entry of an SDDL-extension map, where the
    /// variable name is the map key rather than a field embedded in the
    /// value (the wire shape is keyed `{name: {category, datatype,
    /// min_value, max_value, control_type}}`, never `{name: {name: ..., ...}}`).
    pub fn from_wire(name: impl Into<String>, value: serde_json::Value) -> Result<Self> {
        let wire: VarDefWire = serde_json::from_value(value)
            .map_err(|e| Error::Message(format!("invalid vardef: {e}")))?;
        Ok(Self {
            name: name.into(),
            datatype: wire.datatype,
            min: wire.min_value,
            max: wire.max_value,
            category: wire.category,
            control_kind: wire.control_type,
        })
    }
}

/// The on-the-wire shape of one SDDL-extension map entry, grounded on
/// `jsonDeviceClassItem`: no `name` field, since the name is the map key.
#[derive(Debug, Clone, Deserialize)]
struct VarDefWire {
    datatype: Datatype,
    #[serde(default)]
    min_value: Option<f64>,
    #[serde(default)]
    max_value: Option<f64>,
    category: Category,
    #[serde(default)]
    control_type: Option<String>,
}

/// The ordered set of `VarDef`s published by a device, built up incrementally
/// as report frames arrive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SddlDocument {
    vardefs: Vec<VarDef>,
}

impl SddlDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vardefs(&self) -> &[VarDef] {
        &self.vardefs
    }

    pub fn lookup(&self, name: &str) -> Option<&VarDef> {
        self.vardefs.iter().find(|v| v.name == name)
    }

    /// Idempotently merge a partial SDDL extension. Re-declaring an existing
    /// variable with the same datatype is a no-op; redeclaring it with a
    /// different datatype is a validation error.
    pub fn extend(&mut self, vardef: VarDef) -> Result<()> {
        if let Some(existing) = self.vardefs.iter().find(|v| v.name == vardef.name) {
            if existing.datatype != vardef.datatype {
                return Err(Error::Message(format!(
                    "cannot redeclare variable {} with a different datatype",
                    vardef.name
                )));
            }
            return Ok(());
        }
        self.vardefs.push(vardef);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_wire_takes_name_from_map_key_not_value() {
        let vardef = VarDef::from_wire(
            "cpu",
            serde_json::json!({"datatype": "float32", "category": "sensor", "min_value": 0.0, "max_value": 100.0}),
        )
        .unwrap();
        assert_eq!(vardef.name, "cpu");
        assert_eq!(vardef.datatype, Datatype::Float32);
        assert_eq!(vardef.min, Some(0.0));
        assert_eq!(vardef.max, Some(100.0));
    }

    #[test]
    fn from_wire_rejects_missing_datatype() {
        assert!(VarDef::from_wire("cpu", serde_json::json!({"category": "sensor"})).is_err());
    }
}
