use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Computer,
    Mobile,
}

/// MDM platform a [`DeviceRecord`] was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Jamf,
    Kandji,
    Intune,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Jamf, SourceKind::Kandji, SourceKind::Intune];

    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Jamf => "Jamf",
            SourceKind::Kandji => "Kandji",
            SourceKind::Intune => "Intune",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "jamf" => Ok(SourceKind::Jamf),
            "kandji" => Ok(SourceKind::Kandji),
            "intune" => Ok(SourceKind::Intune),
            other => Err(format!(
                "unknown source `{other}` (expected jamf, kandji or intune)"
            )),
        }
    }
}

/// A device as reported by an MDM, flattened to the fields the sync needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub serial: String,
    pub name: String,
    pub model: String,
    pub prestage_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub device_type: DeviceType,
    pub source: SourceKind,
}

impl DeviceRecord {
    pub fn new(serial: impl Into<String>, device_type: DeviceType, source: SourceKind) -> Self {
        Self {
            serial: serial.into().trim().to_string(),
            name: String::new(),
            model: String::new(),
            prestage_name: None,
            email: None,
            username: None,
            device_type,
            source,
        }
    }

    /// Records without a serial cannot be joined against Snipe-IT.
    pub fn has_serial(&self) -> bool {
        !self.serial.trim().is_empty()
    }

    /// Asset name to write; the serial stands in for a blank device name.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.serial
        } else {
            &self.name
        }
    }
}

/// Turns an empty or whitespace-only string into `None`.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
