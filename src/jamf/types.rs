//! Response shapes of the Jamf Pro Classic API.
//!
//! The Classic API reports unset fields as empty strings, so the accessor
//! methods fold `""` into `None`.

use serde::Deserialize;

/// One entry from the computer list endpoint.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ComputerRef {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ComputerList {
    #[serde(default)]
    pub computers: Vec<ComputerRef>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ComputerEnvelope {
    #[serde(default)]
    pub computer: Option<Computer>,
}

/// A full computer record.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Computer {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub hardware: Hardware,
    #[serde(default)]
    pub location: Location,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct General {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub serial_number: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Hardware {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub model_identifier: Option<String>,
}

/// Who the device is assigned to, per the source of truth.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Location {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub realname: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

impl Computer {
    pub fn serial_number(&self) -> Option<&str> {
        non_empty(&self.general.serial_number)
    }

    pub fn model_identifier(&self) -> Option<&str> {
        non_empty(&self.hardware.model_identifier)
    }

    pub fn model_name(&self) -> Option<&str> {
        non_empty(&self.hardware.model)
    }

    pub fn username(&self) -> Option<&str> {
        non_empty(&self.location.username)
    }
}

impl Location {
    pub fn realname(&self) -> Option<&str> {
        non_empty(&self.realname)
    }

    pub fn email_address(&self) -> Option<&str> {
        non_empty(&self.email_address)
    }

    pub fn phone_number(&self) -> Option<&str> {
        non_empty(&self.phone_number)
    }

    pub fn position(&self) -> Option<&str> {
        non_empty(&self.position)
    }
}
