//! Response shapes of the Snipe-IT API.

use serde::Deserialize;

/// A hardware asset row.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Asset {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<AssignedUser>,
}

/// The user an asset is checked out to.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct AssignedUser {
    pub id: u64,
    #[serde(default)]
    pub username: Option<String>,
}

/// A hardware model row.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Model {
    pub id: u64,
    #[serde(default)]
    pub model_number: Option<String>,
}

/// A user row.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
}
