//! Scope resolution for Access resources
//!
//! Access resources live either on an account or on a zone. Exactly one of
//! `account_id` / `zone_id` must be set on a resource.

use std::fmt;
use std::str::FromStr;

use carina_core::resource::State;
use thiserror::Error;

pub const ACCOUNT_ID: &str = "account_id";
pub const ZONE_ID: &str = "zone_id";

/// Container level an Access resource is defined at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierType {
    Account,
    Zone,
}

impl IdentifierType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierType::Account => "account",
            IdentifierType::Zone => "zone",
        }
    }

    /// State attribute holding the container ID
    pub fn attribute(&self) -> &'static str {
        match self {
            IdentifierType::Account => ACCOUNT_ID,
            IdentifierType::Zone => ZONE_ID,
        }
    }

    /// API path segment (e.g., "accounts" in `/accounts/{id}/...`)
    pub fn route_prefix(&self) -> &'static str {
        match self {
            IdentifierType::Account => "accounts",
            IdentifierType::Zone => "zones",
        }
    }
}

impl fmt::Display for IdentifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown identifier type {0:?}, expected \"account\" or \"zone\"")]
pub struct UnknownIdentifierType(pub String);

impl FromStr for IdentifierType {
    type Err = UnknownIdentifierType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "account" => Ok(IdentifierType::Account),
            "zone" => Ok(IdentifierType::Zone),
            other => Err(UnknownIdentifierType(other.to_string())),
        }
    }
}

/// Resolved scope: which container, and its ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessIdentifier {
    pub kind: IdentifierType,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("cannot specify both account_id and zone_id")]
    Both,

    #[error("must provide either account_id or zone_id")]
    Neither,
}

/// Resolve the scope of a resource from its `account_id` / `zone_id` attributes
pub fn init_identifier(state: &State) -> Result<AccessIdentifier, IdentifierError> {
    let account_id = state.get_str(ACCOUNT_ID);
    let zone_id = state.get_str(ZONE_ID);

    match (account_id.is_empty(), zone_id.is_empty()) {
        (false, false) => Err(IdentifierError::Both),
        (true, true) => Err(IdentifierError::Neither),
        (false, true) => Ok(AccessIdentifier {
            kind: IdentifierType::Account,
            value: account_id.to_string(),
        }),
        (true, false) => Ok(AccessIdentifier {
            kind: IdentifierType::Zone,
            value: zone_id.to_string(),
        }),
    }
}
