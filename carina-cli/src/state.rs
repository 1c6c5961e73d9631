//! State file structures for persisting managed resources locally

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use carina_core::resource::{ResourceId, State, Value};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to read state file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write state file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid state file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Failed to serialize state: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Unsupported state file version {0}")]
    UnsupportedVersion(u32),
}

/// The main state file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Monotonically increasing number for each state modification
    pub serial: u64,
    /// Unique identifier for this state lineage
    pub lineage: String,
    /// Version of carina-cf that last modified this state
    pub carina_version: String,
    /// All managed resources
    pub resources: Vec<ResourceState>,
}

impl StateFile {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage: uuid::Uuid::new_v4().to_string(),
            carina_version: env!("CARGO_PKG_VERSION").to_string(),
            resources: Vec::new(),
        }
    }

    /// Load a state file, or start a new one if it does not exist yet
    pub fn load(path: &Path) -> Result<Self, StateError> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path).map_err(|source| StateError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let state: StateFile =
            serde_json::from_str(&content).map_err(|source| StateError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        if state.version > Self::CURRENT_VERSION {
            return Err(StateError::UnsupportedVersion(state.version));
        }
        Ok(state)
    }

    /// Bump the serial and write the state via a temporary file
    pub fn save(&mut self, path: &Path) -> Result<(), StateError> {
        self.serial += 1;
        self.carina_version = env!("CARGO_PKG_VERSION").to_string();

        let write_err = |source| StateError::Write {
            path: path.display().to_string(),
            source,
        };
        let content = serde_json::to_string_pretty(self).map_err(StateError::Serialize)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(write_err)?;
        fs::rename(&tmp, path).map_err(write_err)
    }

    pub fn find_resource(&self, resource_type: &str, name: &str) -> Option<&ResourceState> {
        self.resources
            .iter()
            .find(|r| r.resource_type == resource_type && r.name == name)
    }

    /// Add or update a resource in the state
    pub fn upsert_resource(&mut self, resource: ResourceState) {
        if let Some(existing) = self
            .resources
            .iter_mut()
            .find(|r| r.resource_type == resource.resource_type && r.name == resource.name)
        {
            *existing = resource;
        } else {
            self.resources.push(resource);
        }
    }

    pub fn remove_resource(&mut self, resource_type: &str, name: &str) -> Option<ResourceState> {
        let pos = self
            .resources
            .iter()
            .position(|r| r.resource_type == resource_type && r.name == name)?;
        Some(self.resources.remove(pos))
    }

    /// Record `state`: present resources are upserted, absent ones removed
    pub fn record(&mut self, provider: &str, state: &State) {
        if state.exists {
            self.upsert_resource(ResourceState::from_state(provider, state));
        } else {
            self.remove_resource(&state.id.resource_type, &state.id.name);
        }
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// State of a single managed resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub resource_type: String,
    pub name: String,
    /// Provider name (e.g., "cloudflare")
    pub provider: String,
    /// Provider-side identifier
    pub identifier: String,
    pub attributes: HashMap<String, Value>,
}

impl ResourceState {
    pub fn from_state(provider: impl Into<String>, state: &State) -> Self {
        Self {
            resource_type: state.id.resource_type.clone(),
            name: state.id.name.clone(),
            provider: provider.into(),
            identifier: state.identifier_str().to_string(),
            attributes: state.attributes.clone(),
        }
    }

    pub fn to_state(&self) -> State {
        State::existing(
            ResourceId::new(&self.resource_type, &self.name),
            self.attributes.clone(),
        )
        .with_identifier(&self.identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cert_state(name: &str, identifier: &str) -> State {
        let mut state = State::not_found(ResourceId::new("access_ca_certificate", name));
        state.set_attribute("zone_id", "z1");
        state.set_attribute("aud", "aud-1");
        state.set_identifier(identifier);
        state
    }

    #[test]
    fn test_state_file_new() {
        let state = StateFile::new();
        assert_eq!(state.version, StateFile::CURRENT_VERSION);
        assert_eq!(state.serial, 0);
        assert!(!state.lineage.is_empty());
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_record_upserts_and_removes() {
        let mut file = StateFile::new();
        file.record("cloudflare", &cert_state("ssh", "cert-1"));
        file.record("cloudflare", &cert_state("ssh", "cert-2"));
        assert_eq!(file.resources.len(), 1);
        assert_eq!(file.resources[0].identifier, "cert-2");

        let mut gone = cert_state("ssh", "cert-2");
        gone.clear_identifier();
        file.record("cloudflare", &gone);
        assert!(file.resources.is_empty());
    }

    #[test]
    fn test_resource_state_round_trip() {
        let state = cert_state("ssh", "cert-1");
        let restored = ResourceState::from_state("cloudflare", &state).to_state();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_load_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateFile::load(&dir.path().join("none.json")).unwrap();
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carina-cf.state.json");

        let mut file = StateFile::new();
        file.record("cloudflare", &cert_state("ssh", "cert-1"));
        file.save(&path).unwrap();
        file.save(&path).unwrap();

        let loaded = StateFile::load(&path).unwrap();
        assert_eq!(loaded.serial, 2);
        assert_eq!(loaded.lineage, file.lineage);
        let resource = loaded.find_resource("access_ca_certificate", "ssh").unwrap();
        assert_eq!(resource.identifier, "cert-1");
        assert_eq!(resource.attributes.get("aud"), Some(&Value::from("aud-1")));
    }

    #[test]
    fn test_state_error_messages() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = StateError::Serialize(source);
        assert!(err.to_string().starts_with("Failed to serialize state: "));

        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = StateError::Parse {
            path: "s.json".to_string(),
            source,
        };
        assert!(err.to_string().starts_with("Invalid state file s.json: "));
    }

    #[test]
    fn test_load_rejects_newer_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            r#"{"version": 9, "serial": 0, "lineage": "l", "carina_version": "x", "resources": []}"#,
        )
        .unwrap();

        assert!(matches!(
            StateFile::load(&path),
            Err(StateError::UnsupportedVersion(9))
        ));
    }
}
