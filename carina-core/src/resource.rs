//! Resource - Representing resources and their state

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    /// Resource type (e.g., "access_ca_certificate")
    pub resource_type: String,
    /// Resource name (local name chosen by the user)
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    /// Borrow the inner string, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// Desired state declared in configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: HashMap<String, Value>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Local record of a managed resource
///
/// Holds the attributes known locally and the provider-side identifier.
/// An empty identifier means the resource is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: ResourceId,
    /// Provider-side identifier (e.g., the certificate ID)
    pub identifier: Option<String>,
    pub attributes: HashMap<String, Value>,
    /// Whether this state exists
    pub exists: bool,
}

impl State {
    pub fn not_found(id: ResourceId) -> Self {
        Self {
            id,
            identifier: None,
            attributes: HashMap::new(),
            exists: false,
        }
    }

    pub fn existing(id: ResourceId, attributes: HashMap<String, Value>) -> Self {
        Self {
            id,
            identifier: None,
            attributes,
            exists: true,
        }
    }

    /// Seed a state from desired configuration, before anything exists remotely
    pub fn planned(resource: &Resource) -> Self {
        Self {
            id: resource.id.clone(),
            identifier: None,
            attributes: resource.attributes.clone(),
            exists: false,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.set_identifier(identifier);
        self
    }

    /// Identifier as a string, empty when absent
    pub fn identifier_str(&self) -> &str {
        self.identifier.as_deref().unwrap_or("")
    }

    /// Set the identifier. An empty identifier marks the resource absent.
    pub fn set_identifier(&mut self, identifier: impl Into<String>) {
        let identifier = identifier.into();
        if identifier.is_empty() {
            self.clear_identifier();
        } else {
            self.identifier = Some(identifier);
            self.exists = true;
        }
    }

    pub fn clear_identifier(&mut self) {
        self.identifier = None;
        self.exists = false;
    }

    /// Read a string attribute, empty when unset or not a string
    pub fn get_str(&self, key: &str) -> &str {
        self.attributes
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }
}
