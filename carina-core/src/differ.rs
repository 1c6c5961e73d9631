//! Differ - Compare desired state with current state to decide an action
//!
//! Attributes flagged `force_new` in the schema cannot be changed in place,
//! so any change to one of them turns into a replacement.

use std::collections::HashMap;

use crate::resource::{Resource, State, Value};
use crate::schema::ResourceSchema;

/// What must happen to bring a resource to its desired state
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Resource does not exist -> needs creation
    Create,
    /// A force-new attribute changed -> delete then create
    Replace { changed_attributes: Vec<String> },
    /// Resource exists with in-place differences
    Update { changed_attributes: Vec<String> },
    /// Resource exists with no differences -> no action needed
    NoChange,
}

impl Action {
    /// Returns whether this Action involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Action::NoChange)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Replace { changed_attributes } => {
                write!(f, "replace ({})", changed_attributes.join(", "))
            }
            Action::Update { changed_attributes } => {
                write!(f, "update ({})", changed_attributes.join(", "))
            }
            Action::NoChange => write!(f, "no change"),
        }
    }
}

/// Compare desired state with current state
pub fn diff(schema: &ResourceSchema, desired: &Resource, current: &State) -> Action {
    if !current.exists {
        return Action::Create;
    }

    let changed = find_changed_attributes(schema, &desired.attributes, &current.attributes);

    if changed.is_empty() {
        Action::NoChange
    } else if changed.iter().any(|name| schema.is_force_new(name)) {
        Action::Replace {
            changed_attributes: changed,
        }
    } else {
        Action::Update {
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state
fn find_changed_attributes(
    schema: &ResourceSchema,
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        // An unset computed attribute keeps whatever the provider reported
        if schema.is_computed(key) && desired_value == &Value::String(String::new()) {
            continue;
        }

        match current.get(key) {
            Some(current_value) if current_value == desired_value => {}
            _ => changed.push(key.clone()),
        }
    }

    changed.sort();
    changed
}
