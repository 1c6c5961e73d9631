//! Resource type definitions and lifecycle implementations

pub mod access_ca_certificate;

use carina_core::provider::{Diagnostic, Diagnostics, ResourceType};
use carina_core::schema::ResourceSchema;

use crate::schemas::access_ca_certificate::access_ca_certificate_schema;

/// access_ca_certificate resource type
pub struct AccessCaCertificateType;

impl ResourceType for AccessCaCertificateType {
    fn name(&self) -> &'static str {
        access_ca_certificate::RESOURCE_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        access_ca_certificate_schema()
    }
}

/// Returns all resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![Box::new(AccessCaCertificateType)]
}

pub(crate) fn unknown_resource_type(resource_type: &str) -> Diagnostics {
    Diagnostic::error(format!("Unknown resource type: {}", resource_type)).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_types() {
        let types = resource_types();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].name(), "access_ca_certificate");
        assert_eq!(types[0].schema().resource_type, "access_ca_certificate");
    }
}
