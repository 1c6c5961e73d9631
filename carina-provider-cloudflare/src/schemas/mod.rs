//! Cloudflare resource schema definitions

pub mod access_ca_certificate;

use carina_core::schema::ResourceSchema;

/// Returns all Cloudflare schemas
pub fn all_schemas() -> Vec<ResourceSchema> {
    vec![access_ca_certificate::access_ca_certificate_schema()]
}

/// Find the schema for a resource type
pub fn get_schema(resource_type: &str) -> Option<ResourceSchema> {
    all_schemas()
        .into_iter()
        .find(|s| s.resource_type == resource_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_schema() {
        assert!(get_schema("access_ca_certificate").is_some());
        assert!(get_schema("unknown").is_none());
    }
}
