//! access_ca_certificate schema definition

use carina_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

pub const APPLICATION_ID: &str = "application_id";
pub const AUD: &str = "aud";
pub const PUBLIC_KEY: &str = "public_key";

/// Returns the schema for access_ca_certificate
///
/// Every user-settable attribute forces replacement: the remote API has no
/// update endpoint for this resource.
pub fn access_ca_certificate_schema() -> ResourceSchema {
    ResourceSchema::new("access_ca_certificate")
        .with_description(
            "Cloudflare Access can replace traditional SSH key models with short-lived \
             certificates issued to your users based on the token generated by their \
             Access login.",
        )
        .attribute(
            AttributeSchema::new("account_id", AttributeType::String)
                .computed()
                .optional()
                .force_new()
                .conflicts_with("zone_id")
                .with_description("The account identifier to target for the resource."),
        )
        .attribute(
            AttributeSchema::new("zone_id", AttributeType::String)
                .computed()
                .optional()
                .force_new()
                .conflicts_with("account_id")
                .with_description("The zone identifier to target for the resource."),
        )
        .attribute(
            AttributeSchema::new(APPLICATION_ID, AttributeType::String)
                .required()
                .force_new()
                .with_description("The Access Application ID to associate with the CA certificate."),
        )
        .attribute(
            AttributeSchema::new(AUD, AttributeType::String)
                .computed()
                .with_description("Application Audience (AUD) Tag of the CA certificate."),
        )
        .attribute(
            AttributeSchema::new(PUBLIC_KEY, AttributeType::String)
                .computed()
                .with_description("Cryptographic public key of the generated CA certificate."),
        )
}
