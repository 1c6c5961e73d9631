//! Carina Cloudflare Provider
//!
//! Cloudflare Provider implementation.
//!
//! ## Module Structure
//!
//! - `config` - Credentials and endpoint settings
//! - `client` - Cloudflare v4 API client
//! - `identifier` - Account / zone scope resolution
//! - `provider` - CloudflareProvider implementation
//! - `resources` - Resource types and their lifecycle operations
//! - `schemas` - Resource schemas

pub mod client;
pub mod config;
pub mod identifier;
pub mod provider;
pub mod resources;
pub mod schemas;

// Re-export main types
pub use client::{AccessCaCertificate, AccessCaCertificateApi, ApiError, CloudflareClient};
pub use config::ProviderConfig;
pub use identifier::{AccessIdentifier, IdentifierType, init_identifier};
pub use provider::CloudflareProvider;

use carina_core::provider::{
    BoxFuture, Context, Diagnostics, Provider, ProviderError, ProviderResult, ResourceType,
};
use carina_core::resource::State;

use resources::{access_ca_certificate, resource_types, unknown_resource_type};

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl<C: AccessCaCertificateApi> Provider for CloudflareProvider<C> {
    fn name(&self) -> &'static str {
        "cloudflare"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resource_types()
    }

    fn create<'a>(&'a self, ctx: &'a Context, state: &'a mut State) -> BoxFuture<'a, Diagnostics> {
        Box::pin(async move {
            match state.id.resource_type.as_str() {
                access_ca_certificate::RESOURCE_TYPE => {
                    access_ca_certificate::create(ctx, self.client(), state).await
                }
                other => unknown_resource_type(other),
            }
        })
    }

    fn read<'a>(&'a self, ctx: &'a Context, state: &'a mut State) -> BoxFuture<'a, Diagnostics> {
        Box::pin(async move {
            match state.id.resource_type.as_str() {
                access_ca_certificate::RESOURCE_TYPE => {
                    access_ca_certificate::read(ctx, self.client(), state).await
                }
                other => unknown_resource_type(other),
            }
        })
    }

    fn update<'a>(&'a self, _ctx: &'a Context, state: &'a mut State) -> BoxFuture<'a, Diagnostics> {
        Box::pin(async move {
            match state.id.resource_type.as_str() {
                access_ca_certificate::RESOURCE_TYPE => access_ca_certificate::update(state),
                other => unknown_resource_type(other),
            }
        })
    }

    fn delete<'a>(&'a self, ctx: &'a Context, state: &'a mut State) -> BoxFuture<'a, Diagnostics> {
        Box::pin(async move {
            match state.id.resource_type.as_str() {
                access_ca_certificate::RESOURCE_TYPE => {
                    access_ca_certificate::delete(ctx, self.client(), state).await
                }
                other => unknown_resource_type(other),
            }
        })
    }

    fn import<'a>(
        &'a self,
        ctx: &'a Context,
        state: State,
    ) -> BoxFuture<'a, ProviderResult<Vec<State>>> {
        Box::pin(async move {
            let resource_type = state.id.resource_type.clone();
            match resource_type.as_str() {
                access_ca_certificate::RESOURCE_TYPE => {
                    access_ca_certificate::import(ctx, self.client(), state).await
                }
                other => Err(ProviderError::new(format!("Unknown resource type: {}", other))
                    .for_resource(state.id)),
            }
        })
    }
}
