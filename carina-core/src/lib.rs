//! Carina Core
//!
//! Resource model, schemas and the provider interface shared by Carina
//! providers and the CLI.

pub mod differ;
pub mod provider;
pub mod resource;
pub mod schema;
