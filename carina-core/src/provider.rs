//! Provider - Trait abstracting resource lifecycle operations
//!
//! A Provider defines operations for a specific infrastructure (Cloudflare, etc.).
//! It is responsible for turning lifecycle hooks into actual API calls and
//! reconciling the results back into local [`State`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::resource::{ResourceId, State};
use crate::schema::ResourceSchema;

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub resource_id: Option<ResourceId>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref id) = self.resource_id {
            write!(f, "[{}] {}", id, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource_id: None,
            cause: None,
        }
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// =============================================================================
// Diagnostics
// =============================================================================

/// A single error reported by a lifecycle operation
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub summary: String,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
        }
    }

    /// Error diagnostic carrying the error's own text
    pub fn from_err(err: &dyn std::error::Error) -> Self {
        Self::error(err.to_string())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: {}", self.summary)
    }
}

/// Ordered collection of diagnostics. Empty means success.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_err(err: &dyn std::error::Error) -> Self {
        Self(vec![Diagnostic::from_err(err)])
    }

    /// Diagnostic reported when the operation's context was cancelled
    pub fn cancelled() -> Self {
        Self::from_err(&Cancelled)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_error(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }
}

impl From<ProviderError> for Diagnostics {
    fn from(err: ProviderError) -> Self {
        Self::from_err(&err)
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diagnostic: Diagnostic) -> Self {
        Self(vec![diagnostic])
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.0.iter().map(|d| d.to_string()).collect();
        write!(f, "{}", lines.join("\n"))
    }
}

// =============================================================================
// Cancellation
// =============================================================================

/// Returned when an operation was aborted through its [`Context`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Execution context handed to every lifecycle operation
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: CancellationToken,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `fut` to completion unless the context is cancelled first.
    /// The future is dropped on cancellation.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Cancelled> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Cancelled),
            out = fut => Ok(out),
        }
    }
}

// =============================================================================
// Provider Trait
// =============================================================================

/// Definition of resource types that a Provider can handle
pub trait ResourceType: Send + Sync {
    /// Resource type name (e.g., "access_ca_certificate")
    fn name(&self) -> &'static str;

    /// Attribute schema for this resource type
    fn schema(&self) -> ResourceSchema;
}

/// Main Provider trait
///
/// Each infrastructure provider implements this trait. The resource type is
/// taken from `state.id.resource_type`. Hooks report failures as
/// [`Diagnostics`] and mutate `state` in place; an empty result is success.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "cloudflare")
    fn name(&self) -> &'static str;

    /// List of resource types this Provider can handle
    fn resource_types(&self) -> Vec<Box<dyn ResourceType>>;

    /// Create the resource described by `state` and record its identifier
    fn create<'a>(&'a self, ctx: &'a Context, state: &'a mut State) -> BoxFuture<'a, Diagnostics>;

    /// Refresh `state` from the remote side.
    ///
    /// Clears the identifier if the resource no longer exists.
    fn read<'a>(&'a self, ctx: &'a Context, state: &'a mut State) -> BoxFuture<'a, Diagnostics>;

    /// Apply in-place changes
    fn update<'a>(&'a self, ctx: &'a Context, state: &'a mut State) -> BoxFuture<'a, Diagnostics>;

    /// Delete the resource and clear the identifier
    fn delete<'a>(&'a self, ctx: &'a Context, state: &'a mut State) -> BoxFuture<'a, Diagnostics>;

    /// Seed state for a pre-existing resource.
    ///
    /// `state.identifier` holds the user-supplied import ID.
    fn import<'a>(
        &'a self,
        ctx: &'a Context,
        state: State,
    ) -> BoxFuture<'a, ProviderResult<Vec<State>>>;
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        (**self).resource_types()
    }

    fn create<'a>(&'a self, ctx: &'a Context, state: &'a mut State) -> BoxFuture<'a, Diagnostics> {
        (**self).create(ctx, state)
    }

    fn read<'a>(&'a self, ctx: &'a Context, state: &'a mut State) -> BoxFuture<'a, Diagnostics> {
        (**self).read(ctx, state)
    }

    fn update<'a>(&'a self, ctx: &'a Context, state: &'a mut State) -> BoxFuture<'a, Diagnostics> {
        (**self).update(ctx, state)
    }

    fn delete<'a>(&'a self, ctx: &'a Context, state: &'a mut State) -> BoxFuture<'a, Diagnostics> {
        (**self).delete(ctx, state)
    }

    fn import<'a>(
        &'a self,
        ctx: &'a Context,
        state: State,
    ) -> BoxFuture<'a, ProviderResult<Vec<State>>> {
        (**self).import(ctx, state)
    }
}
