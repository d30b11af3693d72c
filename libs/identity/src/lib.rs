//! Identity gateway
//!
//! Wraps the external identity provider. The record managers only need two
//! things from it: create an account and get back an opaque identity id,
//! and check that an identity id exists. Password storage and token
//! issuance stay inside the provider.

use async_trait::async_trait;
use common::CoreResult;

pub mod http;
pub mod memory;

pub use http::{HttpIdentityProvider, IdentityConfig};
pub use memory::MemoryIdentityProvider;

/// Port to the identity provider
///
/// Errors follow the core taxonomy: `DuplicateIdentity` when the email is
/// taken, `ValidationFailed` when the provider rejects the credentials, and
/// `UpstreamUnavailable` for anything the provider could not answer.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account and return its identity id
    async fn create_account(&self, email: &str, password: &str) -> CoreResult<String>;

    /// Whether the provider knows this identity id
    async fn identity_exists(&self, identity_id: &str) -> CoreResult<bool>;
}
