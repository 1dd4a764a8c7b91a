//! Bearer-token identity.
//!
//! Sign-in is handled by an external identity provider. The HTTP layer only
//! turns the bearer token it issued into the identity id that keys
//! [`Profile`](dormclean_core::Profile) records.

use async_trait::async_trait;
use dormclean_core::ProfileId;

/// Why a token was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRejected(pub String);

/// Resolves bearer tokens to identity ids.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify `token` and return the identity it names.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityRejected`] when the token is not acceptable.
    async fn verify(&self, token: &str) -> Result<ProfileId, IdentityRejected>;
}

/// Verifier for deployments behind an authenticating gateway.
///
/// The gateway has already validated the session and forwards the identity
/// id itself as the bearer token.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustedIdVerifier;

/// Longest identity id accepted from the gateway.
const MAX_ID_LEN: usize = 128;

#[async_trait]
impl IdentityVerifier for TrustedIdVerifier {
    async fn verify(&self, token: &str) -> Result<ProfileId, IdentityRejected> {
        let id = token.trim();
        if id.is_empty() || id.len() > MAX_ID_LEN {
            return Err(IdentityRejected("invalid identity token".to_string()));
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '|')) {
            return Err(IdentityRejected("identity token contains unexpected characters".to_string()));
        }
        Ok(ProfileId::new(id))
    }
}
