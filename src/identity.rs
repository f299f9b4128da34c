use async_trait::async_trait;

use crate::error::AuthError;
use crate::models::Identity;

/// Email/password identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;
    async fn sign_out(&self, identity: &Identity);
    /// The identity present at startup, if a previous session can be resumed.
    async fn restore(&self) -> Option<Identity>;
}

/// Trims the email and rejects blank input before any provider round-trip.
pub fn normalize_credentials(email: &str, password: &str) -> Result<String, AuthError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    if !email.contains('@') {
        return Err(AuthError::InvalidEmail);
    }
    Ok(email.to_string())
}
