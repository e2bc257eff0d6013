//! Authentication hook for validating a client's identity.
//!
//! Roomcast's own rule is deliberately small: a username of 4 to 15
//! characters. That rule lives in [`UsernameAuthenticator`], but the server
//! only ever talks to the [`Authenticator`] trait, so an embedder can swap
//! in a lookup against their own user store without touching the
//! connection lifecycle.

use std::future::Future;

use roomcast_protocol::ClientAuth;

use crate::SessionError;

/// Validates a client's auth request and returns the username to use.
///
/// # Trait bounds
///
/// - `Send + Sync` → one authenticator is shared by every connection task.
/// - `'static` → it lives as long as the server.
///
/// # Example
///
/// ```rust
/// use roomcast_protocol::ClientAuth;
/// use roomcast_session::{Authenticator, SessionError};
///
/// /// Lets everyone in under a fixed name. Handy in demos.
/// struct GuestAuthenticator;
///
/// impl Authenticator for GuestAuthenticator {
///     async fn authenticate(&self, _auth: &ClientAuth) -> Result<String, SessionError> {
///         Ok("guest".to_string())
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Checks the request and returns the username the account gets.
    ///
    /// # Errors
    /// [`SessionError::AuthFailed`] with a human-readable reason; the
    /// server sends that reason back to the client before closing.
    fn authenticate(
        &self,
        auth: &ClientAuth,
    ) -> impl Future<Output = Result<String, SessionError>> + Send;
}

/// The default [`Authenticator`]: accepts any username whose trimmed
/// length is within bounds.
#[derive(Debug, Clone, Copy)]
pub struct UsernameAuthenticator {
    min_chars: usize,
    max_chars: usize,
}

impl UsernameAuthenticator {
    /// Shortest accepted username, in characters.
    pub const MIN_CHARS: usize = 4;
    /// Longest accepted username, in characters.
    pub const MAX_CHARS: usize = 15;

    pub fn new() -> Self {
        Self {
            min_chars: Self::MIN_CHARS,
            max_chars: Self::MAX_CHARS,
        }
    }

    /// Validates a username without going through the async trait.
    pub fn validate(&self, username: &str) -> Result<String, SessionError> {
        let trimmed = username.trim();
        let chars = trimmed.chars().count();
        if chars < self.min_chars || chars > self.max_chars {
            return Err(SessionError::AuthFailed(format!(
                "username must be between {} and {} characters",
                self.min_chars, self.max_chars
            )));
        }
        Ok(trimmed.to_string())
    }
}

impl Default for UsernameAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

impl Authenticator for UsernameAuthenticator {
    async fn authenticate(&self, auth: &ClientAuth) -> Result<String, SessionError> {
        self.validate(&auth.username)
    }
}
