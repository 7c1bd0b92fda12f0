//! Session token: single-use identity proof for privileged stream starts

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// Opaque, unforgeable proof that a stream-start request follows a
/// service-originated activity launch.
///
/// Tokens compare by identity, not value: only a clone of the exact minted
/// handle matches. A fresh mint supersedes any prior token, even if that
/// token was never consumed.
#[derive(Debug, Clone)]
pub struct SessionToken(Arc<Uuid>);

impl SessionToken {
    /// Mint a new token. The caller is responsible for installing it as the
    /// single live token.
    pub fn mint() -> Self {
        Self(Arc::new(Uuid::new_v4()))
    }

    /// Identity comparison against another token handle
    pub fn same_token(&self, other: &SessionToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
