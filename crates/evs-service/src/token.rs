//! Live session token slot

use evs_core::SessionToken;

/// Holds the single live session token.
///
/// Minting supersedes the previous token immediately, even if it was never
/// consumed. The slot is cleared on every successful entry to INACTIVE, so
/// a token can never outlive the request it was minted for.
#[derive(Debug, Default)]
pub(crate) struct TokenSlot {
    live: Option<SessionToken>,
}

impl TokenSlot {
    /// Mint a fresh token and install it as the live one.
    pub fn mint(&mut self) -> SessionToken {
        let token = SessionToken::mint();
        self.live = Some(token.clone());
        token
    }

    pub fn clear(&mut self) {
        self.live = None;
    }

    /// Identity check against the live token. Absence of a live token (or
    /// of a candidate) always yields false.
    pub fn matches(&self, candidate: Option<&SessionToken>) -> bool {
        match (&self.live, candidate) {
            (Some(live), Some(candidate)) => live.same_token(candidate),
            _ => false,
        }
    }
}
