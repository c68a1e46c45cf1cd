//! Bearer token storage and the GitHub OAuth entry point.

use std::sync::Mutex;

use crate::error::{GardenerError, Result};

/// GitHub OAuth authorize endpoint.
pub const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
/// Scope requested from GitHub.
pub const OAUTH_SCOPE: &str = "repo";

/// Storage for the session's bearer token.
///
/// Passed explicitly to every client so tests can inject fake sessions.
#[cfg_attr(test, mockall::automock)]
pub trait SessionStore {
    /// Current bearer token, if signed in.
    fn token(&self) -> Option<String>;
    /// Persist a token after a successful code exchange.
    fn store(&self, token: &str) -> Result<()>;
    /// Forget the token (sign-out or rejected credentials).
    fn clear(&self) -> Result<()>;
}

/// Process-local session, lost on exit.
#[derive(Debug, Default)]
pub struct MemorySession {
    token: Mutex<Option<String>>,
}

impl MemorySession {
    /// Create a signed-out session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session already holding a token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl SessionStore for MemorySession {
    fn token(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn store(&self, token: &str) -> Result<()> {
        *self
            .token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self
            .token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}

/// Clear the session after a 401 and build the error that redirects to login.
///
/// A failure to clear is logged; the caller still gets `Unauthorized`.
pub fn reject_session<S: SessionStore + ?Sized>(session: &S) -> GardenerError {
    if let Err(err) = session.clear() {
        log::warn!("failed to clear rejected session: {err}");
    }
    GardenerError::unauthorized()
}

/// Build the GitHub authorize URL the user opens to sign in.
pub fn authorize_url(client_id: &str, redirect_uri: &str) -> Result<String> {
    let client_id = client_id.trim();
    if client_id.is_empty() {
        return Err(GardenerError::InvalidInput(
            "GitHub client id is required".to_string(),
        ));
    }
    Ok(format!(
        "{GITHUB_AUTHORIZE_URL}?client_id={}&redirect_uri={}&scope={OAUTH_SCOPE}",
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri.trim())
    ))
}

/// Pull the authorization code out of a callback URL or query string.
pub fn extract_callback_code(callback: &str) -> Result<String> {
    let query = callback
        .split_once('?')
        .map(|(_, query)| query)
        .unwrap_or(callback);
    let query = query.split('#').next().unwrap_or(query);
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "code")
        .map(|(_, value)| {
            urlencoding::decode(value)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
        .filter(|code| !code.trim().is_empty())
        .ok_or_else(|| {
            GardenerError::InvalidInput("No OAuth code received from GitHub.".to_string())
        })
}
