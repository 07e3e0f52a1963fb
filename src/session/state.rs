use super::{SessionError, SessionStorage, AUTH_TOKEN_KEY, LAST_LOGIN_KEY};
use secrecy::{ExposeSecret, SecretString};
use std::{fmt, time::Duration};

/// The two client-held session signals, read together from storage.
#[derive(Clone)]
pub struct SessionState {
    pub token: SecretString,
    /// `None` when the timestamp is missing or unreadable.
    pub last_login_ms: Option<u64>,
}

impl SessionState {
    #[must_use]
    pub fn new(token: SecretString, last_login_ms: u64) -> Self {
        Self {
            token,
            last_login_ms: Some(last_login_ms),
        }
    }

    /// Read the session from storage. `None` when there is no token.
    ///
    /// # Errors
    /// Returns an error if storage cannot be read.
    pub fn load(storage: &dyn SessionStorage) -> Result<Option<Self>, SessionError> {
        let Some(token) = storage.get(AUTH_TOKEN_KEY)?.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };

        let last_login_ms = storage
            .get(LAST_LOGIN_KEY)?
            .and_then(|value| value.trim().parse::<u64>().ok());

        Ok(Some(Self {
            token: SecretString::from(token),
            last_login_ms,
        }))
    }

    /// # Errors
    /// Returns an error if storage cannot be written.
    pub fn save(&self, storage: &dyn SessionStorage) -> Result<(), SessionError> {
        storage.set(AUTH_TOKEN_KEY, self.token.expose_secret())?;
        if let Some(last_login_ms) = self.last_login_ms {
            touch(storage, last_login_ms)?;
        }
        Ok(())
    }

    /// Remove both keys. Both removals are attempted even if the first fails.
    ///
    /// # Errors
    /// Returns the first storage error encountered.
    pub fn clear(storage: &dyn SessionStorage) -> Result<(), SessionError> {
        let token = storage.remove(AUTH_TOKEN_KEY);
        let last_login = storage.remove(LAST_LOGIN_KEY);
        token.and(last_login)
    }

    /// Milliseconds since the last login; a missing timestamp counts as the epoch.
    #[must_use]
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_login_ms.unwrap_or(0))
    }

    #[must_use]
    pub fn is_stale(&self, now_ms: u64, timeout: Duration) -> bool {
        u128::from(self.age_ms(now_ms)) > timeout.as_millis()
    }
}

/// Record `now_ms` as the last successful login.
///
/// # Errors
/// Returns an error if storage cannot be written.
pub fn touch(storage: &dyn SessionStorage, now_ms: u64) -> Result<(), SessionError> {
    storage.set(LAST_LOGIN_KEY, &now_ms.to_string())
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("token", &"***")
            .field("last_login_ms", &self.last_login_ms)
            .finish()
    }
}
