use super::{
    state::{touch, SessionState},
    AuthBackend, AuthUser, SessionError, SessionStorage, LOGIN_PATH, SESSION_TIMEOUT,
};
use crate::epoch_millis;
use secrecy::SecretString;
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, error, info, instrument, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedirectReason {
    NoToken,
    Stale,
    Invalid,
    LoggedOut,
}

impl RedirectReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoToken => "no token",
            Self::Stale => "session expired",
            Self::Invalid => "token rejected",
            Self::LoggedOut => "logged out",
        }
    }
}

impl fmt::Display for RedirectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where to send an unauthenticated visitor. The reason is for logs only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Redirect {
    pub to: &'static str,
    pub reason: RedirectReason,
}

impl Redirect {
    const fn login(reason: RedirectReason) -> Self {
        Self {
            to: LOGIN_PATH,
            reason,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardOutcome {
    Authenticated(AuthUser),
    Redirect(Redirect),
}

impl GuardOutcome {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

pub struct SessionGuard {
    storage: Arc<dyn SessionStorage>,
    backend: Arc<dyn AuthBackend>,
    timeout: Duration,
}

impl SessionGuard {
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>, backend: Arc<dyn AuthBackend>) -> Self {
        Self {
            storage,
            backend,
            timeout: SESSION_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sign in with a password and store the new session.
    ///
    /// # Errors
    /// Returns an error if the backend rejects the credentials or storage fails.
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthUser, SessionError> {
        self.login_at(email, password, epoch_millis()).await
    }

    /// [`login`](Self::login) with an explicit clock.
    ///
    /// # Errors
    /// Returns an error if the backend rejects the credentials or storage fails.
    #[instrument(skip(self, password))]
    pub async fn login_at(
        &self,
        email: &str,
        password: &SecretString,
        now_ms: u64,
    ) -> Result<AuthUser, SessionError> {
        let sign_in = self.backend.sign_in(email, password).await?;

        SessionState::new(sign_in.access_token, now_ms).save(self.storage.as_ref())?;

        info!(user_id = %sign_in.user.id, "admin signed in");

        Ok(sign_in.user)
    }

    /// Decide whether the stored session may see admin views.
    pub async fn check(&self) -> GuardOutcome {
        self.check_at(epoch_millis()).await
    }

    /// [`check`](Self::check) with an explicit clock.
    #[instrument(skip(self))]
    pub async fn check_at(&self, now_ms: u64) -> GuardOutcome {
        let state = match SessionState::load(self.storage.as_ref()) {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!("no stored token");
                return GuardOutcome::Redirect(Redirect::login(RedirectReason::NoToken));
            }
            Err(err) => {
                error!("failed to read session storage: {err}");
                self.clear();
                return GuardOutcome::Redirect(Redirect::login(RedirectReason::Invalid));
            }
        };

        if state.is_stale(now_ms, self.timeout) {
            warn!(age_ms = state.age_ms(now_ms), "session older than timeout, logging out");
            self.sign_out(&state.token).await;
            self.clear();
            return GuardOutcome::Redirect(Redirect::login(RedirectReason::Stale));
        }

        match self.backend.get_user(&state.token).await {
            Ok(Some(user)) => {
                if let Err(err) = touch(self.storage.as_ref(), now_ms) {
                    warn!("failed to refresh last login time: {err}");
                }
                debug!(user_id = %user.id, "session confirmed");
                GuardOutcome::Authenticated(user)
            }
            Ok(None) => {
                warn!("auth backend rejected the stored token");
                self.clear();
                GuardOutcome::Redirect(Redirect::login(RedirectReason::Invalid))
            }
            Err(err) => {
                error!("failed to validate session: {err}");
                self.clear();
                GuardOutcome::Redirect(Redirect::login(RedirectReason::Invalid))
            }
        }
    }

    /// Best-effort remote sign-out; local storage is always cleared.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Redirect {
        match SessionState::load(self.storage.as_ref()) {
            Ok(Some(state)) => self.sign_out(&state.token).await,
            Ok(None) => debug!("no stored token to sign out"),
            Err(err) => error!("failed to read session storage: {err}"),
        }

        self.clear();

        info!("admin signed out");

        Redirect::login(RedirectReason::LoggedOut)
    }

    async fn sign_out(&self, token: &SecretString) {
        if let Err(err) = self.backend.sign_out(token).await {
            warn!("remote sign-out failed: {err}");
        }
    }

    fn clear(&self) {
        if let Err(err) = SessionState::clear(self.storage.as_ref()) {
            error!("failed to clear session storage: {err}");
        }
    }
}
