//! Admin session guard.
//!
//! The admin area keeps two values in local persistent storage: an opaque bearer
//! token issued by the hosted auth backend (`authToken`) and the time of the last
//! successful check in epoch milliseconds (`lastLoginTime`).
//!
//! Before an admin view is shown the [`SessionGuard`] runs two guard clauses in
//! order:
//!
//! 1. **Age.** A session whose last login is older than [`SESSION_TIMEOUT`] is
//!    logged out without asking the backend, so a stale timestamp can never be
//!    refreshed by the check itself.
//! 2. **Validity.** The backend is asked whether the token still belongs to a
//!    user. A confirmed user refreshes `lastLoginTime`; a rejection or any error
//!    clears local storage.
//!
//! Every failure ends in a redirect to [`LOGIN_PATH`]; the user is never told
//! whether the token was stale or invalid. [`SessionWatch`] repeats the check on
//! a fixed period while the admin area is open.

mod backend;
mod guard;
mod state;
mod storage;
mod watch;

pub use backend::{AuthBackend, AuthUser, HttpAuthBackend, SignIn};
pub use guard::{GuardOutcome, Redirect, RedirectReason, SessionGuard};
pub use state::SessionState;
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use watch::{SessionStatus, SessionWatch};

use std::time::Duration;
use thiserror::Error;

/// Maximum session age, independent of token expiry.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(3 * 60 * 60);

/// Period of the background re-check while the admin area is open.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub const AUTH_TOKEN_KEY: &str = "authToken";
pub const LAST_LOGIN_KEY: &str = "lastLoginTime";
pub const LOGIN_PATH: &str = "/admin/login";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("auth backend request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("auth backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid auth backend url: {0}")]
    Url(#[from] url::ParseError),
    #[error("session storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session storage is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("session storage lock poisoned")]
    Poisoned,
}
