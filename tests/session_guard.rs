//! Session guard over file-backed storage, the way the admin CLI runs it.

use anyhow::Result;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::{
    fs,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use taraftar::session::{
    AuthBackend, AuthUser, FileStorage, GuardOutcome, RedirectReason, SessionError, SessionGuard,
    SessionStatus, SessionStorage, SessionWatch, SignIn, AUTH_TOKEN_KEY, LAST_LOGIN_KEY,
    LOGIN_PATH,
};
use ulid::Ulid;

const NOW: u64 = 1_760_000_000_000;
const HOUR_MS: u64 = 60 * 60 * 1000;

/// Accepts exactly one live token; sign-out revokes it.
#[derive(Default)]
struct Backend {
    revoked: AtomicBool,
    sign_outs: AtomicUsize,
}

fn admin() -> AuthUser {
    AuthUser {
        id: "0b6c2e".to_string(),
        email: Some("yonetim@taraftar.org.tr".to_string()),
    }
}

#[async_trait]
impl AuthBackend for Backend {
    async fn sign_in(&self, _email: &str, password: &SecretString) -> Result<SignIn, SessionError> {
        if password.expose_secret() != "stadyum-1907" {
            return Err(SessionError::Status {
                status: 400,
                message: "Invalid login credentials".to_string(),
            });
        }
        self.revoked.store(false, Ordering::SeqCst);
        Ok(SignIn {
            access_token: SecretString::from("live-token".to_string()),
            user: admin(),
        })
    }

    async fn get_user(&self, token: &SecretString) -> Result<Option<AuthUser>, SessionError> {
        let live = token.expose_secret() == "live-token" && !self.revoked.load(Ordering::SeqCst);
        Ok(live.then(admin))
    }

    async fn sign_out(&self, _token: &SecretString) -> Result<(), SessionError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.revoked.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct Fixture {
    dir: PathBuf,
    storage: Arc<FileStorage>,
    backend: Arc<Backend>,
    guard: SessionGuard,
}

impl Fixture {
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("taraftar-guard-{}", Ulid::new()));
        let storage = Arc::new(FileStorage::new(dir.join("session.json")));
        let backend = Arc::new(Backend::default());
        let guard = SessionGuard::new(storage.clone(), backend.clone());
        Self {
            dir,
            storage,
            backend,
            guard,
        }
    }

    /// A second guard over the same file, as a fresh CLI invocation would see it.
    fn reopen(&self) -> SessionGuard {
        let storage = Arc::new(FileStorage::new(self.storage.path()));
        SessionGuard::new(storage, self.backend.clone())
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

#[tokio::test]
async fn test_login_check_logout() -> Result<()> {
    let fixture = Fixture::new();

    let user = fixture
        .guard
        .login_at(
            "yonetim@taraftar.org.tr",
            &SecretString::from("stadyum-1907".to_string()),
            NOW,
        )
        .await?;
    assert_eq!(user, admin());

    let outcome = fixture.reopen().check_at(NOW + HOUR_MS).await;
    assert_eq!(outcome, GuardOutcome::Authenticated(admin()));
    assert_eq!(
        fixture.storage.get(LAST_LOGIN_KEY)?,
        Some((NOW + HOUR_MS).to_string())
    );

    let redirect = fixture.reopen().logout().await;
    assert_eq!(redirect.to, LOGIN_PATH);
    assert_eq!(redirect.reason, RedirectReason::LoggedOut);
    assert_eq!(fixture.storage.get(AUTH_TOKEN_KEY)?, None);

    let outcome = fixture.guard.check_at(NOW + HOUR_MS).await;
    assert!(matches!(
        outcome,
        GuardOutcome::Redirect(redirect) if redirect.reason == RedirectReason::NoToken
    ));
    Ok(())
}

#[tokio::test]
async fn test_each_check_extends_the_window() -> Result<()> {
    let fixture = Fixture::new();
    fixture
        .guard
        .login_at(
            "yonetim@taraftar.org.tr",
            &SecretString::from("stadyum-1907".to_string()),
            NOW,
        )
        .await?;

    // Checks every two hours keep a session alive well past three hours.
    for step in 1..=4 {
        let outcome = fixture.guard.check_at(NOW + step * 2 * HOUR_MS).await;
        assert!(outcome.is_authenticated(), "check {step} failed");
    }
    Ok(())
}

#[tokio::test]
async fn test_stale_session_is_signed_out_remotely() -> Result<()> {
    let fixture = Fixture::new();
    fixture
        .guard
        .login_at(
            "yonetim@taraftar.org.tr",
            &SecretString::from("stadyum-1907".to_string()),
            NOW,
        )
        .await?;

    let outcome = fixture.guard.check_at(NOW + 3 * HOUR_MS + 1).await;

    assert!(matches!(
        outcome,
        GuardOutcome::Redirect(redirect) if redirect.reason == RedirectReason::Stale
    ));
    assert_eq!(fixture.backend.sign_outs.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.storage.get(AUTH_TOKEN_KEY)?, None);
    assert_eq!(fixture.storage.get(LAST_LOGIN_KEY)?, None);
    Ok(())
}

#[tokio::test]
async fn test_forged_token_is_rejected() -> Result<()> {
    let fixture = Fixture::new();
    fixture.storage.set(AUTH_TOKEN_KEY, "forged-token")?;
    fixture.storage.set(LAST_LOGIN_KEY, &NOW.to_string())?;

    let outcome = fixture.guard.check_at(NOW).await;

    assert!(matches!(
        outcome,
        GuardOutcome::Redirect(redirect) if redirect.reason == RedirectReason::Invalid
    ));
    assert_eq!(fixture.storage.get(AUTH_TOKEN_KEY)?, None);
    Ok(())
}

#[tokio::test]
async fn test_missing_timestamp_fails_closed() -> Result<()> {
    let fixture = Fixture::new();
    fixture.storage.set(AUTH_TOKEN_KEY, "live-token")?;

    let outcome = fixture.guard.check_at(NOW).await;

    assert!(!outcome.is_authenticated());
    assert_eq!(fixture.storage.get(AUTH_TOKEN_KEY)?, None);
    Ok(())
}

#[tokio::test]
async fn test_watch_ends_when_backend_revokes() -> Result<()> {
    let fixture = Fixture::new();
    fixture
        .guard
        .login(
            "yonetim@taraftar.org.tr",
            &SecretString::from("stadyum-1907".to_string()),
        )
        .await?;

    let mut watch = SessionWatch::spawn(Arc::new(fixture.reopen()), Duration::from_millis(20));
    let mut status = watch.status();

    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| matches!(s, SessionStatus::Authenticated(_))),
    )
    .await??;

    // Revoked elsewhere, e.g. from another device.
    fixture.backend.revoked.store(true, Ordering::SeqCst);

    let reason = tokio::time::timeout(Duration::from_secs(5), watch.ended()).await?;
    assert_eq!(reason, RedirectReason::Invalid);
    assert_eq!(fixture.storage.get(AUTH_TOKEN_KEY)?, None);
    Ok(())
}
