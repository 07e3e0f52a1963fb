use super::{AuthUser, GuardOutcome, RedirectReason, SessionGuard};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// The first check has not finished yet.
    Pending,
    Authenticated(AuthUser),
    Unauthenticated(RedirectReason),
}

/// Periodic re-check of the admin session.
///
/// The first check runs immediately, then once per period. The task ends by
/// itself on the first redirect and is aborted by [`cancel`](Self::cancel) or
/// when the handle is dropped, so leaving the admin area never leaks a timer.
pub struct SessionWatch {
    handle: JoinHandle<()>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionWatch {
    #[must_use]
    pub fn spawn(guard: Arc<SessionGuard>, period: Duration) -> Self {
        let (tx, rx) = watch::channel(SessionStatus::Pending);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                match guard.check().await {
                    GuardOutcome::Authenticated(user) => {
                        debug!(user_id = %user.id, "session still valid");
                        tx.send_replace(SessionStatus::Authenticated(user));
                    }
                    GuardOutcome::Redirect(redirect) => {
                        info!(reason = %redirect.reason, to = redirect.to, "session ended");
                        tx.send_replace(SessionStatus::Unauthenticated(redirect.reason));
                        break;
                    }
                }
            }
        });

        Self { handle, status: rx }
    }

    /// Latest status plus change notifications.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait until the session becomes unauthenticated.
    pub async fn ended(&mut self) -> RedirectReason {
        loop {
            if let SessionStatus::Unauthenticated(reason) = &*self.status.borrow_and_update() {
                return *reason;
            }
            if self.status.changed().await.is_err() {
                // The task is gone without reporting; treat it as logged out.
                return RedirectReason::Invalid;
            }
        }
    }

    pub fn cancel(self) {
        self.handle.abort();
    }
}

impl Drop for SessionWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        epoch_millis,
        session::{
            guard::tests::FakeBackend, MemoryStorage, SessionStorage, AUTH_TOKEN_KEY,
            LAST_LOGIN_KEY,
        },
    };
    use std::sync::atomic::Ordering;
    use tokio::time::timeout;

    fn guard(backend: Arc<FakeBackend>, with_token: bool) -> Arc<SessionGuard> {
        let storage = Arc::new(MemoryStorage::new());
        if with_token {
            let _ = storage.set(AUTH_TOKEN_KEY, "stored-token");
            let _ = storage.set(LAST_LOGIN_KEY, &epoch_millis().to_string());
        }
        Arc::new(SessionGuard::new(storage, backend))
    }

    #[tokio::test]
    async fn test_watch_reports_then_ends() -> anyhow::Result<()> {
        let backend = Arc::new(FakeBackend::default());
        let mut watch = SessionWatch::spawn(guard(backend.clone(), true), Duration::from_millis(20));
        let mut status = watch.status();

        timeout(Duration::from_secs(5), status.wait_for(|s| *s != SessionStatus::Pending)).await??;
        assert_eq!(
            *status.borrow(),
            SessionStatus::Authenticated(FakeBackend::user())
        );

        backend.reject.store(true, Ordering::SeqCst);

        let reason = timeout(Duration::from_secs(5), watch.ended()).await?;
        assert_eq!(reason, RedirectReason::Invalid);

        timeout(Duration::from_secs(5), async {
            while !watch.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await?;
        assert!(backend.get_user_calls.load(Ordering::SeqCst) >= 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_watch_without_token_ends_immediately() -> anyhow::Result<()> {
        let backend = Arc::new(FakeBackend::default());
        let mut watch = SessionWatch::spawn(guard(backend.clone(), false), Duration::from_secs(300));

        let reason = timeout(Duration::from_secs(5), watch.ended()).await?;
        assert_eq!(reason, RedirectReason::NoToken);
        assert_eq!(backend.get_user_calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_stops_checks() -> anyhow::Result<()> {
        let backend = Arc::new(FakeBackend::default());
        let watch = SessionWatch::spawn(guard(backend.clone(), true), Duration::from_millis(10));
        let mut status = watch.status();

        timeout(Duration::from_secs(5), status.wait_for(|s| *s != SessionStatus::Pending)).await??;
        watch.cancel();

        // Give an aborted task a chance to run if it were still alive.
        tokio::time::sleep(Duration::from_millis(30)).await;
        let calls = backend.get_user_calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(backend.get_user_calls.load(Ordering::SeqCst), calls);
        Ok(())
    }
}
