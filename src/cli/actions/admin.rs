use crate::{
    cli::commands::admin::AdminCommand,
    session::{
        FileStorage, GuardOutcome, HttpAuthBackend, SessionGuard, SessionStatus, SessionWatch,
    },
};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::signal;
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub backend_url: String,
    pub anon_key: SecretString,
    pub session_file: PathBuf,
    pub command: AdminCommand,
}

/// Execute an admin session command against the file-backed session.
/// # Errors
/// Returns an error if the backend is misconfigured, login fails, or the
/// session is not authenticated.
pub async fn execute(args: Args) -> Result<()> {
    let backend = HttpAuthBackend::new(&args.backend_url, args.anon_key)
        .context("invalid TARAFTAR_BACKEND_URL")?;
    let storage = FileStorage::new(&args.session_file);

    debug!(session_file = %storage.path().display(), "using session file");

    let guard = SessionGuard::new(Arc::new(storage), Arc::new(backend));

    match args.command {
        AdminCommand::Login { email, password } => {
            let user = guard
                .login(&email, &password)
                .await
                .context("login failed")?;
            println!("signed in as {}", user.email.as_deref().unwrap_or(&user.id));
            Ok(())
        }
        AdminCommand::Check => match guard.check().await {
            GuardOutcome::Authenticated(user) => {
                println!("authenticated: {}", user.email.as_deref().unwrap_or(&user.id));
                Ok(())
            }
            GuardOutcome::Redirect(redirect) => {
                println!("redirect to {}", redirect.to);
                Err(anyhow!("not authenticated: {}", redirect.reason))
            }
        },
        AdminCommand::Logout => {
            let redirect = guard.logout().await;
            println!("signed out, redirect to {}", redirect.to);
            Ok(())
        }
        AdminCommand::Watch { interval } => watch(Arc::new(guard), interval).await,
    }
}

async fn watch(guard: Arc<SessionGuard>, interval: Duration) -> Result<()> {
    let mut session = SessionWatch::spawn(guard, interval);
    let mut status = session.status();

    info!(interval_secs = interval.as_secs(), "watching admin session");

    let printer = async {
        while status.changed().await.is_ok() {
            if let SessionStatus::Authenticated(user) = &*status.borrow_and_update() {
                println!(
                    "session valid: {}",
                    user.email.as_deref().unwrap_or(&user.id)
                );
            }
        }
    };

    tokio::select! {
        biased;

        reason = session.ended() => {
            println!("session ended ({reason}), redirect to {}", crate::session::LOGIN_PATH);
            Err(anyhow!("not authenticated: {reason}"))
        }
        () = printer => Ok(()),
        result = signal::ctrl_c() => {
            result?;
            // Dropping the watch aborts the check task.
            info!("stopped watching");
            Ok(())
        }
    }
}
