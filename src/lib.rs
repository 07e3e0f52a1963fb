//! # Taraftar (supporters association portal backend)
//!
//! `taraftar` carries the server-side pieces of the association portal that are
//! more than static content:
//!
//! ## Form relay
//!
//! The public membership application and contact forms `POST` to
//! `/send-membership-form` and `/send-contact-form`. Every accepted submission is
//! first written to `form-data/<kind>-<epoch-ms>.json` and then mailed to the
//! declared recipient through the configured SMTP account. The JSON file is the
//! source of truth when delivery fails; nothing retries automatically.
//!
//! ## Mail transport
//!
//! A single SMTP account read from `EMAIL_*` variables. The connection is verified
//! before every send. A secondary account can be configured and is only used when
//! the failover policy is switched on.
//!
//! ## Session guard
//!
//! The admin area keeps an opaque bearer token and a last-login timestamp in
//! local storage. Before any admin view the guard rejects sessions older than
//! three hours, then asks the hosted auth backend whether the token is still
//! valid. Any failure is treated as logged out.

use std::time::{SystemTime, UNIX_EPOCH};

pub mod api;
pub mod cli;
pub mod mail;
pub mod relay;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Milliseconds since the Unix epoch, the unit used for file names and session timestamps.
#[must_use]
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
        })
}
