use crate::session::CHECK_INTERVAL;
use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};

pub const ARG_BACKEND_URL: &str = "backend-url";
pub const ARG_BACKEND_ANON_KEY: &str = "backend-anon-key";
pub const ARG_SESSION_FILE: &str = "session-file";
pub const ARG_EMAIL: &str = "email";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_INTERVAL: &str = "interval";

pub const DEFAULT_SESSION_FILE: &str = ".taraftar-session.json";

#[derive(Debug, Clone)]
pub struct Options {
    pub backend_url: String,
    pub anon_key: SecretString,
    pub session_file: PathBuf,
}

impl Options {
    /// Parse the auth backend and session storage arguments.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let read_required = |id: &str| -> Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("missing required argument: --{id}"))
        };

        Ok(Self {
            backend_url: read_required(ARG_BACKEND_URL)?,
            anon_key: SecretString::from(read_required(ARG_BACKEND_ANON_KEY)?),
            session_file: PathBuf::from(read_required(ARG_SESSION_FILE)?),
        })
    }
}

/// What the operator asked the session guard to do.
#[derive(Debug)]
pub enum AdminCommand {
    Login { email: String, password: SecretString },
    Check,
    Logout,
    Watch { interval: Duration },
}

impl AdminCommand {
    /// # Errors
    /// Returns an error if the subcommand or one of its arguments is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        match matches.subcommand() {
            Some(("login", sub_m)) => {
                let email = sub_m
                    .get_one::<String>(ARG_EMAIL)
                    .cloned()
                    .ok_or_else(|| anyhow!("missing required argument: --{ARG_EMAIL}"))?;
                let password = sub_m
                    .get_one::<String>(ARG_PASSWORD)
                    .cloned()
                    .map(SecretString::from)
                    .ok_or_else(|| anyhow!("missing required argument: --{ARG_PASSWORD}"))?;
                Ok(Self::Login { email, password })
            }
            Some(("check", _)) => Ok(Self::Check),
            Some(("logout", _)) => Ok(Self::Logout),
            Some(("watch", sub_m)) => {
                let seconds = sub_m
                    .get_one::<u64>(ARG_INTERVAL)
                    .copied()
                    .unwrap_or(CHECK_INTERVAL.as_secs());
                Ok(Self::Watch {
                    interval: Duration::from_secs(seconds),
                })
            }
            _ => Err(anyhow!("missing admin subcommand")),
        }
    }
}

#[must_use]
pub fn command() -> Command {
    Command::new("admin")
        .about("Manage the admin session kept in local storage")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new(ARG_BACKEND_URL)
                .long(ARG_BACKEND_URL)
                .help("Base URL of the hosted auth backend, example: https://<project>.supabase.co")
                .env("TARAFTAR_BACKEND_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_BACKEND_ANON_KEY)
                .long(ARG_BACKEND_ANON_KEY)
                .help("Public anon key sent as the apikey header")
                .env("TARAFTAR_BACKEND_ANON_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_FILE)
                .long(ARG_SESSION_FILE)
                .help("File that stores authToken and lastLoginTime")
                .env("TARAFTAR_SESSION_FILE")
                .default_value(DEFAULT_SESSION_FILE),
        )
        .subcommand(
            Command::new("login")
                .about("Sign in with email and password and store the session")
                .arg(
                    Arg::new(ARG_EMAIL)
                        .long(ARG_EMAIL)
                        .help("Admin email")
                        .env("TARAFTAR_ADMIN_EMAIL")
                        .required(true),
                )
                .arg(
                    Arg::new(ARG_PASSWORD)
                        .long(ARG_PASSWORD)
                        .help("Admin password")
                        .env("TARAFTAR_ADMIN_PASSWORD")
                        .hide_env_values(true)
                        .required(true),
                ),
        )
        .subcommand(Command::new("check").about("Run the session guard once"))
        .subcommand(Command::new("logout").about("Sign out and clear the stored session"))
        .subcommand(
            Command::new("watch")
                .about("Re-check the session periodically until it ends")
                .arg(
                    Arg::new(ARG_INTERVAL)
                        .long(ARG_INTERVAL)
                        .help("Seconds between checks")
                        .env("TARAFTAR_CHECK_INTERVAL")
                        .default_value("300")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                ),
        )
}
