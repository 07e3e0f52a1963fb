//! Map parsed command-line arguments to an [`Action`].

use crate::cli::{
    actions::{admin, server, Action},
    commands::{self, mail},
};
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some(("serve", sub_m)) => {
            let port = sub_m
                .get_one::<u16>(commands::ARG_PORT)
                .copied()
                .unwrap_or(8080);
            let form_data_dir = sub_m
                .get_one::<String>(commands::ARG_FORM_DATA_DIR)
                .map(PathBuf::from)
                .context("missing required argument: --form-data-dir")?;
            let mail_opts = mail::Options::parse(sub_m)?;

            Ok(Action::Server(server::Args {
                port,
                form_data_dir,
                transport: mail_opts.transport,
            }))
        }
        Some(("admin", sub_m)) => {
            let opts = commands::admin::Options::parse(sub_m)?;
            let command = commands::admin::AdminCommand::parse(sub_m)?;

            Ok(Action::Admin(admin::Args {
                backend_url: opts.backend_url,
                anon_key: opts.anon_key,
                session_file: opts.session_file,
                command,
            }))
        }
        _ => Err(anyhow!("missing subcommand")),
    }
}
