use crate::mail::{
    config::{
        DEFAULT_FALLBACK_HOST, DEFAULT_FALLBACK_SECURE, DEFAULT_FROM_ADDRESS, DEFAULT_FROM_NAME,
        DEFAULT_HOST, DEFAULT_SECURE, DEFAULT_USER,
    },
    FailoverPolicy, MailConfig, TransportStrategy,
};
use anyhow::{anyhow, Result};
use clap::{builder::BoolishValueParser, Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_EMAIL_HOST: &str = "email-host";
pub const ARG_EMAIL_PORT: &str = "email-port";
pub const ARG_EMAIL_SECURE: &str = "email-secure";
pub const ARG_EMAIL_USER: &str = "email-user";
pub const ARG_EMAIL_PASSWORD: &str = "email-password";
pub const ARG_EMAIL_FROM_NAME: &str = "email-from-name";
pub const ARG_EMAIL_FROM_ADDRESS: &str = "email-from-address";
pub const ARG_EMAIL_FALLBACK_HOST: &str = "email-fallback-host";
pub const ARG_EMAIL_FALLBACK_PORT: &str = "email-fallback-port";
pub const ARG_EMAIL_FALLBACK_SECURE: &str = "email-fallback-secure";
pub const ARG_EMAIL_FALLBACK_USER: &str = "email-fallback-user";
pub const ARG_EMAIL_FALLBACK_PASSWORD: &str = "email-fallback-password";
pub const ARG_EMAIL_FAILOVER: &str = "email-failover";

#[derive(Debug, Clone)]
pub struct Options {
    pub transport: TransportStrategy,
}

impl Options {
    /// Parse the SMTP account arguments.
    ///
    /// The secondary account exists only when `--email-fallback-user` is set.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is missing or the failover
    /// policy needs a secondary account that is not configured.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let read = |id: &str| -> Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .ok_or_else(|| anyhow!("missing required argument: --{id}"))
        };
        let read_port = |id: &str| -> Result<u16> {
            matches
                .get_one::<u16>(id)
                .copied()
                .ok_or_else(|| anyhow!("missing required argument: --{id}"))
        };
        let read_flag =
            |id: &str, default: bool| matches.get_one::<bool>(id).copied().unwrap_or(default);
        let read_secret = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .map(SecretString::from)
                .unwrap_or_default()
        };

        let from_name = read(ARG_EMAIL_FROM_NAME)?;
        let from_address = read(ARG_EMAIL_FROM_ADDRESS)?;

        let primary = MailConfig {
            host: read(ARG_EMAIL_HOST)?,
            port: read_port(ARG_EMAIL_PORT)?,
            secure: read_flag(ARG_EMAIL_SECURE, DEFAULT_SECURE),
            user: read(ARG_EMAIL_USER)?,
            password: read_secret(ARG_EMAIL_PASSWORD),
            from_name: from_name.clone(),
            from_address: from_address.clone(),
        };

        let policy = matches
            .get_one::<FailoverPolicy>(ARG_EMAIL_FAILOVER)
            .copied()
            .unwrap_or_default();

        let mut transport = TransportStrategy::new(primary).with_policy(policy);

        if let Some(user) = matches
            .get_one::<String>(ARG_EMAIL_FALLBACK_USER)
            .filter(|user| !user.trim().is_empty())
        {
            transport = transport.with_secondary(MailConfig {
                host: read(ARG_EMAIL_FALLBACK_HOST)?,
                port: read_port(ARG_EMAIL_FALLBACK_PORT)?,
                secure: read_flag(ARG_EMAIL_FALLBACK_SECURE, DEFAULT_FALLBACK_SECURE),
                user: user.clone(),
                password: read_secret(ARG_EMAIL_FALLBACK_PASSWORD),
                from_name,
                from_address,
            });
        }

        if policy == FailoverPolicy::FailoverOnError && transport.secondary.is_none() {
            return Err(anyhow!(
                "--{ARG_EMAIL_FAILOVER} {policy} requires --{ARG_EMAIL_FALLBACK_USER}"
            ));
        }

        Ok(Self { transport })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_primary_args(command);
    with_fallback_args(command)
}

fn with_primary_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_EMAIL_HOST)
                .long(ARG_EMAIL_HOST)
                .help("SMTP server host")
                .env("EMAIL_HOST")
                .default_value(DEFAULT_HOST),
        )
        .arg(
            Arg::new(ARG_EMAIL_PORT)
                .long(ARG_EMAIL_PORT)
                .help("SMTP server port")
                .env("EMAIL_PORT")
                .default_value("465")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_EMAIL_SECURE)
                .long(ARG_EMAIL_SECURE)
                .help("Use implicit TLS; false means STARTTLS when offered")
                .env("EMAIL_SECURE")
                .default_value("true")
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new(ARG_EMAIL_USER)
                .long(ARG_EMAIL_USER)
                .help("SMTP user name")
                .env("EMAIL_USER")
                .default_value(DEFAULT_USER),
        )
        .arg(
            Arg::new(ARG_EMAIL_PASSWORD)
                .long(ARG_EMAIL_PASSWORD)
                .help("SMTP password")
                .env("EMAIL_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_EMAIL_FROM_NAME)
                .long(ARG_EMAIL_FROM_NAME)
                .help("Display name of the sender")
                .env("EMAIL_FROM_NAME")
                .default_value(DEFAULT_FROM_NAME),
        )
        .arg(
            Arg::new(ARG_EMAIL_FROM_ADDRESS)
                .long(ARG_EMAIL_FROM_ADDRESS)
                .help("Sender address")
                .env("EMAIL_FROM_ADDRESS")
                .default_value(DEFAULT_FROM_ADDRESS),
        )
}

fn with_fallback_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_EMAIL_FALLBACK_HOST)
                .long(ARG_EMAIL_FALLBACK_HOST)
                .help("Secondary SMTP server host")
                .env("EMAIL_FALLBACK_HOST")
                .default_value(DEFAULT_FALLBACK_HOST),
        )
        .arg(
            Arg::new(ARG_EMAIL_FALLBACK_PORT)
                .long(ARG_EMAIL_FALLBACK_PORT)
                .help("Secondary SMTP server port")
                .env("EMAIL_FALLBACK_PORT")
                .default_value("465")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_EMAIL_FALLBACK_SECURE)
                .long(ARG_EMAIL_FALLBACK_SECURE)
                .help("Use implicit TLS for the secondary account")
                .env("EMAIL_FALLBACK_SECURE")
                .default_value("true")
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new(ARG_EMAIL_FALLBACK_USER)
                .long(ARG_EMAIL_FALLBACK_USER)
                .help("Secondary SMTP user name; enables the secondary account")
                .env("EMAIL_FALLBACK_USER"),
        )
        .arg(
            Arg::new(ARG_EMAIL_FALLBACK_PASSWORD)
                .long(ARG_EMAIL_FALLBACK_PASSWORD)
                .help("Secondary SMTP password")
                .env("EMAIL_FALLBACK_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_EMAIL_FAILOVER)
                .long(ARG_EMAIL_FAILOVER)
                .help("Failover policy: none, failover-on-error")
                .env("EMAIL_FAILOVER")
                .default_value(FailoverPolicy::None.as_str())
                .value_parser(|value: &str| value.parse::<FailoverPolicy>()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::config::{DEFAULT_FALLBACK_PORT, DEFAULT_PORT};
    use secrecy::ExposeSecret;

    const EMAIL_VARS: [&str; 13] = [
        "EMAIL_HOST",
        "EMAIL_PORT",
        "EMAIL_SECURE",
        "EMAIL_USER",
        "EMAIL_PASSWORD",
        "EMAIL_FROM_NAME",
        "EMAIL_FROM_ADDRESS",
        "EMAIL_FALLBACK_HOST",
        "EMAIL_FALLBACK_PORT",
        "EMAIL_FALLBACK_SECURE",
        "EMAIL_FALLBACK_USER",
        "EMAIL_FALLBACK_PASSWORD",
        "EMAIL_FAILOVER",
    ];

    /// Every mail variable, unset unless overridden.
    fn vars(overrides: &[(&'static str, &'static str)]) -> Vec<(&'static str, Option<&'static str>)> {
        EMAIL_VARS
            .iter()
            .map(|var| {
                let value = overrides
                    .iter()
                    .find(|(key, _)| key == var)
                    .map(|(_, value)| *value);
                (*var, value)
            })
            .collect()
    }

    fn parse(args: &[&str]) -> Result<Options> {
        let matches = with_args(Command::new("serve")).try_get_matches_from(args)?;
        Options::parse(&matches)
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars(vars(&[]), || {
            let options = parse(&["serve"]);
            assert!(options.is_ok());
            if let Ok(options) = options {
                let primary = &options.transport.primary;
                assert_eq!(primary.host, DEFAULT_HOST);
                assert_eq!(primary.port, DEFAULT_PORT);
                assert_eq!(primary.secure, DEFAULT_SECURE);
                assert_eq!(primary.user, DEFAULT_USER);
                assert_eq!(primary.password.expose_secret(), "");
                assert_eq!(primary.from_name, DEFAULT_FROM_NAME);
                assert_eq!(primary.from_address, DEFAULT_FROM_ADDRESS);
                assert!(options.transport.secondary.is_none());
                assert_eq!(options.transport.policy, FailoverPolicy::None);
                assert!(options.transport.failover().is_none());
            }
        });
    }

    #[test]
    fn test_env() {
        let env = vars(&[
            ("EMAIL_HOST", "smtp.taraftar.org.tr"),
            ("EMAIL_PORT", "587"),
            ("EMAIL_SECURE", "false"),
            ("EMAIL_USER", "form@taraftar.org.tr"),
            ("EMAIL_PASSWORD", "gizli"),
        ]);
        temp_env::with_vars(env, || {
            let options = parse(&["serve"]);
            assert!(options.is_ok());
            if let Ok(options) = options {
                let primary = &options.transport.primary;
                assert_eq!(primary.host, "smtp.taraftar.org.tr");
                assert_eq!(primary.port, 587);
                assert!(!primary.secure);
                assert_eq!(primary.user, "form@taraftar.org.tr");
                assert_eq!(primary.password.expose_secret(), "gizli");
            }
        });
    }

    #[test]
    fn test_fallback_account() {
        let env = vars(&[
            ("EMAIL_FALLBACK_USER", "taraftar@gmail.com"),
            ("EMAIL_FALLBACK_PASSWORD", "uygulama-sifresi"),
            ("EMAIL_FAILOVER", "failover-on-error"),
        ]);
        temp_env::with_vars(env, || {
            let options = parse(&["serve"]);
            assert!(options.is_ok());
            if let Ok(options) = options {
                let secondary = options.transport.failover();
                assert!(secondary.is_some());
                if let Some(secondary) = secondary {
                    assert_eq!(secondary.host, DEFAULT_FALLBACK_HOST);
                    assert_eq!(secondary.port, DEFAULT_FALLBACK_PORT);
                    assert_eq!(secondary.user, "taraftar@gmail.com");
                    assert_eq!(secondary.from_address, DEFAULT_FROM_ADDRESS);
                }
            }
        });
    }

    #[test]
    fn test_fallback_configured_but_disabled() {
        let env = vars(&[("EMAIL_FALLBACK_USER", "taraftar@gmail.com")]);
        temp_env::with_vars(env, || {
            let options = parse(&["serve"]);
            assert!(options.is_ok());
            if let Ok(options) = options {
                assert!(options.transport.secondary.is_some());
                assert!(options.transport.failover().is_none());
            }
        });
    }

    #[test]
    fn test_failover_requires_secondary() {
        temp_env::with_vars(vars(&[]), || {
            let options = parse(&["serve", "--email-failover", "failover-on-error"]);
            assert!(options.is_err());
        });
    }

    #[test]
    fn test_invalid_failover_policy() {
        temp_env::with_vars(vars(&[]), || {
            let result = with_args(Command::new("serve")).try_get_matches_from([
                "serve",
                "--email-failover",
                "round-robin",
            ]);
            assert_eq!(
                result.map_err(|e| e.kind()).err(),
                Some(clap::error::ErrorKind::ValueValidation)
            );
        });
    }
}
