use secrecy::SecretString;
use std::{fmt, str::FromStr};

pub const DEFAULT_HOST: &str = "mail.taraftar.org.tr";
pub const DEFAULT_PORT: u16 = 465;
pub const DEFAULT_SECURE: bool = true;
pub const DEFAULT_USER: &str = "bilgi@taraftar.org.tr";
pub const DEFAULT_FROM_NAME: &str = "Taraftar Derneği";
pub const DEFAULT_FROM_ADDRESS: &str = "bilgi@taraftar.org.tr";

pub const DEFAULT_FALLBACK_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_FALLBACK_PORT: u16 = 465;
pub const DEFAULT_FALLBACK_SECURE: bool = true;

/// One SMTP account.
#[derive(Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS on connect; otherwise STARTTLS when the server offers it.
    pub secure: bool,
    pub user: String,
    pub password: SecretString,
    pub from_name: String,
    pub from_address: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            secure: DEFAULT_SECURE,
            user: DEFAULT_USER.to_string(),
            password: SecretString::from(String::new()),
            from_name: DEFAULT_FROM_NAME.to_string(),
            from_address: DEFAULT_FROM_ADDRESS.to_string(),
        }
    }
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("user", &self.user)
            .field("password", &"***")
            .field("from_name", &self.from_name)
            .field("from_address", &self.from_address)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailoverPolicy {
    /// Only the primary account is used.
    #[default]
    None,
    /// A primary verify/send error triggers one attempt on the secondary.
    FailoverOnError,
}

impl FailoverPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::FailoverOnError => "failover-on-error",
        }
    }
}

impl FromStr for FailoverPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "failover-on-error" => Ok(Self::FailoverOnError),
            other => Err(format!(
                "invalid failover policy '{other}', expected 'none' or 'failover-on-error'"
            )),
        }
    }
}

impl fmt::Display for FailoverPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default)]
pub struct TransportStrategy {
    pub primary: MailConfig,
    pub secondary: Option<MailConfig>,
    pub policy: FailoverPolicy,
}

impl TransportStrategy {
    #[must_use]
    pub fn new(primary: MailConfig) -> Self {
        Self {
            primary,
            secondary: None,
            policy: FailoverPolicy::None,
        }
    }

    #[must_use]
    pub fn with_secondary(mut self, secondary: MailConfig) -> Self {
        self.secondary = Some(secondary);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: FailoverPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The account to try after the primary failed, if the policy allows it.
    #[must_use]
    pub fn failover(&self) -> Option<&MailConfig> {
        match self.policy {
            FailoverPolicy::None => None,
            FailoverPolicy::FailoverOnError => self.secondary.as_ref(),
        }
    }
}
