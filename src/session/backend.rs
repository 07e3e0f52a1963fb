use super::SessionError;
use crate::APP_USER_AGENT;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use tracing::{debug, instrument};
use url::Url;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A successful password sign-in.
#[derive(Clone)]
pub struct SignIn {
    pub access_token: SecretString,
    pub user: AuthUser,
}

impl fmt::Debug for SignIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignIn")
            .field("access_token", &"***")
            .field("user", &self.user)
            .finish()
    }
}

/// The hosted auth backend, as far as the admin session is concerned.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// # Errors
    /// Returns an error if the credentials are rejected or the call fails.
    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<SignIn, SessionError>;

    /// Resolve the user behind a token. `Ok(None)` means the token was rejected.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be reached or answers unexpectedly.
    async fn get_user(&self, token: &SecretString) -> Result<Option<AuthUser>, SessionError>;

    /// # Errors
    /// Returns an error if the backend cannot be reached or refuses the sign-out.
    async fn sign_out(&self, token: &SecretString) -> Result<(), SessionError>;
}

/// REST client for the backend's auth API (`/auth/v1/...`).
#[derive(Clone)]
pub struct HttpAuthBackend {
    base_url: Url,
    anon_key: SecretString,
    client: Client,
}

impl HttpAuthBackend {
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, anon_key: SecretString) -> Result<Self, SessionError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder().user_agent(APP_USER_AGENT).build()?;

        Ok(Self {
            base_url,
            anon_key,
            client,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, SessionError> {
        Ok(self.base_url.join(path)?)
    }
}

impl fmt::Debug for HttpAuthBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpAuthBackend")
            .field("base_url", &self.base_url.as_str())
            .field("anon_key", &"***")
            .finish()
    }
}

async fn status_error(response: Response) -> SessionError {
    let status = response.status().as_u16();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    let message = ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| body[*key].as_str())
        .unwrap_or("")
        .to_string();

    SessionError::Status { status, message }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<SignIn, SessionError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .client
            .post(url)
            .header("apikey", self.anon_key.expose_secret())
            .json(&json!({
                "email": email,
                "password": password.expose_secret(),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let token: TokenResponse = response.json().await?;

        debug!(user_id = %token.user.id, "signed in");

        Ok(SignIn {
            access_token: SecretString::from(token.access_token),
            user: token.user,
        })
    }

    #[instrument(skip(self, token))]
    async fn get_user(&self, token: &SecretString) -> Result<Option<AuthUser>, SessionError> {
        let response = self
            .client
            .get(self.endpoint("auth/v1/user")?)
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(token.expose_secret())
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(Some(response.json().await?)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("token rejected by auth backend");
                Ok(None)
            }
            _ => Err(status_error(response).await),
        }
    }

    #[instrument(skip(self, token))]
    async fn sign_out(&self, token: &SecretString) -> Result<(), SessionError> {
        let response = self
            .client
            .post(self.endpoint("auth/v1/logout")?)
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(token.expose_secret())
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(response).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(url: &str) -> Result<HttpAuthBackend, SessionError> {
        HttpAuthBackend::new(url, SecretString::from("anon".to_string()))
    }

    #[test]
    fn test_endpoint_keeps_base_path() -> Result<(), SessionError> {
        let prefixed = backend("https://proje.example.co/prefix")?;
        assert_eq!(
            prefixed.endpoint("auth/v1/user")?.as_str(),
            "https://proje.example.co/prefix/auth/v1/user"
        );

        let bare = backend("https://proje.example.co")?;
        assert_eq!(
            bare.endpoint("auth/v1/logout")?.as_str(),
            "https://proje.example.co/auth/v1/logout"
        );
        Ok(())
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(backend("not a url"), Err(SessionError::Url(_))));
    }

    #[test]
    fn test_debug_redacts_key() -> Result<(), SessionError> {
        let client = backend("https://proje.example.co")?;
        let debug = format!("{client:?}");
        assert!(!debug.contains("anon\""));
        assert!(debug.contains("***"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_an_error() -> Result<(), SessionError> {
        // Port 9 (discard) on localhost is not expected to speak HTTP.
        let client = backend("http://127.0.0.1:9")?;
        let result = client
            .get_user(&SecretString::from("token".to_string()))
            .await;
        assert!(result.is_err());
        Ok(())
    }
}
