use crate::config::{Config, OAuthCredentials};
use crate::error::Error;
use log::info;
use reqwest::Client;
use serde::Deserialize;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync + 'static {
    /// Exchanges a refresh token for a short-lived access token.
    /// # Arguments
    /// * `credentials` - The Login-with-Amazon client id, secret and refresh token.
    /// # Returns
    /// A Result containing either the bearer access token or an Error.
    async fn refresh_access_token(&self, credentials: &OAuthCredentials) -> Result<String, Error>;
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
}

#[derive(Clone)]
pub struct TokenClient {
    client: Client,
    auth_url: String,
}

impl TokenClient {
    pub fn new(config: &Config) -> Self {
        TokenClient {
            client: Client::new(),
            auth_url: config.auth_url.to_string(),
        }
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, Error> {
        let resp = self
            .client
            .post(&self.auth_url)
            .form(form)
            .send()
            .await?
            .error_for_status()?;

        Ok(resp.json::<TokenResponse>().await?)
    }

    /// One-time exchange of an authorization code for a refresh token.
    ///
    /// The code is obtained by visiting the Login-with-Amazon consent page and is only
    /// valid for a few minutes.
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        redirect_uri: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<String, Error> {
        let token = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .await?;

        token.refresh_token.ok_or_else(|| Error::Credentials {
            message: "token endpoint returned no refresh token".to_string(),
        })
    }
}

#[async_trait::async_trait]
impl TokenProvider for TokenClient {
    async fn refresh_access_token(&self, credentials: &OAuthCredentials) -> Result<String, Error> {
        let token = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", credentials.refresh_token.as_str()),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
            ])
            .await?;

        info!("obtained access token for client {}", credentials.client_id);
        Ok(token.access_token)
    }
}
