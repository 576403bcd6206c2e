use std::time::Duration;

use url::Url;

use crate::{EsiError, EsiResult};

pub const DEFAULT_SSO_BASE_URL: &str = "https://login.eveonline.com";
pub const DEFAULT_ESI_BASE_URL: &str = "https://esi.evetech.net/latest";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EsiConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
    pub scopes: Vec<String>,
    pub user_agent: String,
    pub sso_base_url: String,
    pub esi_base_url: String,
    pub request_timeout: Duration,
}

impl EsiConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        callback_url: impl Into<String>,
        scopes: Vec<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            callback_url: callback_url.into(),
            scopes,
            user_agent: user_agent.into(),
            sso_base_url: DEFAULT_SSO_BASE_URL.to_owned(),
            esi_base_url: DEFAULT_ESI_BASE_URL.to_owned(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn validate(&self) -> EsiResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(EsiError::InvalidConfig("EVE_CLIENT_ID must be set"));
        }
        if self.client_secret.trim().is_empty() {
            return Err(EsiError::InvalidConfig("EVE_CLIENT_SECRET must be set"));
        }
        if self.callback_url.trim().is_empty() {
            return Err(EsiError::InvalidConfig("EVE_CALLBACK_URL must be set"));
        }
        if self.scopes.is_empty() {
            return Err(EsiError::InvalidConfig(
                "at least one ESI scope must be configured",
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(EsiError::InvalidConfig("user_agent must be set"));
        }
        if self.request_timeout.is_zero() {
            return Err(EsiError::InvalidConfig("request timeout must be non-zero"));
        }
        Url::parse(&self.callback_url)?;
        Url::parse(&self.sso_base_url)?;
        Url::parse(&self.esi_base_url)?;
        Ok(())
    }

    pub fn scopes_for_esi(&self) -> String {
        self.scopes.join(" ")
    }

    pub fn token_url(&self) -> String {
        format!("{}/v2/oauth/token", self.sso_base_url.trim_end_matches('/'))
    }

    pub fn verify_url(&self) -> String {
        format!("{}/oauth/verify", self.sso_base_url.trim_end_matches('/'))
    }

    pub fn authorize_url(&self, state: &str) -> EsiResult<String> {
        let base = format!("{}/v2/oauth/authorize", self.sso_base_url.trim_end_matches('/'));
        let mut url = Url::parse(&base)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.callback_url)
            .append_pair("client_id", &self.client_id)
            .append_pair("scope", &self.scopes_for_esi())
            .append_pair("state", state);
        Ok(url.into())
    }

    pub fn esi_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.esi_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
