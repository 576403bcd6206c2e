use std::{fmt, time::Duration};

use eveboard_core::ids::CharacterId;
use thiserror::Error;

pub type EsiResult<T> = Result<T, EsiError>;

#[derive(Debug, Error)]
pub enum EsiError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("no token stored for character {0}")]
    TokenNotFound(CharacterId),
    #[error("token rejected: {reason}")]
    TokenInvalid { reason: String },
    #[error("upstream rate limited the request")]
    RateLimited { retry_after: Option<Duration> },
    #[error("upstream unavailable: {reason}")]
    UpstreamUnavailable { reason: String },
    #[error("upstream returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("sso rejected the client ({status}): {reason}")]
    SsoClientRejected { status: u16, reason: String },
    #[error("upstream reported {pages} pages, more than the limit of {max}")]
    TooManyPages { pages: u32, max: u32 },
    #[error("http request failed")]
    Http(#[source] reqwest::Error),
    #[error("upstream payload could not be decoded")]
    Decode(#[from] serde_json::Error),
    #[error("invalid url")]
    Url(#[from] url::ParseError),
    #[error("token store operation failed")]
    TokenStore(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("login state '{0}' is unknown or already used")]
    UnknownLoginState(String),
    #[error("upstream did not provide a refresh token")]
    MissingRefreshToken,
    #[error("missing required scopes: {missing:?}")]
    MissingRequiredScopes { missing: Vec<String> },
    #[error("{0}")]
    Message(String),
}

impl EsiError {
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }

    pub fn token_store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::TokenStore(Box::new(err))
    }

    /// Throttling and transient unavailability can be retried after a delay.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::UpstreamUnavailable { .. }
        )
    }

    pub fn is_token_invalid(&self) -> bool {
        matches!(self, Self::TokenInvalid { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    pub fn display_chain(&self) -> DisplayChainedError<'_> {
        DisplayChainedError { inner: self }
    }
}

impl From<reqwest::Error> for EsiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            Self::UpstreamUnavailable {
                reason: err.to_string(),
            }
        } else {
            Self::Http(err)
        }
    }
}

pub struct DisplayChainedError<'a> {
    inner: &'a (dyn std::error::Error + 'static),
}

impl fmt::Debug for DisplayChainedError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self.inner);

        while let Some(err) = current {
            if first {
                first = false;
            } else {
                write!(f, " -> ")?;
            }

            write!(f, "{err}")?;
            current = err.source();
        }

        Ok(())
    }
}

impl fmt::Display for DisplayChainedError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
