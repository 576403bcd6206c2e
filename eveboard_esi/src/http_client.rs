use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use eveboard_core::{
    ids::CharacterId,
    records::{AssetEntry, IndustryJobEntry},
    time::Timestamp,
};
use log::{debug, warn};
use reqwest::{Response, StatusCode, header};
use serde_json::Value;

use crate::{
    EsiError, EsiResult,
    api::{
        OAuthErrorBody, TokenResponse, Validated, VerifiedCharacter, VerifyResponse,
        validate_assets, validate_industry_jobs,
    },
    client::{EsiApiClient, SsoAuthClient, TokenGrant},
    config::EsiConfig,
    rate_limit::{EndpointFamily, EsiRateLimiter},
};

const PAGES_HEADER: &str = "x-pages";
const ERROR_LIMIT_RESET_HEADER: &str = "x-esi-error-limit-reset";
const MAX_PAGES: u32 = 100;

/// SSO and ESI client over HTTP. Every request, including each page of a
/// paginated fetch, takes a permit from its endpoint family first.
#[derive(Clone, Debug)]
pub struct HttpEsiClient {
    http: reqwest::Client,
    config: EsiConfig,
    limiter: Arc<EsiRateLimiter>,
}

impl HttpEsiClient {
    pub fn new(config: EsiConfig, limiter: Arc<EsiRateLimiter>) -> EsiResult<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()
            .map_err(EsiError::Http)?;
        Ok(Self {
            http,
            config,
            limiter,
        })
    }

    pub fn config(&self) -> &EsiConfig {
        &self.config
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> EsiResult<TokenGrant> {
        self.limiter.acquire(EndpointFamily::Sso).await;
        let requested_at = Timestamp::now();
        let response = self
            .http
            .post(self.config.token_url())
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header(header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;

        let response = check_token_status(response).await?;
        let payload: TokenResponse = response.json().await?;
        let refresh_token = payload
            .refresh_token
            .filter(|token| !token.is_empty())
            .ok_or(EsiError::MissingRefreshToken)?;
        let lifetime = Duration::from_secs(payload.expires_in.max(0).unsigned_abs());
        let access_expires_at = requested_at
            .checked_add(lifetime)
            .ok_or_else(|| EsiError::message("token expiry overflows"))?;

        Ok(TokenGrant {
            access_token: payload.access_token,
            access_expires_at,
            refresh_token,
        })
    }

    async fn get_paged(
        &self,
        family: EndpointFamily,
        path: &str,
        access_token: &str,
    ) -> EsiResult<Vec<Value>> {
        let url = self.config.esi_url(path);
        let mut rows = Vec::new();
        let mut page = 1u32;
        let mut total_pages = 1u32;

        while page <= total_pages {
            self.limiter.acquire(family).await;
            let page_param = page.to_string();
            let response = self
                .http
                .get(&url)
                .bearer_auth(access_token)
                .query(&[("datasource", "tranquility"), ("page", page_param.as_str())])
                .send()
                .await?;
            let response = check_esi_status(response).await?;

            if page == 1 {
                total_pages = checked_page_count(page_count(&response))?;
            }

            let body: Value = response.json().await?;
            match body {
                Value::Array(values) => rows.extend(values),
                other => {
                    return Err(EsiError::message(format!(
                        "expected array from {path}, got {}",
                        json_kind(&other)
                    )));
                }
            }
            page += 1;
        }

        debug!(
            "fetched {} raw rows from {path} across {total_pages} page(s)",
            rows.len()
        );
        Ok(rows)
    }
}

#[async_trait]
impl SsoAuthClient for HttpEsiClient {
    fn authorize_url(&self, state: &str) -> EsiResult<String> {
        self.config.authorize_url(state)
    }

    async fn exchange_code(&self, code: &str) -> EsiResult<TokenGrant> {
        self.token_request(&[("grant_type", "authorization_code"), ("code", code)])
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> EsiResult<TokenGrant> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn verify(&self, access_token: &str) -> EsiResult<VerifiedCharacter> {
        self.limiter.acquire(EndpointFamily::Sso).await;
        let response = self
            .http
            .get(self.config.verify_url())
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = check_sso_status(response).await?;
        let payload: VerifyResponse = response.json().await?;
        Ok(payload.into())
    }
}

#[async_trait]
impl EsiApiClient for HttpEsiClient {
    async fn fetch_assets(
        &self,
        character_id: CharacterId,
        access_token: &str,
    ) -> EsiResult<Vec<AssetEntry>> {
        let raw = self
            .get_paged(
                EndpointFamily::Assets,
                &format!("characters/{character_id}/assets/"),
                access_token,
            )
            .await?;
        Ok(report_dropped(character_id, "asset", validate_assets(raw)))
    }

    async fn fetch_industry_jobs(
        &self,
        character_id: CharacterId,
        access_token: &str,
    ) -> EsiResult<Vec<IndustryJobEntry>> {
        let raw = self
            .get_paged(
                EndpointFamily::IndustryJobs,
                &format!("characters/{character_id}/industry/jobs/"),
                access_token,
            )
            .await?;
        Ok(report_dropped(
            character_id,
            "industry job",
            validate_industry_jobs(raw),
        ))
    }
}

fn report_dropped<T>(character_id: CharacterId, what: &str, validated: Validated<T>) -> Vec<T> {
    if validated.dropped > 0 {
        warn!(
            "dropped {} malformed {what} row(s) for character {character_id}",
            validated.dropped
        );
    }
    validated.rows
}

async fn check_esi_status(response: Response) -> EsiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = retry_after_header(&response);
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, retry_after, body))
}

/// Verification failures mean the access token itself was refused.
async fn check_sso_status(response: Response) -> EsiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = retry_after_header(&response);
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, retry_after, body))
}

async fn check_token_status(response: Response) -> EsiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = retry_after_header(&response);
    let body = response.text().await.unwrap_or_default();
    Err(classify_token_status(status, retry_after, body))
}

/// Token endpoint failures. Only an OAuth error naming the grant or token
/// marks the refresh token dead; a refused client is a configuration problem
/// and must leave stored tokens alone.
pub(crate) fn classify_token_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: String,
) -> EsiError {
    let oauth = serde_json::from_str::<OAuthErrorBody>(&body).ok();
    match oauth {
        Some(oauth) if matches!(oauth.error.as_str(), "invalid_grant" | "invalid_token") => {
            EsiError::TokenInvalid {
                reason: oauth.error_description.unwrap_or(oauth.error),
            }
        }
        Some(oauth) if status.is_client_error() && !is_throttled(status) => {
            EsiError::SsoClientRejected {
                status: status.as_u16(),
                reason: oauth.error_description.unwrap_or(oauth.error),
            }
        }
        _ => match status.as_u16() {
            401 | 403 => EsiError::SsoClientRejected {
                status: status.as_u16(),
                reason: body,
            },
            _ => classify_status(status, retry_after, body),
        },
    }
}

fn is_throttled(status: StatusCode) -> bool {
    matches!(status.as_u16(), 420 | 429)
}

/// Maps a non-success status onto the retry taxonomy.
pub(crate) fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: String,
) -> EsiError {
    match status.as_u16() {
        420 | 429 => EsiError::RateLimited { retry_after },
        401 | 403 => EsiError::TokenInvalid {
            reason: format!("upstream returned {status}"),
        },
        500..=599 => EsiError::UpstreamUnavailable {
            reason: format!("upstream returned {status}"),
        },
        code => EsiError::UnexpectedStatus { status: code, body },
    }
}

fn retry_after_header(response: &Response) -> Option<Duration> {
    let headers = response.headers();
    headers
        .get(header::RETRY_AFTER)
        .or_else(|| headers.get(ERROR_LIMIT_RESET_HEADER))
        .and_then(|value| value.to_str().ok())
        .and_then(parse_retry_after)
}

pub(crate) fn parse_retry_after(raw: &str) -> Option<Duration> {
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn checked_page_count(pages: u32) -> EsiResult<u32> {
    if pages > MAX_PAGES {
        return Err(EsiError::TooManyPages {
            pages,
            max: MAX_PAGES,
        });
    }
    Ok(pages)
}

fn page_count(response: &Response) -> u32 {
    response
        .headers()
        .get(PAGES_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .filter(|pages| *pages > 0)
        .unwrap_or(1)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
