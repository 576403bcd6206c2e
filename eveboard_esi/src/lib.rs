pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod http_client;
pub mod rate_limit;
pub mod token_store;

pub use api::{Validated, VerifiedCharacter};
pub use auth::{
    AccessToken, CharacterToken, Clock, LoginRequest, SystemClock, TokenManager, TokenSummary,
    TokenVerification,
};
pub use client::{EsiApiClient, SsoAuthClient, TokenGrant};
pub use config::EsiConfig;
pub use errors::{EsiError, EsiResult};
pub use http_client::HttpEsiClient;
pub use rate_limit::{EndpointFamily, EsiRateLimiter, FamilyQuota, RateLimitConfig};
pub use token_store::{MemoryTokenStore, TokenStore};
