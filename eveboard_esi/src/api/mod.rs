mod types;

pub(crate) use types::{OAuthErrorBody, TokenResponse, VerifyResponse};
pub use types::{Validated, VerifiedCharacter, validate_assets, validate_industry_jobs};
