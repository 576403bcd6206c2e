mod service;
mod types;

pub use service::{Clock, SystemClock, TokenManager};
pub use types::{AccessToken, CharacterToken, LoginRequest, TokenSummary, TokenVerification};
