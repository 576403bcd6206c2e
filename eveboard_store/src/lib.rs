mod cache;
mod crypto;
mod db;
mod error;
mod history;
mod tokens;

pub use cache::{Page, ResourceCache};
pub use crypto::TokenCipher;
pub use db::Database;
pub use error::StoreError;
pub use history::SyncJobHistory;
pub use tokens::SqliteTokenStore;
