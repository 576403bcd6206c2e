use std::{
    env, fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use clap::Args;
use eveboard_app::load_sde_index;
use eveboard_core::{sde::SdeIndex, time::Timestamp};
use eveboard_esi::{EsiConfig, EsiRateLimiter, HttpEsiClient, RateLimitConfig, TokenSummary};
use eveboard_store::{Database, TokenCipher};
use log::{info, warn};

const DEFAULT_CALLBACK_URL: &str = "http://localhost:8000/auth/callback";
const DEFAULT_SCOPES: &str =
    "publicData,esi-assets.read_assets.v1,esi-industry.read_character_jobs.v1";
const DEFAULT_USER_AGENT: &str = concat!("eveboard/", env!("CARGO_PKG_VERSION"));

/// Where local state lives: the SQLite file and the static data export.
#[derive(Debug, Args)]
pub(crate) struct StorageArgs {
    /// SQLite database path.
    #[arg(long, env = "EVEBOARD_DB", default_value = "eveboard.sqlite")]
    pub(crate) db: PathBuf,

    /// Directory holding `types.jsonl` and optionally `groups.jsonl`.
    #[arg(long, env = "EVEBOARD_SDE_DIR")]
    pub(crate) sde_dir: Option<PathBuf>,

    /// Base64 AES-256 key sealing stored tokens. Without it a key file next
    /// to the database is used, and created on first run.
    #[arg(long, env = "ESI_TOKEN_KEY", hide_env_values = true)]
    pub(crate) token_key: Option<String>,
}

impl StorageArgs {
    pub(crate) async fn open_database(&self) -> anyhow::Result<Database> {
        Database::connect(&self.db)
            .await
            .with_context(|| format!("failed to open database {}", self.db.display()))
    }

    pub(crate) fn token_cipher(&self) -> anyhow::Result<TokenCipher> {
        if let Some(encoded) = &self.token_key {
            return TokenCipher::from_base64(encoded).context("ESI_TOKEN_KEY is not a usable key");
        }
        let key_path = self.db.with_extension("key");
        let encoded = load_or_create_key(&key_path)?;
        TokenCipher::from_base64(&encoded)
            .with_context(|| format!("key file {} is not a usable key", key_path.display()))
    }

    pub(crate) async fn load_sde(&self) -> anyhow::Result<SdeIndex> {
        let Some(dir) = &self.sde_dir else {
            warn!("no SDE directory configured; type lookups will be empty");
            return Ok(SdeIndex::default());
        };

        load_sde_index(dir)
            .await
            .with_context(|| format!("failed to load SDE from {}", dir.display()))
    }

    pub(crate) async fn require_sde(&self) -> anyhow::Result<SdeIndex> {
        if self.sde_dir.is_none() {
            anyhow::bail!("SDE directory is required; provide --sde-dir or set EVEBOARD_SDE_DIR");
        }
        self.load_sde().await
    }
}

pub(crate) fn load_esi_config() -> anyhow::Result<EsiConfig> {
    let config = EsiConfig::new(
        required_env("EVE_CLIENT_ID")?,
        required_env("EVE_CLIENT_SECRET")?,
        env::var("EVE_CALLBACK_URL").unwrap_or_else(|_| DEFAULT_CALLBACK_URL.to_owned()),
        scopes_from_env(),
        env::var("EVEBOARD_USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_owned()),
    );
    config
        .validate()
        .map_err(|err| anyhow::anyhow!("invalid ESI configuration: {}", err.display_chain()))?;
    Ok(config)
}

pub(crate) fn build_esi_client(config: &EsiConfig) -> anyhow::Result<Arc<HttpEsiClient>> {
    let limiter = Arc::new(EsiRateLimiter::new(RateLimitConfig::default()));
    let client = HttpEsiClient::new(config.clone(), limiter).context("failed to create ESI client")?;
    Ok(Arc::new(client))
}

pub(crate) fn print_token_summary(token: &TokenSummary) {
    let now = Timestamp::now();
    let valid_for = token
        .access_expires_at
        .signed_duration_since(now)
        .num_seconds();

    println!("Character: {}", token.character_id);
    println!(
        "Name: {}",
        token.character_name.as_deref().unwrap_or("<unknown>")
    );
    println!("Scopes: {}", token.scopes.join(","));
    println!("Updated at: {}", token.updated_at);
    println!(
        "Access token valid until: {} ({})",
        token.access_expires_at,
        if valid_for >= 0 {
            format!("in {valid_for}s")
        } else {
            format!("expired {}s ago", -valid_for)
        }
    );
}

pub(crate) fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render json")?;
    println!("{rendered}");
    Ok(())
}

fn load_or_create_key(path: &Path) -> anyhow::Result<String> {
    match fs::read_to_string(path) {
        Ok(encoded) => return Ok(encoded.trim().to_owned()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read key file {}", path.display()));
        }
    }

    let encoded = TokenCipher::generate_key();
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("failed to create key file {}", path.display()))?;
    writeln!(file, "{encoded}")
        .with_context(|| format!("failed to write key file {}", path.display()))?;
    info!("generated token encryption key at {}", path.display());
    Ok(encoded)
}

fn required_env(name: &str) -> anyhow::Result<String> {
    env::var(name).map_err(|_| anyhow::anyhow!("missing required env var `{name}`"))
}

fn scopes_from_env() -> Vec<String> {
    let raw = env::var("EVE_SCOPES").unwrap_or_else(|_| DEFAULT_SCOPES.to_owned());
    parse_scopes(&raw)
}

fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|scope| !scope.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{load_or_create_key, parse_scopes};
    use eveboard_store::TokenCipher;

    #[test]
    fn key_file_is_created_once_and_reused() {
        let temp_dir = tempfile::tempdir().expect("tempdir");
        let path = temp_dir.path().join("eveboard.key");

        let created = load_or_create_key(&path).expect("create key");
        let reloaded = load_or_create_key(&path).expect("reload key");

        assert_eq!(created, reloaded);
        assert!(TokenCipher::from_base64(&reloaded).is_ok());
    }

    #[test]
    fn scopes_are_trimmed_and_blank_entries_dropped() {
        assert_eq!(
            parse_scopes(" publicData, ,esi-assets.read_assets.v1 ,"),
            vec!["publicData", "esi-assets.read_assets.v1"]
        );
    }
}
