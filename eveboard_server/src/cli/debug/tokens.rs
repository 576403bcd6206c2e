use clap::{Args, Subcommand};
use eveboard_core::ids::CharacterId;
use eveboard_esi::{TokenManager, TokenStore};

use crate::cli::common::{StorageArgs, build_esi_client, load_esi_config, print_token_summary};

#[derive(Debug, Args)]
pub(crate) struct TokensCommand {
    #[command(flatten)]
    storage: StorageArgs,

    #[command(subcommand)]
    subcmd: TokensSubcommand,
}

#[derive(Debug, Subcommand)]
enum TokensSubcommand {
    /// List every stored token.
    List,

    /// Show stored token metadata.
    Show(CharacterArg),

    /// Rotate the token through the SSO refresh grant.
    Refresh(CharacterArg),

    /// Delete the stored token.
    Remove(CharacterArg),
}

#[derive(Debug, Args)]
struct CharacterArg {
    #[arg(long, env = "EVE_CHARACTER_ID")]
    character_id: u64,
}

impl TokensCommand {
    pub(crate) async fn run(&self) -> anyhow::Result<()> {
        let database = self.storage.open_database().await?;
        let store = database.token_store(self.storage.token_cipher()?);

        match &self.subcmd {
            TokensSubcommand::List => {
                let tokens = store.list_tokens().await?;
                if tokens.is_empty() {
                    println!("No tokens stored.");
                }
                for token in tokens {
                    println!(
                        "{}\t{}\texpires {}",
                        token.character_id,
                        token.character_name.as_deref().unwrap_or("<unknown>"),
                        token.access_expires_at
                    );
                }
            }
            TokensSubcommand::Show(arg) => {
                let character_id = CharacterId(arg.character_id);
                match store.load_token(character_id).await? {
                    Some(token) => print_token_summary(&token.summary()),
                    None => println!("No token stored for character {character_id}."),
                }
            }
            TokensSubcommand::Refresh(arg) => {
                let config = load_esi_config()?;
                let client = build_esi_client(&config)?;
                let manager = TokenManager::new(client, store, config.scopes.clone());
                let token = manager.refresh(CharacterId(arg.character_id)).await?;
                println!("Refreshed token for character {}.", token.character_id);
                print_token_summary(&token.summary());
            }
            TokensSubcommand::Remove(arg) => {
                let character_id = CharacterId(arg.character_id);
                if store.delete_token(character_id).await? {
                    println!("Removed stored token for character {character_id}.");
                } else {
                    println!("No token stored for character {character_id}.");
                }
            }
        }

        Ok(())
    }
}
