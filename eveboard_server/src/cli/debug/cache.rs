use clap::{Args, ValueEnum};
use eveboard_core::ids::CharacterId;
use eveboard_store::Page;

use crate::cli::common::{StorageArgs, print_json};

#[derive(Debug, Args)]
pub(crate) struct CacheCommand {
    #[command(flatten)]
    storage: StorageArgs,

    #[arg(long, env = "EVE_CHARACTER_ID")]
    character_id: u64,

    #[arg(long, value_enum)]
    resource: Option<CacheResource>,

    #[arg(long, default_value_t = 20)]
    limit: u32,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CacheResource {
    Assets,
    IndustryJobs,
}

impl CacheCommand {
    pub(crate) async fn run(&self) -> anyhow::Result<()> {
        let cache = self.storage.open_database().await?.resource_cache();
        let character_id = CharacterId(self.character_id);
        let page = Page::new(self.limit, 0);

        match self.resource {
            None => {
                let summaries = cache.summaries(character_id).await?;
                if summaries.is_empty() {
                    println!("Nothing synced yet for character {character_id}.");
                }
                for summary in summaries {
                    println!(
                        "{}\t{} record(s)\tsynced at {}",
                        summary.resource_kind, summary.record_count, summary.synced_at
                    );
                }
            }
            Some(CacheResource::Assets) => match cache.read_assets(character_id, page).await? {
                Some(snapshot) => print_json(&snapshot.records)?,
                None => println!("Assets never synced for character {character_id}."),
            },
            Some(CacheResource::IndustryJobs) => {
                match cache.read_industry_jobs(character_id, page).await? {
                    Some(snapshot) => print_json(&snapshot.records)?,
                    None => println!("Industry jobs never synced for character {character_id}."),
                }
            }
        }

        Ok(())
    }
}
