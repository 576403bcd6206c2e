use clap::{Args, Subcommand};
use eveboard_core::ids::{GroupId, TypeId};

use crate::cli::common::{StorageArgs, print_json};

#[derive(Debug, Args)]
pub(crate) struct SdeCommand {
    #[command(flatten)]
    storage: StorageArgs,

    #[command(subcommand)]
    subcmd: SdeSubcommand,
}

#[derive(Debug, Subcommand)]
enum SdeSubcommand {
    /// Print one item type.
    Type { type_id: i32 },

    /// Print one item group.
    Group { group_id: i32 },
}

impl SdeCommand {
    pub(crate) async fn run(&self) -> anyhow::Result<()> {
        let index = self.storage.require_sde().await?;
        match self.subcmd {
            SdeSubcommand::Type { type_id } => print_json(index.lookup(TypeId(type_id))?),
            SdeSubcommand::Group { group_id } => print_json(index.lookup_group(GroupId(group_id))?),
        }
    }
}
