mod cache;
mod jobs;
mod sde;
mod tokens;

use clap::{Args, Subcommand};

use self::{cache::CacheCommand, jobs::JobsCommand, sde::SdeCommand, tokens::TokensCommand};

#[derive(Debug, Args)]
pub(crate) struct DebugCommand {
    #[command(subcommand)]
    subcmd: DebugSubcommand,
}

#[derive(Debug, Subcommand)]
enum DebugSubcommand {
    /// Inspect and manage stored character tokens.
    Tokens(TokensCommand),

    /// Look up static data export entries.
    Sde(SdeCommand),

    /// Inspect archived sync jobs.
    Jobs(JobsCommand),

    /// Inspect cached resource snapshots.
    Cache(CacheCommand),
}

impl DebugCommand {
    pub(crate) async fn run(&self) -> anyhow::Result<()> {
        match &self.subcmd {
            DebugSubcommand::Tokens(cmd) => cmd.run().await,
            DebugSubcommand::Sde(cmd) => cmd.run().await,
            DebugSubcommand::Jobs(cmd) => cmd.run().await,
            DebugSubcommand::Cache(cmd) => cmd.run().await,
        }
    }
}
