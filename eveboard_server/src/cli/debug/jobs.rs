use anyhow::Context;
use clap::{Args, Subcommand};
use eveboard_core::ids::SyncJobId;

use crate::cli::common::{StorageArgs, print_json};

#[derive(Debug, Args)]
pub(crate) struct JobsCommand {
    #[command(flatten)]
    storage: StorageArgs,

    #[command(subcommand)]
    subcmd: JobsSubcommand,
}

#[derive(Debug, Subcommand)]
enum JobsSubcommand {
    /// Show one archived job.
    Show { job_id: String },

    /// List the most recently finished jobs.
    Recent {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

impl JobsCommand {
    pub(crate) async fn run(&self) -> anyhow::Result<()> {
        let history = self.storage.open_database().await?.job_history();

        match &self.subcmd {
            JobsSubcommand::Show { job_id } => {
                let parsed: SyncJobId = job_id
                    .parse()
                    .with_context(|| format!("'{job_id}' is not a sync job id"))?;
                match history.load(parsed).await? {
                    Some(job) => print_json(&job)?,
                    None => println!(
                        "No archived job {parsed}; in-flight jobs are only visible through the running server."
                    ),
                }
            }
            JobsSubcommand::Recent { limit } => {
                for job in history.recent(*limit).await? {
                    println!(
                        "{}\t{}\t{}\t{}\tattempts={}",
                        job.job_id,
                        job.key(),
                        job.status,
                        job.completed_at
                            .map(|at| at.to_string())
                            .unwrap_or_else(|| "-".to_owned()),
                        job.attempts
                    );
                }
            }
        }

        Ok(())
    }
}
