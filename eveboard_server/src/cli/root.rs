use clap::{ArgAction, Parser, Subcommand};

use crate::cli::{debug::DebugCommand, serve::ServeCommand};

pub(crate) fn get_args() -> CliOpts {
    CliOpts::parse()
}

#[derive(Debug, Parser)]
#[command(version = clap::crate_version!(), about = "EVE dashboard backend")]
pub(crate) struct CliOpts {
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    subcmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API and the background sync workers.
    Serve(ServeCommand),

    /// Debug and operations commands.
    Debug(DebugCommand),
}

impl CliOpts {
    pub(crate) fn verbose(&self) -> u8 {
        self.verbose
    }

    pub(crate) async fn run(&self) -> anyhow::Result<()> {
        match &self.subcmd {
            Command::Serve(cmd) => cmd.run().await,
            Command::Debug(cmd) => cmd.run().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::CliOpts;

    #[test]
    fn cli_definition_is_consistent() {
        CliOpts::command().debug_assert();
    }

    #[test]
    fn verbosity_counts_repeated_flags() {
        let opts = CliOpts::try_parse_from(["eveboard", "-vv", "debug", "sde", "type", "34"])
            .expect("parse args");
        assert_eq!(opts.verbose(), 2);
    }
}
