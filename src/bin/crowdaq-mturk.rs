// Entrypoint for the `crowdaq-mturk` marketplace tool.

use clap::Parser;
use crowdaq_cli::cli::mturk::Cli;

fn main() -> anyhow::Result<()> {
    Cli::parse().run()
}
