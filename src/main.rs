// Entrypoint for the `crowdaq` resource tool.
// Keeps `main` small: parse arguments and hand over to the command layer.

use clap::Parser;
use crowdaq_cli::cli::crowdaq::Cli;

fn main() -> anyhow::Result<()> {
    Cli::parse().run()
}
