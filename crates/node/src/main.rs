use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = ezballot_node::cli::Cli::parse();
    cli.run()
}
