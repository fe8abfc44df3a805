use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    inspect::{self, InspectArgs},
    run::{self, RunArgs},
    verify::{self, VerifyArgs},
};

mod commands;
mod logging;

#[derive(Parser, Debug)]
#[command(name = "olm-sim", about = "Online model probe propagation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Propagate a probe through a YAML-described lattice and write a checkpoint.
    Run(RunArgs),
    /// Summarize a trajectory checkpoint.
    Inspect(InspectArgs),
    /// Re-check the canonical hash of a trajectory checkpoint.
    Verify(VerifyArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    logging::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run::run(&args),
        Command::Inspect(args) => inspect::run(&args),
        Command::Verify(args) => verify::run(&args),
    }
}
