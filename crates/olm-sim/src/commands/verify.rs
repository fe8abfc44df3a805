use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use olm_scenario::TrajectoryCheckpoint;

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Checkpoint to verify.
    #[arg(long)]
    pub checkpoint: PathBuf,
    /// Expected trajectory hash, when known.
    #[arg(long)]
    pub expect: Option<String>,
}

pub fn run(args: &VerifyArgs) -> Result<(), Box<dyn Error>> {
    // Loading re-derives the hash and fails on mismatch.
    let checkpoint = TrajectoryCheckpoint::load(&args.checkpoint)?;
    if let Some(expected) = &args.expect {
        if expected != &checkpoint.trajectory_hash {
            return Err(format!(
                "checkpoint {} hash mismatch: expected {} got {}",
                args.checkpoint.display(),
                expected,
                checkpoint.trajectory_hash
            )
            .into());
        }
    }
    println!("checkpoint verified: {}", checkpoint.trajectory_hash);
    Ok(())
}
