use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use olm_elem::ParameterSnapshot;
use olm_scenario::{checkpoint_path, ScenarioConfig, TrajectoryCheckpoint};
use serde_json::json;
use tracing::info;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML run description (lattice, probe, tracker).
    #[arg(long)]
    pub config: PathBuf,
    /// YAML parameter snapshot applied with the configured sync mode before the run.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
    /// Output directory for the trajectory checkpoint.
    #[arg(long)]
    pub out: PathBuf,
    /// Checkpoint label; defaults to the lattice id.
    #[arg(long)]
    pub label: Option<String>,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let config = ScenarioConfig::load(&args.config)?;
    let mut scenario = config.build()?;
    if let Some(path) = &args.snapshot {
        let snapshot = ParameterSnapshot::load(path)?;
        scenario.resync(&snapshot)?;
        info!(path = %path.display(), mode = %scenario.sync_mode(), "snapshot applied");
    }
    let label = args
        .label
        .clone()
        .unwrap_or_else(|| config.lattice.id.clone());
    let path = checkpoint_path(&args.out, &label);

    let outcome = scenario.run();
    let checkpoint = scenario.checkpoint()?;
    checkpoint.store(&path)?;
    let trajectory = outcome?;

    let summary = summary(&checkpoint, &path);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    info!(states = trajectory.len(), path = %path.display(), "checkpoint written");
    Ok(())
}

fn summary(checkpoint: &TrajectoryCheckpoint, path: &std::path::Path) -> serde_json::Value {
    let last = checkpoint.trajectory.final_state().ok();
    json!({
        "checkpoint": path.display().to_string(),
        "lattice": checkpoint.provenance.lattice_id,
        "probe": checkpoint.provenance.probe_kind,
        "states": checkpoint.trajectory.len(),
        "final_position": last.map(|s| s.position),
        "final_energy": last.map(|s| s.kinetic_energy),
        "trajectory_hash": checkpoint.trajectory_hash,
    })
}
