use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use olm_probe::ProbeState;
use olm_scenario::TrajectoryCheckpoint;
use serde_json::json;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Checkpoint to summarize.
    #[arg(long)]
    pub checkpoint: PathBuf,
    /// List the states recorded in this element.
    #[arg(long)]
    pub element: Option<String>,
    /// Report the state nearest this position (m).
    #[arg(long)]
    pub position: Option<f64>,
}

pub fn run(args: &InspectArgs) -> Result<(), Box<dyn Error>> {
    let checkpoint = TrajectoryCheckpoint::load(&args.checkpoint)?;
    let trajectory = &checkpoint.trajectory;
    let mut report = json!({
        "provenance": checkpoint.provenance,
        "states": trajectory.len(),
        "trajectory_hash": checkpoint.trajectory_hash,
    });
    if let (Ok(first), Ok(last)) = (trajectory.initial_state(), trajectory.final_state()) {
        report["first"] = describe(first);
        report["last"] = describe(last);
    }
    if let Some(id) = &args.element {
        let states: Vec<_> = trajectory
            .states_for_element(id)
            .into_iter()
            .map(describe)
            .collect();
        report["element"] = json!({ "id": id, "states": states });
    }
    if let Some(position) = args.position {
        report["nearest"] = describe(trajectory.state_nearest_position(position)?);
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn describe(state: &ProbeState) -> serde_json::Value {
    json!({
        "element": state.element_id,
        "position": state.position,
        "time": state.time,
        "kinetic_energy": state.kinetic_energy,
        "centroid": state.centroid().map(|c| *c.as_array()),
    })
}
