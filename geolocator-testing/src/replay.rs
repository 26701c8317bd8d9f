use std::path::PathBuf;

use clap::Parser;
use geolocator_test_shared::{load_scenario, prelude::*, run_scenario};
use log::info;

#[derive(Parser)]
/// Replay a scripted scenario against the simulated location platform and print every
/// callback the sessions received
struct Cli {
    /// Path to the scenario JSON file
    scenario: PathBuf,

    /// Pretty-print the transcript
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result {
    colog::init();

    let cli = Cli::parse();

    let scenario = load_scenario(&cli.scenario).context("Failed to load scenario")?;
    info!(
        "Replaying {} sessions over {} steps",
        scenario.sessions.len(),
        scenario.steps.len()
    );

    let transcript = run_scenario(&scenario);

    let out = if cli.pretty {
        serde_json::to_string_pretty(&transcript)
    } else {
        serde_json::to_string(&transcript)
    }
    .context("Failed to serialize transcript")?;

    println!("{out}");
    info!("{} sessions still running", transcript.active_sessions);

    Ok(())
}
