mod scenario;
mod sim;

pub mod prelude {
    pub use anyhow::Context;
    pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
}

pub use prelude::*;
pub use scenario::{
    ReplayEntry, Scenario, SessionService, SessionSpec, SimStep, Transcript, load_scenario,
    run_scenario,
};
pub use sim::{SimManager, SimPlatform, SimSettings, distance_meters};
