use std::{
    cell::{Cell, RefCell},
    fs,
    ops::ControlFlow,
    path::Path,
    rc::Rc,
};

use geolocator_logic::{
    Accuracy, Flow, Geolocator, Heading, Location, ManagerSettings, PlatformError, Region,
    ServiceError, ServiceKind, UpdateEvent,
};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    prelude::*,
    sim::{SimPlatform, SimSettings},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionService {
    StandardLocation {
        #[serde(default)]
        accuracy: Accuracy,
    },
    SignificantChange,
    Heading,
    BoundaryCrossing {
        #[serde(default)]
        accuracy: Accuracy,
        #[serde(default)]
        region: Option<Region>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSpec {
    /// Name used for this session in the transcript
    pub name: String,
    pub service: SessionService,
    /// Return stop from the callback after this many updates, `None` runs forever
    #[serde(default)]
    pub stop_after: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// One thing that happens to the simulated device
pub enum SimStep {
    Fix(Location),
    Heading(Heading),
    Error(PlatformError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub settings: ManagerSettings,
    #[serde(default)]
    pub sim: SimSettings,
    /// Services the simulated device can't run
    #[serde(default)]
    pub unavailable: Vec<ServiceKind>,
    pub sessions: Vec<SessionSpec>,
    #[serde(default)]
    pub steps: Vec<SimStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ReplayEntry {
    Started { session: String, started: bool },
    Update { session: String, event: UpdateEvent },
    Error { session: String, error: ServiceError },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    pub entries: Vec<ReplayEntry>,
    /// Sessions still running once every step was replayed
    pub active_sessions: usize,
}

pub fn load_scenario(path: impl AsRef<Path>) -> Result<Scenario> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario {}", path.display()))?;
    serde_json::from_str(&raw).context("Failed to parse scenario")
}

type Entries = Rc<RefCell<Vec<ReplayEntry>>>;

/// Records updates for one session and decides when it should stop
#[derive(Clone)]
struct Recorder {
    session: String,
    entries: Entries,
    updates: Rc<Cell<usize>>,
    stop_after: Option<usize>,
}

impl Recorder {
    fn update(&self, event: UpdateEvent) -> Flow {
        self.entries.borrow_mut().push(ReplayEntry::Update {
            session: self.session.clone(),
            event,
        });
        let updates = self.updates.get() + 1;
        self.updates.set(updates);
        if self.stop_after.is_some_and(|limit| updates >= limit) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn error(&self, error: &ServiceError) {
        self.entries.borrow_mut().push(ReplayEntry::Error {
            session: self.session.clone(),
            error: error.clone(),
        });
    }
}

fn start(geo: &Geolocator<SimPlatform>, spec: &SessionSpec, entries: &Entries) -> bool {
    let recorder = Recorder {
        session: spec.name.clone(),
        entries: entries.clone(),
        updates: Rc::new(Cell::new(0)),
        stop_after: spec.stop_after,
    };
    let errors = recorder.clone();

    match &spec.service {
        SessionService::StandardLocation { accuracy } => geo.start_standard_location(
            *accuracy,
            move |new, old| {
                recorder.update(UpdateEvent::LocationChanged(new.clone(), old.cloned()))
            },
            move |err| errors.error(err),
        ),
        SessionService::SignificantChange => geo.start_significant_location_changes(
            move |new, old| {
                recorder.update(UpdateEvent::LocationChanged(new.clone(), old.cloned()))
            },
            move |err| errors.error(err),
        ),
        SessionService::Heading => geo.start_heading_updates(
            move |heading| recorder.update(UpdateEvent::HeadingChanged(heading.clone())),
            move |err| errors.error(err),
        ),
        SessionService::BoundaryCrossing { accuracy, region } => {
            let exits = recorder.clone();
            geo.start_boundary_crossing(
                *accuracy,
                region.clone(),
                move |region| recorder.update(UpdateEvent::RegionEntered(region.clone())),
                move |region| exits.update(UpdateEvent::RegionExited(region.clone())),
                move |err| errors.error(err),
            )
        }
    }
}

/// Start every session of the scenario on a fresh simulated platform, replay the steps and
/// collect every callback invocation in order
pub fn run_scenario(scenario: &Scenario) -> Transcript {
    let geo = Geolocator::with_settings(
        SimPlatform::new(scenario.sim.clone()),
        scenario.settings.clone(),
    );
    let platform = geo.platform();
    for kind in scenario.unavailable.iter() {
        platform.set_available(*kind, false);
    }
    let entries = Entries::default();

    for spec in scenario.sessions.iter() {
        let started = start(&geo, spec, &entries);
        info!("Session {}: started = {started}", spec.name);
        entries.borrow_mut().push(ReplayEntry::Started {
            session: spec.name.clone(),
            started,
        });
    }

    platform.pump();
    for step in scenario.steps.iter() {
        match step {
            SimStep::Fix(fix) => platform.push_fix(fix),
            SimStep::Heading(heading) => platform.push_heading(heading),
            SimStep::Error(error) => platform.push_error(error),
        }
    }

    let active_sessions = platform.active_count();
    platform.shutdown();

    let entries = entries.borrow().clone();
    Transcript {
        entries,
        active_sessions,
    }
}

#[cfg(test)]
mod tests {
    use geolocator_logic::{Coordinate, PlatformErrorKind};

    use super::*;

    const SCENARIO: &str = r#"{
        "settings": { "distance_filter": null },
        "unavailable": ["Heading"],
        "sessions": [
            {
                "name": "walk",
                "service": { "StandardLocation": { "accuracy": { "Meters": 10.0 } } },
                "stop_after": 2
            },
            { "name": "compass", "service": "Heading" },
            {
                "name": "home",
                "service": {
                    "BoundaryCrossing": {
                        "region": {
                            "identifier": "home",
                            "center": { "lat": 43.0, "long": -78.0 },
                            "radius": 100.0
                        }
                    }
                },
                "stop_after": 2
            },
            { "name": "lost", "service": { "BoundaryCrossing": {} } }
        ],
        "steps": [
            { "Fix": { "coordinate": { "lat": 43.0, "long": -78.0 }, "timestamp": "2024-05-01T12:00:00Z" } },
            { "Error": { "kind": "LocationUnknown", "message": "" } },
            { "Fix": { "coordinate": { "lat": 43.01, "long": -78.0 }, "timestamp": "2024-05-01T12:01:00Z" } },
            { "Fix": { "coordinate": { "lat": 43.0, "long": -78.0 }, "timestamp": "2024-05-01T12:02:00Z" } }
        ]
    }"#;

    fn sessions_of(transcript: &Transcript, name: &str) -> Vec<ReplayEntry> {
        transcript
            .entries
            .iter()
            .filter(|e| match e {
                ReplayEntry::Started { session, .. }
                | ReplayEntry::Update { session, .. }
                | ReplayEntry::Error { session, .. } => session == name,
            })
            .cloned()
            .collect()
    }

    #[test]
    fn test_replay_scenario() {
        let scenario: Scenario = serde_json::from_str(SCENARIO).expect("Scenario should parse");
        let transcript = run_scenario(&scenario);

        let compass = sessions_of(&transcript, "compass");
        assert_eq!(
            compass,
            vec![ReplayEntry::Started {
                session: "compass".into(),
                started: false
            }]
        );

        let walk = sessions_of(&transcript, "walk");
        assert_eq!(walk.len(), 4, "Start, two fixes and one error: {walk:?}");
        assert!(matches!(
            &walk[1],
            ReplayEntry::Update { event: UpdateEvent::LocationChanged(_, None), .. }
        ));
        assert!(matches!(
            &walk[2],
            ReplayEntry::Error { error, .. } if error.error.kind == PlatformErrorKind::LocationUnknown
        ));
        assert!(matches!(
            &walk[3],
            ReplayEntry::Update { event: UpdateEvent::LocationChanged(new, Some(old)), .. }
                if new.coordinate == Coordinate::new(43.01, -78.0)
                    && old.coordinate == Coordinate::new(43.0, -78.0)
        ));

        let home = sessions_of(&transcript, "home");
        let crossings = home
            .iter()
            .filter_map(|e| match e {
                ReplayEntry::Update { event, .. } => Some(event.clone()),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert!(matches!(
            crossings.as_slice(),
            [UpdateEvent::RegionEntered(_), UpdateEvent::RegionExited(_)]
        ));

        let lost = sessions_of(&transcript, "lost");
        let errors = lost
            .iter()
            .filter_map(|e| match e {
                ReplayEntry::Error { error, .. } => Some(error.clone()),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(errors.len(), 2, "Missing-region failure and the pushed error");
        assert!(errors.iter().all(|e| e.region.is_none()));
        assert_eq!(
            errors[0].error.kind,
            PlatformErrorKind::RegionMonitoringFailure
        );

        // walk and home stopped themselves, lost keeps going
        assert_eq!(transcript.active_sessions, 1);
    }

    #[test]
    fn test_region_errors_carry_region() {
        let region = Region::new("office", Coordinate::new(1.0, 1.0), 50.0);
        let scenario = Scenario {
            settings: ManagerSettings::default(),
            sim: SimSettings::default(),
            unavailable: vec![],
            sessions: vec![SessionSpec {
                name: "office".into(),
                service: SessionService::BoundaryCrossing {
                    accuracy: Accuracy::Best,
                    region: Some(region.clone()),
                },
                stop_after: None,
            }],
            steps: vec![SimStep::Error(PlatformError::new(
                PlatformErrorKind::Denied,
                "revoked",
            ))],
        };

        let transcript = run_scenario(&scenario);

        assert_eq!(
            transcript.entries.last(),
            Some(&ReplayEntry::Error {
                session: "office".into(),
                error: ServiceError {
                    error: PlatformError::new(PlatformErrorKind::Denied, "revoked"),
                    region: Some(region),
                },
            })
        );
        assert_eq!(transcript.active_sessions, 0, "Denied ends the session");
    }

    #[test]
    fn test_demo_scenario() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos/walk_home.json");
        let scenario = load_scenario(path).expect("Demo scenario should load");
        let transcript = run_scenario(&scenario);

        let updates = |name: &str| {
            sessions_of(&transcript, name)
                .into_iter()
                .filter(|e| matches!(e, ReplayEntry::Update { .. }))
                .count()
        };
        assert_eq!(updates("walk"), 3);
        assert_eq!(updates("coarse"), 3);
        assert_eq!(updates("compass"), 1);
        assert_eq!(updates("home"), 2);
        assert_eq!(transcript.active_sessions, 2);
    }

    #[test]
    fn test_load_scenario_missing_file() {
        let err = load_scenario("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read scenario"));
    }
}
