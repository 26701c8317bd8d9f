use std::{cell::RefCell, collections::HashSet, rc::Rc};

use geolocator_logic::{
    Accuracy, Coordinate, Heading, Location, LocationDelegate, LocationManager, LocationPlatform,
    ManagerSettings, PlatformError, PlatformErrorKind, Region, ServiceKind, ServiceRequest,
};
use log::{debug, trace};
use serde::{Deserialize, Serialize};

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates
pub fn distance_meters(a: &Coordinate, b: &Coordinate) -> f64 {
    let (lat_a, lat_b) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = lat_b - lat_a;
    let d_long = (b.long - a.long).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_long / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    /// How far the device must move before a significant-change session hears about it
    pub significant_distance: f64,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            significant_distance: 500.0,
        }
    }
}

#[derive(Default)]
struct SimSlot {
    request: Option<ServiceRequest>,
    accuracy: Option<Accuracy>,
    settings: ManagerSettings,
    delegate: Option<Box<dyn LocationDelegate>>,
    active: bool,
    /// Last fix this manager delivered
    last_fix: Option<Location>,
    /// Whether the device was inside the monitored region at the last fix
    inside: Option<bool>,
    /// A region session was started without a region, report it on the next pump
    pending_failure: bool,
}

#[derive(Default)]
struct SimInner {
    settings: SimSettings,
    unavailable: RefCell<HashSet<ServiceKind>>,
    slots: RefCell<Vec<SimSlot>>,
}

/// An in-process location platform driven by pushed fixes, headings and errors. Events are
/// delivered synchronously on the thread that pushes them.
///
/// Each running session is held as its manager's delegate and holds that manager, which points
/// back at the platform. Dropping the platform alone won't release running sessions, call
/// [SimPlatform::shutdown] first.
#[derive(Clone, Default)]
pub struct SimPlatform(Rc<SimInner>);

#[derive(Clone)]
pub struct SimManager {
    id: usize,
    inner: Rc<SimInner>,
}

impl SimManager {
    fn with_slot<R>(&self, f: impl FnOnce(&mut SimSlot) -> R) -> R {
        f(&mut self.inner.slots.borrow_mut()[self.id])
    }
}

impl LocationManager for SimManager {
    fn set_desired_accuracy(&mut self, accuracy: Accuracy) {
        self.with_slot(|slot| slot.accuracy = Some(accuracy));
    }

    fn apply_settings(&mut self, settings: &ManagerSettings) {
        self.with_slot(|slot| slot.settings = settings.clone());
    }

    fn set_delegate(&mut self, delegate: Box<dyn LocationDelegate>) {
        let old = self.with_slot(|slot| slot.delegate.replace(delegate));
        drop(old);
    }

    fn start(&mut self, request: &ServiceRequest) {
        debug!("Sim manager {}: starting {:?}", self.id, request.kind());
        self.with_slot(|slot| {
            slot.pending_failure = matches!(request, ServiceRequest::RegionBoundary(_, None));
            slot.request = Some(request.clone());
            slot.active = true;
        });
    }

    fn stop(&mut self, _request: &ServiceRequest) {
        debug!("Sim manager {}: stopped", self.id);
        let released = self.with_slot(|slot| {
            slot.active = false;
            slot.delegate.take()
        });
        drop(released);
    }
}

impl LocationPlatform for SimPlatform {
    type Manager = SimManager;

    fn service_available(&self, service: ServiceKind) -> bool {
        !self.0.unavailable.borrow().contains(&service)
    }

    fn create_manager(&self) -> Self::Manager {
        let mut slots = self.0.slots.borrow_mut();
        slots.push(SimSlot::default());
        SimManager {
            id: slots.len() - 1,
            inner: self.0.clone(),
        }
    }
}

/// What a single manager should hear about after a fix
enum FixOutcome {
    Location(Location, Option<Location>),
    Entered(Region),
    Exited(Region),
}

impl SimPlatform {
    pub fn new(settings: SimSettings) -> Self {
        Self(Rc::new(SimInner {
            settings,
            ..Default::default()
        }))
    }

    pub fn set_available(&self, service: ServiceKind, available: bool) {
        let mut unavailable = self.0.unavailable.borrow_mut();
        if available {
            unavailable.remove(&service);
        } else {
            unavailable.insert(service);
        }
    }

    pub fn manager_count(&self) -> usize {
        self.0.slots.borrow().len()
    }

    pub fn active_count(&self) -> usize {
        self.0.slots.borrow().iter().filter(|s| s.active).count()
    }

    pub fn desired_accuracy(&self, id: usize) -> Option<Accuracy> {
        self.0.slots.borrow().get(id).and_then(|s| s.accuracy)
    }

    pub fn is_active(&self, id: usize) -> bool {
        self.0.slots.borrow().get(id).is_some_and(|s| s.active)
    }

    /// Release every delegate the platform still holds, their sessions stop their managers as
    /// they go
    pub fn shutdown(&self) {
        let released = self
            .0
            .slots
            .borrow_mut()
            .iter_mut()
            .filter_map(|s| s.delegate.take())
            .collect::<Vec<_>>();
        debug!("Sim platform: releasing {} session(s)", released.len());
        drop(released);
    }

    fn active_ids(&self) -> Vec<usize> {
        self.0
            .slots
            .borrow()
            .iter()
            .enumerate()
            .filter(|(_, s)| s.active)
            .map(|(id, _)| id)
            .collect()
    }

    fn kind_of(&self, id: usize) -> Option<ServiceKind> {
        self.0.slots.borrow()[id].request.as_ref().map(|r| r.kind())
    }

    fn dispatch(&self, id: usize, f: impl FnOnce(&mut dyn LocationDelegate)) {
        let delegate = {
            let mut slots = self.0.slots.borrow_mut();
            if !slots[id].active {
                return;
            }
            slots[id].delegate.take()
        };

        if let Some(mut delegate) = delegate {
            f(delegate.as_mut());
            let mut slots = self.0.slots.borrow_mut();
            if slots[id].active {
                slots[id].delegate = Some(delegate);
                return;
            }
            drop(slots);
            drop(delegate);
        }
    }

    /// Deliver anything the platform owes managers from starting, like the failure for a region
    /// session with no region
    pub fn pump(&self) {
        for id in self.active_ids() {
            let pending = {
                let mut slots = self.0.slots.borrow_mut();
                std::mem::take(&mut slots[id].pending_failure)
            };
            if pending {
                let error = PlatformError::new(
                    PlatformErrorKind::RegionMonitoringFailure,
                    "No region to monitor",
                );
                self.dispatch(id, |d| d.on_error(&error, None));
            }
        }
    }

    fn fix_outcome(&self, id: usize, fix: &Location) -> Option<FixOutcome> {
        let significant_distance = self.0.settings.significant_distance;
        let mut slots = self.0.slots.borrow_mut();
        let slot = &mut slots[id];

        match slot.request.as_ref()? {
            ServiceRequest::StandardLocation(_) => {
                if let (Some(filter), Some(last)) = (slot.settings.distance_filter, &slot.last_fix)
                {
                    if distance_meters(&last.coordinate, &fix.coordinate) < filter {
                        trace!("Sim manager {id}: fix inside distance filter");
                        return None;
                    }
                }
                let old = slot.last_fix.replace(fix.clone());
                Some(FixOutcome::Location(fix.clone(), old))
            }
            ServiceRequest::SignificantChange => {
                let moved = slot.last_fix.as_ref().is_none_or(|last| {
                    distance_meters(&last.coordinate, &fix.coordinate) >= significant_distance
                });
                if !moved {
                    return None;
                }
                let old = slot.last_fix.replace(fix.clone());
                Some(FixOutcome::Location(fix.clone(), old))
            }
            ServiceRequest::RegionBoundary(_, Some(region)) => {
                let inside = distance_meters(&region.center, &fix.coordinate) <= region.radius;
                let previous = slot.inside.replace(inside);
                match (previous, inside) {
                    (Some(false) | None, true) => Some(FixOutcome::Entered(region.clone())),
                    (Some(true), false) => Some(FixOutcome::Exited(region.clone())),
                    _ => None,
                }
            }
            ServiceRequest::RegionBoundary(_, None) | ServiceRequest::Heading => None,
        }
    }

    /// Move the simulated device
    pub fn push_fix(&self, fix: &Location) {
        self.pump();
        for id in self.active_ids() {
            match self.fix_outcome(id, fix) {
                Some(FixOutcome::Location(new, old)) => {
                    self.dispatch(id, |d| d.on_location_update(&new, old.as_ref()));
                }
                Some(FixOutcome::Entered(region)) => {
                    self.dispatch(id, |d| d.on_region_enter(&region));
                }
                Some(FixOutcome::Exited(region)) => {
                    self.dispatch(id, |d| d.on_region_exit(&region));
                }
                None => {}
            }
        }
    }

    pub fn push_heading(&self, heading: &Heading) {
        self.pump();
        for id in self.active_ids() {
            if self.kind_of(id) == Some(ServiceKind::Heading) {
                self.dispatch(id, |d| d.on_heading_update(heading));
            }
        }
    }

    /// Report an error to every running manager, region sessions get their region attached
    pub fn push_error(&self, error: &PlatformError) {
        self.pump();
        for id in self.active_ids() {
            let region = self.0.slots.borrow()[id]
                .request
                .as_ref()
                .and_then(|r| r.region().cloned());
            self.dispatch(id, |d| d.on_error(error, region.as_ref()));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::ops::ControlFlow;

    use chrono::Utc;
    use geolocator_logic::Geolocator;

    use super::*;

    fn fix(lat: f64, long: f64) -> Location {
        Location::at(Coordinate::new(lat, long), Utc::now())
    }

    fn counter() -> Rc<RefCell<Vec<String>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn test_distance() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 1.0);
        let d = distance_meters(&a, &b);
        assert!((d - 111_195.0).abs() < 10.0, "One degree at the equator was {d}");
        assert_eq!(distance_meters(&a, &a), 0.0);
    }

    #[test]
    fn test_region_crossings_from_fixes() {
        let platform = SimPlatform::default();
        let geo = Geolocator::new(platform.clone());
        let calls = counter();
        let region = Region::new("square", Coordinate::new(10.0, 10.0), 200.0);

        geo.start_boundary_crossing(
            Accuracy::Best,
            Some(region),
            {
                let calls = calls.clone();
                move |r| {
                    calls.borrow_mut().push(format!("enter {}", r.identifier));
                    ControlFlow::Continue(())
                }
            },
            {
                let calls = calls.clone();
                move |r| {
                    calls.borrow_mut().push(format!("exit {}", r.identifier));
                    ControlFlow::Continue(())
                }
            },
            |_| {},
        );

        platform.push_fix(&fix(10.1, 10.0));
        platform.push_fix(&fix(10.0, 10.0));
        platform.push_fix(&fix(10.0005, 10.0));
        platform.push_fix(&fix(10.1, 10.0));

        assert_eq!(*calls.borrow(), vec!["enter square", "exit square"]);
    }

    #[test]
    fn test_significant_changes_skip_small_moves() {
        let platform = SimPlatform::new(SimSettings {
            significant_distance: 1000.0,
        });
        let geo = Geolocator::new(platform.clone());
        let calls = counter();

        geo.start_significant_location_changes(
            {
                let calls = calls.clone();
                move |new, old| {
                    calls
                        .borrow_mut()
                        .push(format!("{} {}", new.coordinate.lat, old.is_some()));
                    ControlFlow::Continue(())
                }
            },
            |_| {},
        );

        platform.push_fix(&fix(0.0, 0.0));
        platform.push_fix(&fix(0.001, 0.0));
        platform.push_fix(&fix(0.02, 0.0));

        assert_eq!(*calls.borrow(), vec!["0 false", "0.02 true"]);
    }

    #[test]
    fn test_shutdown_stops_running_sessions() {
        let platform = SimPlatform::default();
        let geo = Geolocator::new(platform.clone());

        geo.start_standard_location(Accuracy::Best, |_, _| ControlFlow::Continue(()), |_| {});
        geo.start_heading_updates(|_| ControlFlow::Continue(()), |_| {});
        geo.start_significant_location_changes(|_, _| ControlFlow::Break(()), |_| {});
        platform.push_fix(&fix(1.0, 1.0));
        assert_eq!(platform.active_count(), 2);

        drop(geo);
        platform.shutdown();

        assert_eq!(platform.active_count(), 0);
        assert_eq!(
            Rc::strong_count(&platform.0),
            1,
            "Managers should no longer hold the platform"
        );
    }

    #[test]
    fn test_missing_region_fails_on_pump() {
        let platform = SimPlatform::default();
        let geo = Geolocator::new(platform.clone());
        let errors = counter();

        let started = geo.start_boundary_crossing(
            Accuracy::Best,
            None,
            |_| ControlFlow::Continue(()),
            |_| ControlFlow::Continue(()),
            {
                let errors = errors.clone();
                move |err| {
                    assert!(err.region.is_none());
                    errors.borrow_mut().push(err.to_string());
                }
            },
        );
        assert!(started);

        platform.pump();
        platform.pump();

        assert_eq!(
            *errors.borrow(),
            vec!["region monitoring failure: No region to monitor"]
        );
        assert!(platform.is_active(0));
    }

    #[test]
    fn test_distance_filter_applies_to_standard_sessions() {
        let platform = SimPlatform::default();
        let settings = ManagerSettings {
            distance_filter: Some(50.0),
            ..Default::default()
        };
        let geo = Geolocator::with_settings(platform.clone(), settings);
        let calls = counter();

        geo.start_standard_location(
            Accuracy::Best,
            {
                let calls = calls.clone();
                move |new, _| {
                    calls.borrow_mut().push(new.coordinate.lat.to_string());
                    ControlFlow::Continue(())
                }
            },
            |_| {},
        );

        platform.push_fix(&fix(0.0, 0.0));
        platform.push_fix(&fix(0.0001, 0.0));
        platform.push_fix(&fix(0.001, 0.0));

        assert_eq!(*calls.borrow(), vec!["0", "0.001"]);
        assert_eq!(platform.desired_accuracy(0), Some(Accuracy::Best));
    }
}
