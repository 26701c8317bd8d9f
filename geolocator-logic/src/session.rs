use std::ops::ControlFlow;

use log::{debug, trace};
use uuid::Uuid;

use crate::{
    event::{PlatformError, ServiceError, UpdateEvent},
    location::{Heading, Location, Region},
    platform::{LocationDelegate, LocationManager},
    service::ServiceRequest,
    settings::ManagerSettings,
};

pub type SessionId = Uuid;

/// Returned by update callbacks, `Break` stops the session
pub type Flow = ControlFlow<()>;

pub type LocationCallback = Box<dyn FnMut(&Location, Option<&Location>) -> Flow>;
pub type HeadingCallback = Box<dyn FnMut(&Heading) -> Flow>;
pub type RegionCallback = Box<dyn FnMut(&Region) -> Flow>;
pub type ErrorCallback = Box<dyn FnMut(&ServiceError)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Started,
    Stopped,
}

/// The caller's callbacks for one session, shaped by the service it was started for
pub(crate) enum Handler {
    Location {
        on_update: LocationCallback,
        on_error: ErrorCallback,
    },
    Heading {
        on_update: HeadingCallback,
        on_error: ErrorCallback,
    },
    Boundary {
        on_enter: RegionCallback,
        on_exit: RegionCallback,
        on_error: ErrorCallback,
    },
}

impl Handler {
    /// Hand the event to the matching callback, `None` if this handler has no callback for it
    fn forward(&mut self, event: &UpdateEvent) -> Option<Flow> {
        match (self, event) {
            (Handler::Location { on_update, .. }, UpdateEvent::LocationChanged(new, old)) => {
                Some(on_update(new, old.as_ref()))
            }
            (Handler::Heading { on_update, .. }, UpdateEvent::HeadingChanged(heading)) => {
                Some(on_update(heading))
            }
            (Handler::Boundary { on_enter, .. }, UpdateEvent::RegionEntered(region)) => {
                Some(on_enter(region))
            }
            (Handler::Boundary { on_exit, .. }, UpdateEvent::RegionExited(region)) => {
                Some(on_exit(region))
            }
            _ => None,
        }
    }

    fn error_callback(&mut self) -> &mut ErrorCallback {
        match self {
            Handler::Location { on_error, .. }
            | Handler::Heading { on_error, .. }
            | Handler::Boundary { on_error, .. } => on_error,
        }
    }
}

/// One running service. The session is installed as its manager's delegate, so the platform
/// keeps it alive until the manager is stopped.
pub(crate) struct TrackingSession<M: LocationManager> {
    id: SessionId,
    request: ServiceRequest,
    state: SessionState,
    manager: Option<M>,
    handler: Handler,
}

impl<M: LocationManager + 'static> TrackingSession<M> {
    pub fn new(request: ServiceRequest, handler: Handler) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            state: SessionState::Idle,
            manager: None,
            handler,
        }
    }

    /// Configure `manager` for this session's request, install the session as its delegate and
    /// start it.
    pub fn launch(mut self, mut manager: M, settings: &ManagerSettings) -> SessionId {
        manager.apply_settings(settings);
        if let Some(accuracy) = self.request.accuracy() {
            manager.set_desired_accuracy(accuracy);
        }

        let id = self.id;
        let request = self.request.clone();
        self.manager = Some(manager.clone());
        self.state = SessionState::Started;

        debug!("Session {id}: starting {:?}", request.kind());
        manager.set_delegate(Box::new(self));
        manager.start(&request);
        id
    }

    fn deliver(&mut self, event: UpdateEvent) {
        if self.state != SessionState::Started {
            trace!("Session {}: dropping event after stop", self.id);
            return;
        }

        match self.handler.forward(&event) {
            Some(ControlFlow::Break(())) => {
                debug!("Session {}: callback requested stop", self.id);
                self.stop();
            }
            Some(ControlFlow::Continue(())) => {}
            None => trace!(
                "Session {}: ignoring {event:?} for {:?}",
                self.id,
                self.request.kind()
            ),
        }
    }

    fn report(&mut self, error: &PlatformError, region: Option<&Region>) {
        if self.state != SessionState::Started {
            return;
        }

        let error = ServiceError {
            error: error.clone(),
            region: region.cloned(),
        };
        (self.handler.error_callback())(&error);

        if error.is_terminal() {
            debug!("Session {}: service lost, stopping", self.id);
            self.stop();
        }
    }

    fn stop(&mut self) {
        if let Some(mut manager) = self.manager.take() {
            manager.stop(&self.request);
            debug!("Session {}: stopped", self.id);
        }
        self.state = SessionState::Stopped;
    }
}

impl<M: LocationManager> Drop for TrackingSession<M> {
    fn drop(&mut self) {
        // Platform let go of us without a stop, make sure the manager doesn't keep running
        if let Some(mut manager) = self.manager.take() {
            manager.stop(&self.request);
            debug!("Session {}: released, manager stopped", self.id);
        }
    }
}

impl<M: LocationManager + 'static> LocationDelegate for TrackingSession<M> {
    fn on_location_update(&mut self, new: &Location, old: Option<&Location>) {
        self.deliver(UpdateEvent::LocationChanged(new.clone(), old.cloned()));
    }

    fn on_heading_update(&mut self, heading: &Heading) {
        self.deliver(UpdateEvent::HeadingChanged(heading.clone()));
    }

    fn on_region_enter(&mut self, region: &Region) {
        self.deliver(UpdateEvent::RegionEntered(region.clone()));
    }

    fn on_region_exit(&mut self, region: &Region) {
        self.deliver(UpdateEvent::RegionExited(region.clone()));
    }

    fn on_error(&mut self, error: &PlatformError, region: Option<&Region>) {
        self.report(error, region);
    }
}
