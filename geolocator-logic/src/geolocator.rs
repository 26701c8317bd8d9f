use anyhow::{bail, ensure};
use log::debug;

use crate::{
    event::{ServiceError, UpdateEvent},
    location::{Accuracy, Heading, Location, Region},
    platform::LocationPlatform,
    prelude::*,
    service::{ServiceKind, ServiceRequest},
    session::{Flow, Handler, TrackingSession},
    settings::ManagerSettings,
    watch::Watch,
};

/// Starts location, heading and region sessions on a [LocationPlatform] and forwards their
/// events to callbacks.
///
/// Every `start_*` method returns `false` without touching the platform's managers when the
/// service can't be used right now, in that case no callback will ever be invoked. Otherwise a
/// new manager is configured and started, and it keeps running until a callback returns
/// [Break](std::ops::ControlFlow::Break) or the platform reports that location access was lost.
///
/// Sessions are fully independent, starting the same service twice runs two managers.
pub struct Geolocator<P: LocationPlatform> {
    platform: P,
    settings: ManagerSettings,
}

impl<P: LocationPlatform> Geolocator<P> {
    pub fn new(platform: P) -> Self {
        Self::with_settings(platform, ManagerSettings::default())
    }

    pub fn with_settings(platform: P, settings: ManagerSettings) -> Self {
        Self { platform, settings }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    fn start_session(&self, request: ServiceRequest, handler: Handler) -> bool {
        let kind = request.kind();
        if !self.platform.service_available(kind) {
            debug!("{kind:?} is unavailable, not starting a session");
            return false;
        }

        let manager = self.platform.create_manager();
        TrackingSession::new(request, handler).launch(manager, &self.settings);
        true
    }

    /// Standard location service, `on_update` gets the new fix and the previous one (if any)
    pub fn start_standard_location(
        &self,
        accuracy: Accuracy,
        on_update: impl FnMut(&Location, Option<&Location>) -> Flow + 'static,
        on_error: impl FnMut(&ServiceError) + 'static,
    ) -> bool {
        self.start_session(
            ServiceRequest::StandardLocation(accuracy),
            Handler::Location {
                on_update: Box::new(on_update),
                on_error: Box::new(on_error),
            },
        )
    }

    /// Significant location changes service, coarse updates only when the device moves a lot
    pub fn start_significant_location_changes(
        &self,
        on_update: impl FnMut(&Location, Option<&Location>) -> Flow + 'static,
        on_error: impl FnMut(&ServiceError) + 'static,
    ) -> bool {
        self.start_session(
            ServiceRequest::SignificantChange,
            Handler::Location {
                on_update: Box::new(on_update),
                on_error: Box::new(on_error),
            },
        )
    }

    /// Heading service
    pub fn start_heading_updates(
        &self,
        on_update: impl FnMut(&Heading) -> Flow + 'static,
        on_error: impl FnMut(&ServiceError) + 'static,
    ) -> bool {
        self.start_session(
            ServiceRequest::Heading,
            Handler::Heading {
                on_update: Box::new(on_update),
                on_error: Box::new(on_error),
            },
        )
    }

    /// Region boundary crossing service. `region` may be `None`, the platform is then expected
    /// to report an error whose region is also `None`.
    pub fn start_boundary_crossing(
        &self,
        accuracy: Accuracy,
        region: Option<Region>,
        on_enter: impl FnMut(&Region) -> Flow + 'static,
        on_exit: impl FnMut(&Region) -> Flow + 'static,
        on_error: impl FnMut(&ServiceError) + 'static,
    ) -> bool {
        self.start_session(
            ServiceRequest::RegionBoundary(accuracy, region),
            Handler::Boundary {
                on_enter: Box::new(on_enter),
                on_exit: Box::new(on_exit),
                on_error: Box::new(on_error),
            },
        )
    }

    pub fn watch_standard_location(&self, accuracy: Accuracy) -> Result<Watch> {
        let (sender, watch) = Watch::channel();
        let errors = sender.clone();
        let started = self.start_standard_location(
            accuracy,
            move |new, old| sender.send(UpdateEvent::LocationChanged(new.clone(), old.cloned())),
            move |err| errors.send_error(err),
        );
        ensure_started(started, ServiceKind::StandardLocation)?;
        Ok(watch)
    }

    pub fn watch_significant_location_changes(&self) -> Result<Watch> {
        let (sender, watch) = Watch::channel();
        let errors = sender.clone();
        let started = self.start_significant_location_changes(
            move |new, old| sender.send(UpdateEvent::LocationChanged(new.clone(), old.cloned())),
            move |err| errors.send_error(err),
        );
        ensure_started(started, ServiceKind::SignificantChange)?;
        Ok(watch)
    }

    pub fn watch_heading(&self) -> Result<Watch> {
        let (sender, watch) = Watch::channel();
        let errors = sender.clone();
        let started = self.start_heading_updates(
            move |heading| sender.send(UpdateEvent::HeadingChanged(heading.clone())),
            move |err| errors.send_error(err),
        );
        ensure_started(started, ServiceKind::Heading)?;
        Ok(watch)
    }

    pub fn watch_boundary_crossing(
        &self,
        accuracy: Accuracy,
        region: Option<Region>,
    ) -> Result<Watch> {
        let (sender, watch) = Watch::channel();
        let exits = sender.clone();
        let errors = sender.clone();
        let started = self.start_boundary_crossing(
            accuracy,
            region,
            move |region| sender.send(UpdateEvent::RegionEntered(region.clone())),
            move |region| exits.send(UpdateEvent::RegionExited(region.clone())),
            move |err| errors.send_error(err),
        );
        ensure_started(started, ServiceKind::RegionMonitoring)?;
        Ok(watch)
    }

    /// Get a single fix and stop. Non-terminal errors are logged and waited through since the
    /// platform keeps trying after reporting them, only a terminal error (which already stopped
    /// the session) fails the request.
    pub async fn current_location(&self, accuracy: Accuracy) -> Result<Location> {
        let (sender, mut watch) = Watch::channel();
        let errors = sender.clone();
        let started = self.start_standard_location(
            accuracy,
            move |new, old| {
                sender.finish(UpdateEvent::LocationChanged(new.clone(), old.cloned()))
            },
            move |err| errors.send_error(err),
        );
        ensure_started(started, ServiceKind::StandardLocation)
            .context("Failed to request the current location")?;

        loop {
            match watch.next().await {
                Some(Ok(UpdateEvent::LocationChanged(location, _))) => return Ok(location),
                Some(Ok(_)) => {}
                Some(Err(err)) if err.is_terminal() => {
                    return Err(err).context("Platform couldn't determine the location");
                }
                Some(Err(err)) => {
                    debug!("No fix yet, still waiting: {err}");
                }
                None => bail!("Location session ended before a fix was delivered"),
            }
        }
    }
}

fn ensure_started(started: bool, kind: ServiceKind) -> Result {
    ensure!(started, "{kind:?} service is unavailable");
    Ok(())
}
