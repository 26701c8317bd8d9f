use crate::{
    event::PlatformError,
    location::{Accuracy, Heading, Location, Region},
    service::{ServiceKind, ServiceRequest},
    settings::ManagerSettings,
};

/// The system location service, hands out managers and says which services this device can run.
pub trait LocationPlatform {
    type Manager: LocationManager + 'static;

    /// Check whether a service can be started right now (enabled, supported by the hardware,
    /// and permitted).
    fn service_available(&self, service: ServiceKind) -> bool;
    /// Create a fresh manager, nothing is delivered until it's given a delegate and started.
    fn create_manager(&self) -> Self::Manager;
}

/// Handle to one platform location manager. Clones refer to the same underlying manager.
pub trait LocationManager: Clone {
    fn set_desired_accuracy(&mut self, accuracy: Accuracy);
    fn apply_settings(&mut self, settings: &ManagerSettings);
    /// Install the handler that receives this manager's events. The platform owns the delegate
    /// until the manager is stopped and must release it afterwards.
    fn set_delegate(&mut self, delegate: Box<dyn LocationDelegate>);
    /// Begin delivering events for the given service
    fn start(&mut self, request: &ServiceRequest);
    /// Stop delivering events for the given service, no delegate calls happen after this returns
    fn stop(&mut self, request: &ServiceRequest);
}

/// Receives events from a [LocationManager] on the platform's delivery thread.
pub trait LocationDelegate {
    fn on_location_update(&mut self, new: &Location, old: Option<&Location>);
    fn on_heading_update(&mut self, heading: &Heading);
    fn on_region_enter(&mut self, region: &Region);
    fn on_region_exit(&mut self, region: &Region);
    /// The platform failed, `region` is set for region monitoring failures when it's known
    fn on_error(&mut self, error: &PlatformError, region: Option<&Region>);
}
