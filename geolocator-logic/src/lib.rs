mod event;
mod geolocator;
mod location;
mod platform;
mod service;
mod session;
mod settings;
mod watch;

pub use event::{PlatformError, PlatformErrorKind, ServiceError, UpdateEvent};
pub use geolocator::Geolocator;
pub use location::{Accuracy, Coordinate, Heading, Location, LocationComponent, Region, UtcDT};
pub use platform::{LocationDelegate, LocationManager, LocationPlatform};
pub use service::{ServiceKind, ServiceRequest};
pub use session::{
    ErrorCallback, Flow, HeadingCallback, LocationCallback, RegionCallback, SessionId,
};
pub use settings::{ActivityType, ManagerSettings};
pub use watch::{Watch, WatchItem};

pub mod prelude {
    use anyhow::Error as AnyhowError;
    use std::result::Result as StdResult;
    pub type Result<T = (), E = AnyhowError> = StdResult<T, E>;
    pub use anyhow::Context;
}
