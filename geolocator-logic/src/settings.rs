use serde::{Deserialize, Serialize};

use crate::location::LocationComponent;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
/// Hint to the platform about how the device is moving, used to tune automatic pausing
pub enum ActivityType {
    #[default]
    Other,
    Automotive,
    Fitness,
    OtherNavigation,
    Airborne,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Configuration applied to every manager before it's started
#[serde(default)]
pub struct ManagerSettings {
    /// Minimum distance in meters the device must move before a new fix is reported,
    /// `None` reports all movement
    pub distance_filter: Option<LocationComponent>,
    /// Minimum change in degrees before a new heading is reported, `None` reports all changes
    pub heading_filter: Option<LocationComponent>,
    /// Let the platform pause location updates when it thinks the device isn't moving
    pub pauses_updates_automatically: bool,
    pub activity: ActivityType,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            distance_filter: None,
            heading_filter: Some(1.0),
            pauses_updates_automatically: true,
            activity: ActivityType::Other,
        }
    }
}
