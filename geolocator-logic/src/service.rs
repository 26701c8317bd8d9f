use serde::{Deserialize, Serialize};

use crate::location::{Accuracy, Region};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
/// The platform services a session can be backed by
pub enum ServiceKind {
    StandardLocation,
    SignificantChange,
    Heading,
    RegionMonitoring,
}

impl ServiceKind {
    pub const ALL_KINDS: [Self; 4] = [
        ServiceKind::StandardLocation,
        ServiceKind::SignificantChange,
        ServiceKind::Heading,
        ServiceKind::RegionMonitoring,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// What a session asks the platform manager to do, fixed once the session starts
pub enum ServiceRequest {
    /// Continuous location updates at the given accuracy
    StandardLocation(Accuracy),
    /// Coarse, low-power location updates
    SignificantChange,
    /// Compass heading updates
    Heading,
    /// Entry/exit notifications for a region, the region may be unknown
    RegionBoundary(Accuracy, Option<Region>),
}

impl ServiceRequest {
    pub fn kind(&self) -> ServiceKind {
        match self {
            ServiceRequest::StandardLocation(_) => ServiceKind::StandardLocation,
            ServiceRequest::SignificantChange => ServiceKind::SignificantChange,
            ServiceRequest::Heading => ServiceKind::Heading,
            ServiceRequest::RegionBoundary(_, _) => ServiceKind::RegionMonitoring,
        }
    }

    /// The accuracy hint the manager should be configured with, if the service takes one
    pub fn accuracy(&self) -> Option<Accuracy> {
        match self {
            ServiceRequest::StandardLocation(accuracy)
            | ServiceRequest::RegionBoundary(accuracy, _) => Some(*accuracy),
            _ => None,
        }
    }

    pub fn region(&self) -> Option<&Region> {
        if let ServiceRequest::RegionBoundary(_, region) = self {
            region.as_ref()
        } else {
            None
        }
    }
}
