use std::fmt;

use serde::{Deserialize, Serialize};

use crate::location::{Heading, Location, Region};

/// Something the platform reported for a session, handed to the caller's callback
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum UpdateEvent {
    /// A new fix, along with the previous one if there was one
    LocationChanged(Location, Option<Location>),
    HeadingChanged(Heading),
    RegionEntered(Region),
    RegionExited(Region),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
/// Failure categories the platform location service reports
pub enum PlatformErrorKind {
    /// No fix could be determined right now, the service keeps trying
    LocationUnknown,
    /// The user or system denied access to location services
    Denied,
    Network,
    HeadingFailure,
    RegionMonitoringDenied,
    RegionMonitoringFailure,
    RegionMonitoringSetupDelayed,
    RegionMonitoringResponseDelayed,
    /// Any other platform error code
    Other(i64),
}

impl PlatformErrorKind {
    /// Whether the error means the service is gone entirely and the session can't continue
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlatformErrorKind::Denied)
    }
}

impl fmt::Display for PlatformErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocationUnknown => write!(f, "location unknown"),
            Self::Denied => write!(f, "access denied"),
            Self::Network => write!(f, "network error"),
            Self::HeadingFailure => write!(f, "heading failure"),
            Self::RegionMonitoringDenied => write!(f, "region monitoring denied"),
            Self::RegionMonitoringFailure => write!(f, "region monitoring failure"),
            Self::RegionMonitoringSetupDelayed => write!(f, "region monitoring setup delayed"),
            Self::RegionMonitoringResponseDelayed => {
                write!(f, "region monitoring response delayed")
            }
            Self::Other(code) => write!(f, "platform error {code}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// An error as reported by the platform location service
pub struct PlatformError {
    pub kind: PlatformErrorKind,
    #[serde(default)]
    pub message: String,
}

impl PlatformError {
    pub fn new(kind: PlatformErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for PlatformError {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// A platform error delivered to a session, for region sessions it carries the region involved
pub struct ServiceError {
    pub error: PlatformError,
    /// The region the error is about, `None` when the region is unknown or not applicable
    pub region: Option<Region>,
}

impl ServiceError {
    pub fn is_terminal(&self) -> bool {
        self.error.kind.is_terminal()
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{} (region {})", self.error, region.identifier),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Coordinate;

    #[test]
    fn test_only_denied_is_terminal() {
        assert!(PlatformErrorKind::Denied.is_terminal());
        assert!(!PlatformErrorKind::LocationUnknown.is_terminal());
        assert!(!PlatformErrorKind::RegionMonitoringDenied.is_terminal());
        assert!(!PlatformErrorKind::Other(7).is_terminal());
    }

    #[test]
    fn test_service_error_display() {
        let err = ServiceError {
            error: PlatformError::new(PlatformErrorKind::RegionMonitoringFailure, "too many"),
            region: Some(Region::new("home", Coordinate::new(0.0, 0.0), 50.0)),
        };
        assert_eq!(
            err.to_string(),
            "region monitoring failure: too many (region home)"
        );

        let err = ServiceError {
            error: PlatformError::new(PlatformErrorKind::Other(3), ""),
            region: None,
        };
        assert_eq!(err.to_string(), "platform error 3");
    }
}
