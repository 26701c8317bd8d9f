use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Convenience alias for UTC DT
pub type UtcDT = DateTime<Utc>;

/// A "part" of a location
pub type LocationComponent = f64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
/// A point on the globe, in degrees
pub struct Coordinate {
    /// Latitude
    pub lat: LocationComponent,
    /// Longitude
    pub long: LocationComponent,
}

impl Coordinate {
    pub const fn new(lat: LocationComponent, long: LocationComponent) -> Self {
        Self { lat, long }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// A position fix as reported by the platform location service
pub struct Location {
    pub coordinate: Coordinate,
    /// Meters above sea level
    #[serde(default)]
    pub altitude: LocationComponent,
    /// Radius of uncertainty for `coordinate` in meters, negative when the fix is invalid
    #[serde(default)]
    pub horizontal_accuracy: LocationComponent,
    /// Uncertainty of `altitude` in meters, negative when altitude is unknown
    #[serde(default = "unknown_accuracy")]
    pub vertical_accuracy: LocationComponent,
    /// Direction of travel in degrees from true north, if moving
    #[serde(default)]
    pub course: Option<LocationComponent>,
    /// Meters per second, if known
    #[serde(default)]
    pub speed: Option<LocationComponent>,
    pub timestamp: UtcDT,
}

fn unknown_accuracy() -> LocationComponent {
    -1.0
}

impl Location {
    /// A fix with only a coordinate and a timestamp known
    pub fn at(coordinate: Coordinate, timestamp: UtcDT) -> Self {
        Self {
            coordinate,
            altitude: 0.0,
            horizontal_accuracy: 0.0,
            vertical_accuracy: unknown_accuracy(),
            course: None,
            speed: None,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Device orientation, reported separately from location
pub struct Heading {
    /// Degrees relative to magnetic north
    pub magnetic_heading: LocationComponent,
    /// Degrees relative to true north, unavailable without a location fix
    #[serde(default)]
    pub true_heading: Option<LocationComponent>,
    /// Maximum deviation in degrees, negative when the heading is invalid
    #[serde(default)]
    pub heading_accuracy: LocationComponent,
    pub timestamp: UtcDT,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// A circular geographic boundary the platform can monitor for crossings
pub struct Region {
    pub identifier: String,
    pub center: Coordinate,
    /// Meters
    pub radius: LocationComponent,
}

impl Region {
    pub fn new(
        identifier: impl Into<String>,
        center: Coordinate,
        radius: LocationComponent,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            center,
            radius,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
/// Desired precision hint handed to the platform, the platform decides what it means
pub enum Accuracy {
    /// Highest precision, with extra sensor fusion for navigation apps
    BestForNavigation,
    /// Highest precision available
    #[default]
    Best,
    NearestTenMeters,
    HundredMeters,
    Kilometer,
    ThreeKilometers,
    /// Arbitrary hint in meters
    Meters(LocationComponent),
}

impl Accuracy {
    /// The hint expressed in meters, the two "best" levels use the platform's negative sentinels
    pub fn as_meters(&self) -> LocationComponent {
        match self {
            Accuracy::BestForNavigation => -2.0,
            Accuracy::Best => -1.0,
            Accuracy::NearestTenMeters => 10.0,
            Accuracy::HundredMeters => 100.0,
            Accuracy::Kilometer => 1000.0,
            Accuracy::ThreeKilometers => 3000.0,
            Accuracy::Meters(m) => *m,
        }
    }
}

impl From<LocationComponent> for Accuracy {
    fn from(meters: LocationComponent) -> Self {
        Self::Meters(meters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_levels() {
        assert_eq!(Accuracy::NearestTenMeters.as_meters(), 10.0);
        assert!(Accuracy::BestForNavigation.as_meters() < Accuracy::Best.as_meters());
        assert_eq!(Accuracy::from(42.5).as_meters(), 42.5);
    }

    #[test]
    fn test_location_at_defaults() {
        let loc = Location::at(Coordinate::new(1.5, -2.0), Utc::now());
        assert_eq!(loc.coordinate, Coordinate::new(1.5, -2.0));
        assert_eq!(loc.vertical_accuracy, -1.0);
        assert_eq!(loc.speed, None);
    }
}
