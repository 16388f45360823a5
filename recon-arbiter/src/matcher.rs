//! Proximity test between an asset and a track

use recon_common::geo::haversine_meters;
use recon_common::{Entity, Position};

/// Great-circle range check against a fixed threshold in meters
#[derive(Debug, Clone, Copy)]
pub struct ProximityMatcher {
    threshold_meters: f64,
}

impl ProximityMatcher {
    pub fn new(threshold_meters: f64) -> Self {
        Self { threshold_meters }
    }

    pub fn threshold_meters(&self) -> f64 {
        self.threshold_meters
    }

    /// Distance in meters; altitude is ignored
    pub fn distance(&self, a: &Position, b: &Position) -> f64 {
        haversine_meters(a, b)
    }

    /// Inclusive: a pair exactly at the threshold is in range
    pub fn within_range(&self, asset: &Entity, track: &Entity) -> bool {
        self.distance(&asset.position, &track.position) <= self.threshold_meters
    }
}
