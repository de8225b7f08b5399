//! Geographic address equivalence.
//!
//! Legacy and remote systems spell the same address differently ("1 Main
//! St" vs "1 Main Street"), so addresses are compared by where they are
//! rather than by how they are written.

use crate::models::{Coordinates, PostalAddress};
use crate::remote::Geocoder;
use std::sync::Arc;
use tracing::instrument;

/// Mean Earth radius used by the haversine formula.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points, in kilometres.
#[must_use]
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1.0 for antipodal points.
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Returns true if any point in `left` is within `threshold_km` of any
/// point in `right`.
#[must_use]
pub fn any_within(left: &[Coordinates], right: &[Coordinates], threshold_km: f64) -> bool {
    left.iter()
        .any(|&a| right.iter().any(|&b| haversine_km(a, b) <= threshold_km))
}

/// Judges whether two postal addresses name the same place.
pub struct AddressEquivalence<G: Geocoder> {
    geocoder: Arc<G>,
    threshold_km: f64,
}

impl<G: Geocoder> AddressEquivalence<G> {
    /// Default distance under which two addresses are the same place.
    pub const DEFAULT_THRESHOLD_KM: f64 = 0.5;

    /// Creates an equivalence check using the default threshold.
    #[must_use]
    pub const fn new(geocoder: Arc<G>) -> Self {
        Self {
            geocoder,
            threshold_km: Self::DEFAULT_THRESHOLD_KM,
        }
    }

    /// Sets the distance threshold.
    #[must_use]
    pub const fn with_threshold_km(mut self, threshold_km: f64) -> Self {
        self.threshold_km = threshold_km;
        self
    }

    /// Returns the distance threshold.
    #[must_use]
    pub const fn threshold_km(&self) -> f64 {
        self.threshold_km
    }

    /// Returns true if `a` and `b` are the same place.
    ///
    /// Textually equal addresses (ignoring case) are equivalent without a
    /// lookup. Otherwise both are geocoded and compared by distance; an
    /// address the geocoder cannot place, or a geocoder failure, makes the
    /// pair not equivalent.
    #[instrument(skip_all)]
    pub fn addresses_equivalent(&self, a: &PostalAddress, b: &PostalAddress) -> bool {
        if a.same_fields(b) {
            return true;
        }

        let (Some(left), Some(right)) = (self.locate(a), self.locate(b)) else {
            return false;
        };
        any_within(&left, &right, self.threshold_km)
    }

    fn locate(&self, address: &PostalAddress) -> Option<Vec<Coordinates>> {
        match self.geocoder.geocode(address) {
            Ok(points) if points.is_empty() => {
                tracing::debug!(address = %address.single_line(), "Address could not be geocoded");
                None
            },
            Ok(points) => Some(points),
            Err(e) => {
                tracing::warn!(
                    address = %address.single_line(),
                    error = %e,
                    "Geocoding failed, treating address as unplaced"
                );
                metrics::counter!("peoplesync_geocode_failures_total").increment(1);
                None
            },
        }
    }
}
