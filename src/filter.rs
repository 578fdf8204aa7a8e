//! Movement gate between the position source and the delivery client.
//!
//! Keeps the most recently accepted fix and admits a new one only when the
//! device has moved at least the configured distance since then. Closely
//! spaced fixes from a stationary device are rejected, which is also the
//! pipeline's only throttle.

use log::debug;

use crate::geo_utils::haversine_distance;
use crate::PositionFix;

/// Distance-threshold filter with a single last-accepted slot.
#[derive(Debug, Clone)]
pub struct PositionFilter {
    threshold_m: f64,
    last_accepted: Option<PositionFix>,
}

impl PositionFilter {
    /// Create a filter with the given threshold in meters. The slot starts
    /// empty, so the first fix is always accepted.
    pub fn new(threshold_m: f64) -> Self {
        Self {
            threshold_m,
            last_accepted: None,
        }
    }

    /// Decide whether `candidate` should be reported.
    ///
    /// Accepts when the slot is empty or when the great-circle distance from
    /// the last accepted fix is at least the threshold; acceptance replaces
    /// the slot. Rejection has no side effects, so replaying a rejected fix
    /// keeps being rejected. A candidate at exactly the threshold distance is
    /// accepted; one with identical coordinates never is.
    pub fn accept(&mut self, candidate: PositionFix) -> bool {
        let accepted = match &self.last_accepted {
            None => true,
            Some(last) => {
                let moved = haversine_distance(last, &candidate);
                if moved < self.threshold_m {
                    debug!(
                        "[Filter] Device has not moved enough to send location ({:.1}m of {:.1}m)",
                        moved, self.threshold_m
                    );
                    false
                } else {
                    true
                }
            }
        };

        if accepted {
            self.last_accepted = Some(candidate);
        }
        accepted
    }

    /// The most recently accepted fix, if any.
    pub fn last_accepted(&self) -> Option<PositionFix> {
        self.last_accepted
    }

    /// Configured threshold in meters.
    pub fn threshold_m(&self) -> f64 {
        self.threshold_m
    }
}
