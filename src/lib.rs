//! # Location Relay
//!
//! Background location filtering and delivery core for mobile tracking apps.
//!
//! This library provides:
//! - Distance-threshold filtering of raw position fixes
//! - A permission-gated tracking lifecycle shared by Android and iOS hosts
//! - Authenticated delivery of accepted fixes to a remote gateway
//! - An ordered, fire-and-forget event channel toward the host application
//!
//! The host platform supplies the OS-facing pieces (location provider,
//! permission dialogs, preferences store) through the traits in
//! [`platform`]; the core stays identical on every platform.
//!
//! ## Quick Start
//!
//! ```rust
//! use location_relay::{PositionFilter, PositionFix};
//!
//! let mut filter = PositionFilter::new(10.0);
//!
//! // The first fix is always reported
//! assert!(filter.accept(PositionFix::new(47.918, 106.917)));
//!
//! // A fix a couple of meters away is suppressed
//! assert!(!filter.accept(PositionFix::new(47.91801, 106.91701)));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{TrackerError, TrackerResult};

// Geographic utilities (distance and threshold helpers)
pub mod geo_utils;

// Platform ports implemented by the host (location, permissions, storage)
pub mod platform;
pub use platform::{InMemoryStore, KeyValueStore, PermissionGateway, PositionSource};

// Distance-threshold position filtering
pub mod filter;
pub use filter::PositionFilter;

// Opaque credential triple with write-through persistence
pub mod credentials;
pub use credentials::{CredentialKind, CredentialStore, Credentials};

// Gateway delivery and outcome classification
pub mod delivery;
pub use delivery::{
    DeliveryClient, DeliveryOutcome, HttpTransport, Transport, DEFAULT_GATEWAY_URL,
    HEADER_SECONDARY_TOKEN, HEADER_SERVER_ID, HEADER_SESSION_TOKEN,
};

// Host event channel
pub mod notifier;
pub use notifier::{EventNotifier, TrackerEvent};

// Tracking lifecycle state machine and delivery pipeline
pub mod lifecycle;
pub use lifecycle::{LocationTracker, PermissionUpdate, TrackerCommand, TrackingState};

/// Initialize logging for Android
#[cfg(target_os = "android")]
pub fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("LocationRelayRust"),
    );
}

/// Initialize logging for iOS (unified logging)
#[cfg(target_os = "ios")]
pub fn init_logging() {
    use log::LevelFilter;

    let _ = oslog::OsLogger::new("location-relay")
        .level_filter(LevelFilter::Debug)
        .init();
}

#[cfg(not(any(target_os = "android", target_os = "ios")))]
pub fn init_logging() {
    // No-op on desktop platforms; the host process installs its own logger
}

// ============================================================================
// Core Types
// ============================================================================

/// A device position with latitude and longitude, captured at report time.
///
/// # Example
/// ```
/// use location_relay::PositionFix;
/// let fix = PositionFix::new(47.918, 106.917); // Ulaanbaatar
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
}

impl PositionFix {
    /// Create a new position fix.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the fix has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Runtime configuration for the tracker.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Minimum movement in meters between consecutive reported fixes.
    /// Caller variants in production range from 1.0 (coarse periodic
    /// workers) to 10.0 (interactive tracking). Default: 10.0
    pub distance_threshold_m: f64,

    /// Gateway endpoint receiving position reports.
    /// Default: [`DEFAULT_GATEWAY_URL`]
    pub gateway_url: String,

    /// Bound on each delivery attempt, applied to the HTTP client.
    /// Default: 30 seconds
    pub request_timeout: Duration,

    /// Extra delivery attempts after a transient failure. The next periodic
    /// fix is the natural retry, so this defaults to 0.
    pub max_delivery_retries: u32,

    /// Delay before the first retry, doubled per attempt.
    /// Default: 500 ms
    pub retry_backoff: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            distance_threshold_m: 10.0,
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            max_delivery_retries: 0,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
