//! Platform ports implemented by the embedding host.
//!
//! The Android and iOS layers own the OS location APIs, the permission dialogs,
//! and the preferences store; the core only sees these traits. Implementations
//! live on the host side of the bridge and are injected at construction.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TrackerResult;
use crate::PositionFix;

/// Continuous position updates from the OS location provider.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Begin continuous observation. Fixes are pushed into the returned channel
    /// until [`stop_updates`](Self::stop_updates) is called or the receiver is
    /// dropped. Fails when the OS refuses the subscription (permission revoked).
    async fn start_updates(&self) -> TrackerResult<mpsc::Receiver<PositionFix>>;

    /// Cancel the underlying OS subscription.
    async fn stop_updates(&self);

    /// Most recent fix known to the OS, independent of the update stream.
    async fn current_fix(&self) -> TrackerResult<PositionFix>;
}

/// Permission prompts handled by the host UI.
///
/// Prompt results arrive asynchronously as
/// [`PermissionUpdate`](crate::PermissionUpdate) values fed to
/// [`LocationTracker::handle_permission_update`](crate::LocationTracker::handle_permission_update).
/// Implementations must not call back into the tracker from inside these
/// methods; they run while the tracker's state lock is held.
#[async_trait]
pub trait PermissionGateway: Send + Sync {
    /// Prompt for foreground ("while in use") location permission.
    async fn request_foreground(&self);

    /// Prompt for background ("always") location permission.
    async fn request_background(&self);

    /// Explain why background access is needed after the user denied it.
    async fn show_background_rationale(&self);
}

/// Host-side key-value persistence (SharedPreferences / UserDefaults style).
///
/// Implementations absorb their own I/O failures; the core treats the store as
/// infallible and write-through.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory store for tests and hosts without persistence.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}
