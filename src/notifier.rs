//! Event channel toward the host application.
//!
//! The tracker is constructed with an [`EventNotifier`] handle and the host
//! drains the matching receiver on its side of the bridge. Sends are
//! fire-and-forget: the core never blocks on acknowledgment and never retries
//! notification delivery.

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::PositionFix;

/// Events the core pushes to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackerEvent {
    /// A fix passed the filter; hosts typically refresh their map UI.
    LocationUpdated(PositionFix),
    /// The gateway rejected the credentials; hosts navigate to login.
    #[serde(rename = "navigateToLogin")]
    AuthExpired,
}

/// Fire-and-forget sender half of the host event channel.
///
/// Events from a single producer reach the host in send order. A closed
/// receiver only costs a debug log line.
#[derive(Debug, Clone)]
pub struct EventNotifier {
    tx: mpsc::UnboundedSender<TrackerEvent>,
}

impl EventNotifier {
    /// Create the notifier and the receiver the host drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TrackerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Push one event toward the host.
    pub fn notify(&self, event: TrackerEvent) {
        if self.tx.send(event).is_err() {
            debug!("[Notifier] host channel closed; event dropped");
        }
    }

    /// Report an accepted fix.
    pub fn location_updated(&self, fix: PositionFix) {
        self.notify(TrackerEvent::LocationUpdated(fix));
    }

    /// Report that the host should re-authenticate.
    pub fn auth_expired(&self) {
        self.notify(TrackerEvent::AuthExpired);
    }
}
