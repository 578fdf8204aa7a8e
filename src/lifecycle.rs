//! Tracking lifecycle: the permission-gated state machine that owns the
//! observe -> filter -> deliver pipeline.
//!
//! This module provides:
//! - Start/stop commands with idempotent transitions
//! - The foreground -> background permission escalation flow
//! - A pump task draining the position source through the filter
//! - Fire-and-forget delivery dispatch that never blocks fix production
//! - Session generations so outcomes of stopped sessions are discarded

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::credentials::{CredentialKind, CredentialStore};
use crate::delivery::{DeliveryClient, DeliveryOutcome, Transport};
use crate::error::TrackerResult;
use crate::filter::PositionFilter;
use crate::notifier::EventNotifier;
use crate::platform::{PermissionGateway, PositionSource};
use crate::{PositionFix, TrackerConfig};

/// Where the tracker is in its permission-gated lifecycle.
///
/// Owned exclusively by [`LocationTracker`]; only permission results and
/// explicit start/stop commands move it. `Active` is the only state in which
/// raw fixes reach the filter. `Stopped` is not terminal; restart re-enters
/// the permission check because permissions may have been revoked meanwhile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackingState {
    Uninitialized,
    AwaitingForegroundPermission,
    AwaitingBackgroundPermission,
    Active,
    Stopped,
}

/// Permission prompt results fed back by the host UI.
///
/// Platforms that do not distinguish foreground from background access feed
/// `BackgroundGranted` immediately after `ForegroundGranted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionUpdate {
    ForegroundGranted,
    ForegroundDenied,
    BackgroundGranted,
    BackgroundDenied,
}

/// Commands the host application sends over the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackerCommand {
    StartTracking,
    StopTracking,
    SetCredential { kind: CredentialKind, value: String },
    RequestOnDemandFix,
}

struct Inner {
    state: TrackingState,
    pump: Option<JoinHandle<()>>,
}

/// Everything a spawned delivery task needs, cloned per accepted fix.
#[derive(Clone)]
struct DeliveryContext {
    delivery: Arc<DeliveryClient>,
    credentials: Arc<CredentialStore>,
    notifier: EventNotifier,
    session: Arc<AtomicU64>,
    generation: u64,
    max_retries: u32,
    retry_backoff: Duration,
}

impl DeliveryContext {
    /// Whether this task still belongs to the live tracking session.
    fn is_current(&self) -> bool {
        self.session.load(Ordering::SeqCst) == self.generation
    }

    /// Deliver one fix, escalating auth failures and honoring the configured
    /// retry budget for transient failures. Outcomes from a stopped session
    /// are discarded.
    async fn deliver_with_escalation(&self, fix: PositionFix) {
        let mut attempt: u32 = 0;
        loop {
            let credentials = self.credentials.snapshot();
            let outcome = match self.delivery.deliver(&fix, &credentials).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Missing tokens: skip this report, tracking continues.
                    warn!("[Delivery] {}", e);
                    return;
                }
            };

            match outcome {
                DeliveryOutcome::Success => return,
                DeliveryOutcome::AuthFailure(status) => {
                    if self.is_current() {
                        escalate_auth_failure(&self.credentials, &self.notifier, status);
                    } else {
                        debug!("[Delivery] Discarding auth failure from a stopped session");
                    }
                    return;
                }
                DeliveryOutcome::TransientFailure(_) => {
                    if attempt >= self.max_retries {
                        return;
                    }
                    attempt += 1;
                    let backoff = self.retry_backoff * (1u32 << (attempt - 1).min(4));
                    debug!(
                        "[Delivery] Retry {} of {} after {:?}",
                        attempt, self.max_retries, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    if !self.is_current() {
                        debug!("[Delivery] Tracking stopped; abandoning retry");
                        return;
                    }
                }
            }
        }
    }
}

fn escalate_auth_failure(credentials: &CredentialStore, notifier: &EventNotifier, status: u16) {
    warn!(
        "[Tracker] Gateway rejected credentials (HTTP {}); clearing tokens and navigating to login",
        status
    );
    credentials.clear();
    notifier.auth_expired();
}

/// Drain the update stream through the filter, handing accepted fixes to the
/// notifier and to spawned delivery tasks.
async fn run_pump(
    mut updates: mpsc::Receiver<PositionFix>,
    filter: Arc<StdMutex<PositionFilter>>,
    context: DeliveryContext,
) {
    while let Some(fix) = updates.recv().await {
        if !fix.is_valid() {
            warn!(
                "[Tracker] Dropping invalid fix ({}, {})",
                fix.latitude, fix.longitude
            );
            continue;
        }

        let accepted = filter.lock().map(|mut f| f.accept(fix)).unwrap_or(false);
        if !accepted {
            continue;
        }

        context.notifier.location_updated(fix);

        // Deliveries run on their own tasks so a slow gateway never blocks
        // fix intake. In-flight deliveries are unordered relative to each
        // other; each carries its own coordinates.
        let task = context.clone();
        tokio::spawn(async move {
            task.deliver_with_escalation(fix).await;
        });
    }
    debug!("[Tracker] Update stream closed; pump exiting");
}

/// Coordinates permissions, position observation, filtering and delivery.
///
/// Constructed with its collaborators injected: the platform ports, the
/// credential store and the notifier handle. All methods take `&self`; the
/// tracker is shared behind an `Arc` by the bridge layer.
pub struct LocationTracker {
    config: TrackerConfig,
    inner: Mutex<Inner>,
    filter: Arc<StdMutex<PositionFilter>>,
    credentials: Arc<CredentialStore>,
    delivery: Arc<DeliveryClient>,
    notifier: EventNotifier,
    source: Arc<dyn PositionSource>,
    permissions: Arc<dyn PermissionGateway>,
    session: Arc<AtomicU64>,
}

impl LocationTracker {
    /// Create a tracker delivering over the real HTTP transport.
    pub fn new(
        config: TrackerConfig,
        source: Arc<dyn PositionSource>,
        permissions: Arc<dyn PermissionGateway>,
        credentials: Arc<CredentialStore>,
        notifier: EventNotifier,
    ) -> TrackerResult<Self> {
        let delivery = Arc::new(DeliveryClient::new(&config)?);
        Ok(Self::assemble(
            config,
            delivery,
            source,
            permissions,
            credentials,
            notifier,
        ))
    }

    /// Create a tracker over any transport (tests inject a mock here).
    pub fn with_transport(
        config: TrackerConfig,
        transport: Arc<dyn Transport>,
        source: Arc<dyn PositionSource>,
        permissions: Arc<dyn PermissionGateway>,
        credentials: Arc<CredentialStore>,
        notifier: EventNotifier,
    ) -> Self {
        let delivery = Arc::new(DeliveryClient::with_transport(
            config.gateway_url.clone(),
            transport,
        ));
        Self::assemble(config, delivery, source, permissions, credentials, notifier)
    }

    fn assemble(
        config: TrackerConfig,
        delivery: Arc<DeliveryClient>,
        source: Arc<dyn PositionSource>,
        permissions: Arc<dyn PermissionGateway>,
        credentials: Arc<CredentialStore>,
        notifier: EventNotifier,
    ) -> Self {
        let filter = Arc::new(StdMutex::new(PositionFilter::new(
            config.distance_threshold_m,
        )));
        Self {
            config,
            inner: Mutex::new(Inner {
                state: TrackingState::Uninitialized,
                pump: None,
            }),
            filter,
            credentials,
            delivery,
            notifier,
            source,
            permissions,
            session: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> TrackingState {
        self.inner.lock().await.state
    }

    /// Dispatch one bridge command.
    pub async fn handle_command(&self, command: TrackerCommand) -> TrackerResult<()> {
        match command {
            TrackerCommand::StartTracking => {
                self.start_tracking().await;
                Ok(())
            }
            TrackerCommand::StopTracking => {
                self.stop_tracking().await;
                Ok(())
            }
            TrackerCommand::SetCredential { kind, value } => {
                self.credentials.set(kind, &value);
                Ok(())
            }
            TrackerCommand::RequestOnDemandFix => self.request_on_demand_fix().await.map(|_| ()),
        }
    }

    /// Begin (or resume) tracking.
    ///
    /// From `Uninitialized` or `Stopped` this enters the permission flow;
    /// while a permission is pending it re-issues the pending prompt; while
    /// `Active` it is a no-op.
    pub async fn start_tracking(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            TrackingState::Uninitialized | TrackingState::Stopped => {
                info!("[Tracker] Start requested; checking foreground permission");
                inner.state = TrackingState::AwaitingForegroundPermission;
                self.permissions.request_foreground().await;
            }
            TrackingState::AwaitingForegroundPermission => {
                debug!("[Tracker] Start requested while foreground prompt pending; re-prompting");
                self.permissions.request_foreground().await;
            }
            TrackingState::AwaitingBackgroundPermission => {
                debug!("[Tracker] Start requested while background prompt pending; re-prompting");
                self.permissions.request_background().await;
            }
            TrackingState::Active => {
                debug!("[Tracker] Start requested but tracking is already active");
            }
        }
    }

    /// Stop tracking from any state.
    ///
    /// Cancels the OS subscription and the pump, and invalidates the session
    /// so in-flight deliveries complete without side effects and scheduled
    /// retries are abandoned.
    pub async fn stop_tracking(&self) {
        let mut inner = self.inner.lock().await;
        self.session.fetch_add(1, Ordering::SeqCst);
        if let Some(pump) = inner.pump.take() {
            pump.abort();
        }
        if inner.state == TrackingState::Active {
            self.source.stop_updates().await;
        }
        if inner.state != TrackingState::Stopped {
            info!("[Tracker] Tracking stopped");
        }
        inner.state = TrackingState::Stopped;
    }

    /// Apply a permission prompt result from the host UI.
    ///
    /// Grants advance the escalation (foreground, then background, then active);
    /// denials re-prompt or show the rationale and stay pending. Updates that
    /// do not apply to the current state are ignored.
    pub async fn handle_permission_update(&self, update: PermissionUpdate) {
        let mut inner = self.inner.lock().await;
        match (inner.state, update) {
            (TrackingState::AwaitingForegroundPermission, PermissionUpdate::ForegroundGranted) => {
                info!("[Tracker] Foreground permission granted; requesting background access");
                inner.state = TrackingState::AwaitingBackgroundPermission;
                self.permissions.request_background().await;
            }
            (TrackingState::AwaitingForegroundPermission, PermissionUpdate::ForegroundDenied) => {
                info!("[Tracker] Foreground permission denied; prompting again");
                self.permissions.request_foreground().await;
            }
            (TrackingState::AwaitingBackgroundPermission, PermissionUpdate::BackgroundGranted) => {
                self.activate(&mut inner).await;
            }
            (TrackingState::AwaitingBackgroundPermission, PermissionUpdate::BackgroundDenied) => {
                info!("[Tracker] Background permission denied; showing rationale");
                self.permissions.show_background_rationale().await;
            }
            (state, update) => {
                debug!(
                    "[Tracker] Ignoring permission update {:?} in state {:?}",
                    update, state
                );
            }
        }
    }

    async fn activate(&self, inner: &mut Inner) {
        match self.source.start_updates().await {
            Ok(updates) => {
                inner.state = TrackingState::Active;
                inner.pump = Some(self.spawn_pump(updates));
                info!("[Tracker] Tracking active");
            }
            Err(e) => {
                // Subscription refused means permissions were revoked out
                // from under us; fall back to the permission check.
                warn!(
                    "[Tracker] Could not start position updates: {}; re-checking permissions",
                    e
                );
                inner.state = TrackingState::AwaitingForegroundPermission;
                self.permissions.request_foreground().await;
            }
        }
    }

    fn spawn_pump(&self, updates: mpsc::Receiver<PositionFix>) -> JoinHandle<()> {
        let context = DeliveryContext {
            delivery: Arc::clone(&self.delivery),
            credentials: Arc::clone(&self.credentials),
            notifier: self.notifier.clone(),
            session: Arc::clone(&self.session),
            generation: self.session.load(Ordering::SeqCst),
            max_retries: self.config.max_delivery_retries,
            retry_backoff: self.config.retry_backoff,
        };
        tokio::spawn(run_pump(updates, Arc::clone(&self.filter), context))
    }

    /// Deliver the current fix immediately, bypassing the filter.
    ///
    /// Works in any state as long as the source knows a fix. Auth failures
    /// escalate exactly as pipeline deliveries do; the outcome is also
    /// returned to the caller.
    pub async fn request_on_demand_fix(&self) -> TrackerResult<DeliveryOutcome> {
        let fix = self.source.current_fix().await?;
        let credentials = self.credentials.snapshot();
        let outcome = self.delivery.deliver(&fix, &credentials).await?;
        if let DeliveryOutcome::AuthFailure(status) = outcome {
            escalate_auth_failure(&self.credentials, &self.notifier, status);
        }
        Ok(outcome)
    }

    /// Most recent fix known to the OS, independent of filtering.
    pub async fn last_known_fix(&self) -> TrackerResult<PositionFix> {
        self.source.current_fix().await
    }

    /// Most recent fix the filter accepted, if any.
    pub fn last_accepted_fix(&self) -> Option<PositionFix> {
        self.filter.lock().ok().and_then(|f| f.last_accepted())
    }
}
