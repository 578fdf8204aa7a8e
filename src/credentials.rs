//! Opaque credential triple shared by the host's login flow and the delivery
//! client.
//!
//! The host supplies tokens at login and the gateway invalidates them with an
//! auth failure; both paths go through [`CredentialStore`], which persists
//! every change write-through so a relaunched process can resume delivering
//! without a fresh login. Values are opaque to this crate and never logged.

use std::sync::{Arc, RwLock};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::platform::KeyValueStore;

/// Persisted key for the session token.
pub const KEY_SESSION_TOKEN: &str = "xToken";
/// Persisted key for the server identifier.
pub const KEY_SERVER_ID: &str = "xServer";
/// Persisted key for the secondary token.
pub const KEY_SECONDARY_TOKEN: &str = "xMedsoftToken";

/// Which credential field a host command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CredentialKind {
    SessionToken,
    ServerId,
    SecondaryToken,
}

impl CredentialKind {
    /// Key under which this credential is persisted.
    pub fn storage_key(self) -> &'static str {
        match self {
            CredentialKind::SessionToken => KEY_SESSION_TOKEN,
            CredentialKind::ServerId => KEY_SERVER_ID,
            CredentialKind::SecondaryToken => KEY_SECONDARY_TOKEN,
        }
    }
}

/// The three opaque tokens required by the gateway.
///
/// Delivery is disabled until all three are present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub session_token: Option<String>,
    pub server_id: Option<String>,
    pub secondary_token: Option<String>,
}

impl Credentials {
    /// True when all three fields are set.
    pub fn is_complete(&self) -> bool {
        self.session_token.is_some() && self.server_id.is_some() && self.secondary_token.is_some()
    }

    /// The triple as string slices, if complete.
    pub fn triple(&self) -> Option<(&str, &str, &str)> {
        match (&self.session_token, &self.server_id, &self.secondary_token) {
            (Some(token), Some(server), Some(secondary)) => {
                Some((token.as_str(), server.as_str(), secondary.as_str()))
            }
            _ => None,
        }
    }

    fn field_mut(&mut self, kind: CredentialKind) -> &mut Option<String> {
        match kind {
            CredentialKind::SessionToken => &mut self.session_token,
            CredentialKind::ServerId => &mut self.server_id,
            CredentialKind::SecondaryToken => &mut self.secondary_token,
        }
    }
}

/// Write-through credential storage.
///
/// Hydrates from the backing [`KeyValueStore`] at construction, then stays
/// authoritative: every `set` and `clear` updates memory and the store under
/// the same lock, so readers never observe a half-updated triple.
pub struct CredentialStore {
    inner: RwLock<Credentials>,
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    /// Load any previously persisted credentials from the backing store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let credentials = Credentials {
            session_token: store.get(KEY_SESSION_TOKEN),
            server_id: store.get(KEY_SERVER_ID),
            secondary_token: store.get(KEY_SECONDARY_TOKEN),
        };
        if credentials.is_complete() {
            debug!("[Credentials] hydrated complete triple from storage");
        }
        Self {
            inner: RwLock::new(credentials),
            store,
        }
    }

    /// Store one credential field and persist it immediately.
    pub fn set(&self, kind: CredentialKind, value: &str) {
        if let Ok(mut credentials) = self.inner.write() {
            *credentials.field_mut(kind) = Some(value.to_string());
            self.store.put(kind.storage_key(), value);
            debug!("[Credentials] {} updated", kind.storage_key());
        }
    }

    /// Drop all three fields from memory and storage (logout or auth failure).
    pub fn clear(&self) {
        if let Ok(mut credentials) = self.inner.write() {
            *credentials = Credentials::default();
            self.store.remove(KEY_SESSION_TOKEN);
            self.store.remove(KEY_SERVER_ID);
            self.store.remove(KEY_SECONDARY_TOKEN);
            debug!("[Credentials] cleared");
        }
    }

    /// Consistent copy of the current triple.
    pub fn snapshot(&self) -> Credentials {
        self.inner
            .read()
            .map(|credentials| credentials.clone())
            .unwrap_or_default()
    }

    /// True when all three fields are set.
    pub fn is_complete(&self) -> bool {
        self.inner
            .read()
            .map(|credentials| credentials.is_complete())
            .unwrap_or(false)
    }
}
