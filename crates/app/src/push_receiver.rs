//! Push receiver: controller-initiated notifications.
//!
//! Every entry point authenticates first, stamps the arrival time, and hands
//! the resulting [`PushSession`]s to a per-device queue drained by a
//! [`PushWorker`]. Nothing here blocks or awaits, so the accepting HTTP
//! handler returns as soon as the request is queued.
//!
//! The supplied credentials select the devices the caller may address: a
//! request is authorized for a device when it carries that device's push
//! credentials.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use ipxbridge_domain::device::{Credentials, Device};
use ipxbridge_domain::error::{AuthError, BridgeError, NotFoundError};
use ipxbridge_domain::id::{ChannelKey, DeviceId, EntityId};
use ipxbridge_domain::time;
use ipxbridge_domain::update::{PushSession, parse_lenient_state};

use crate::poll_coordinator::{RefreshHandle, RefreshScope};
use crate::ports::ChangePublisher;
use crate::reconciler::ReconciliationEngine;
use crate::state_store::StateStore;

struct PushRoute {
    credentials: Credentials,
    sessions: mpsc::UnboundedSender<PushSession>,
    refresh: RefreshHandle,
}

pub struct PushReceiver {
    store: Arc<StateStore>,
    routes: HashMap<DeviceId, PushRoute>,
}

impl PushReceiver {
    #[must_use]
    pub fn new(store: Arc<StateStore>) -> Self {
        Self {
            store,
            routes: HashMap::new(),
        }
    }

    /// Accept pushes for `device`.
    ///
    /// Returns the receiving end of the device's session queue, or `None`
    /// when the device has no push password configured.
    pub fn register(
        &mut self,
        device: &Device,
        refresh: RefreshHandle,
    ) -> Option<mpsc::UnboundedReceiver<PushSession>> {
        let credentials = device.push_credentials.clone()?;
        let (sessions, receiver) = mpsc::unbounded_channel();
        self.routes.insert(
            device.id.clone(),
            PushRoute {
                credentials,
                sessions,
                refresh,
            },
        );
        Some(receiver)
    }

    /// Whether any device accepts pushes.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.routes.is_empty()
    }

    /// Check credentials without acting on them.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the credentials are missing or match no
    /// device.
    pub fn authenticate(&self, credentials: Option<&Credentials>) -> Result<(), AuthError> {
        self.authorized_devices(credentials).map(|_| ())
    }

    fn authorized_devices(
        &self,
        credentials: Option<&Credentials>,
    ) -> Result<Vec<&DeviceId>, AuthError> {
        let credentials = credentials.ok_or(AuthError::MissingCredentials)?;
        let authorized: Vec<&DeviceId> = self
            .routes
            .iter()
            .filter(|(_, route)| route.credentials == *credentials)
            .map(|(id, _)| id)
            .collect();
        if authorized.is_empty() {
            tracing::warn!(username = %credentials.username, "rejected push with invalid credentials");
            return Err(AuthError::InvalidCredentials);
        }
        Ok(authorized)
    }

    fn resolve(&self, entity_id: &EntityId) -> Option<&ChannelKey> {
        self.store.resolve(entity_id)
    }

    fn enqueue(&self, key: &ChannelKey, on: bool, received_at: time::Timestamp) {
        let Some(route) = self.routes.get(&key.device) else {
            return;
        };
        let session = PushSession {
            target: key.clone(),
            on,
            received_at,
        };
        if route.sessions.send(session).is_err() {
            tracing::warn!(channel = %key, "push worker stopped, notification dropped");
        }
    }

    /// Set one channel to `on`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Auth`] when the credentials are missing or do
    /// not belong to the channel's device, and [`BridgeError::NotFound`]
    /// when no channel has this entity id.
    pub fn set_channel(
        &self,
        credentials: Option<&Credentials>,
        entity_id: &EntityId,
        on: bool,
    ) -> Result<(), BridgeError> {
        let received_at = time::now();
        let authorized = self.authorized_devices(credentials)?;
        let key = self.resolve(entity_id).ok_or_else(|| NotFoundError {
            entity: "Entity",
            id: entity_id.to_string(),
        })?;
        if !authorized.contains(&&key.device) {
            return Err(AuthError::InvalidCredentials.into());
        }
        tracing::debug!(%entity_id, on, "push received");
        self.enqueue(key, on, received_at);
        Ok(())
    }

    /// Set several channels from an `entity=value&entity=value` payload.
    ///
    /// Unknown entities are skipped. Returns how many notifications were
    /// queued.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Auth`] when the credentials are missing, or do
    /// not cover the device of one of the addressed channels; nothing is
    /// queued in that case.
    pub fn set_channels(
        &self,
        credentials: Option<&Credentials>,
        payload: &str,
    ) -> Result<usize, BridgeError> {
        let received_at = time::now();
        let authorized = self.authorized_devices(credentials)?;

        let mut accepted = Vec::new();
        for (entity_id, on) in parse_batch(payload) {
            let Some(key) = self.resolve(&entity_id) else {
                tracing::warn!(%entity_id, "push for unknown entity skipped");
                continue;
            };
            if !authorized.contains(&&key.device) {
                return Err(AuthError::InvalidCredentials.into());
            }
            accepted.push((key, on));
        }

        for (key, on) in &accepted {
            self.enqueue(key, *on, received_at);
        }
        tracing::debug!(count = accepted.len(), "batch push received");
        Ok(accepted.len())
    }

    /// Ask every device covered by `credentials` for an immediate full poll.
    ///
    /// Returns how many devices were asked.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the credentials are missing or match no
    /// device.
    pub fn refresh_all(&self, credentials: Option<&Credentials>) -> Result<usize, AuthError> {
        let authorized = self.authorized_devices(credentials)?;
        let mut requested = 0;
        for device in authorized {
            if let Some(route) = self.routes.get(device)
                && route.refresh.request(RefreshScope::All)
            {
                requested += 1;
            }
        }
        tracing::debug!(devices = requested, "refresh requested by push");
        Ok(requested)
    }
}

/// Split an `entity=value&entity=value` payload. Malformed pairs are dropped.
#[must_use]
pub fn parse_batch(payload: &str) -> Vec<(EntityId, bool)> {
    payload
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let Some((entity_id, value)) = pair.split_once('=') else {
                tracing::warn!(pair, "malformed push pair skipped");
                return None;
            };
            Some((EntityId::new(entity_id), parse_lenient_state(value)))
        })
        .collect()
}

/// Drains one device's push queue into the reconciliation engine.
pub struct PushWorker<P> {
    device: DeviceId,
    engine: Arc<ReconciliationEngine<P>>,
    sessions: mpsc::UnboundedReceiver<PushSession>,
}

impl<P: ChangePublisher + Send + Sync + 'static> PushWorker<P> {
    #[must_use]
    pub fn new(
        device: DeviceId,
        engine: Arc<ReconciliationEngine<P>>,
        sessions: mpsc::UnboundedReceiver<PushSession>,
    ) -> Self {
        Self {
            device,
            engine,
            sessions,
        }
    }

    #[tracing::instrument(name = "push", skip(self), fields(device = %self.device))]
    pub async fn run(mut self) {
        while let Some(session) = self.sessions.recv().await {
            if let Err(err) = self.engine.apply(&session.into_update()) {
                tracing::warn!(error = %err, "push for unconfigured channel");
            }
        }
    }
}
