//! Poll coordinator: one background loop per device.
//!
//! Each [`DevicePoller`] queries its controller on a fixed interval and on
//! demand, turning every response into a batch of poll-sourced updates that
//! share one `observed_at`. Transient failures keep the last known state and
//! feed the health tracker; a credential rejection suspends the loop for the
//! rest of the process lifetime.

use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use ipxbridge_domain::device::Device;
use ipxbridge_domain::error::BridgeError;
use ipxbridge_domain::health::{DEGRADED_AFTER_FAILURES, DeviceHealth, HealthTracker};
use ipxbridge_domain::id::{ChannelKey, DeviceId};
use ipxbridge_domain::time::{self, Timestamp};
use ipxbridge_domain::update::StateUpdate;

use crate::ports::{ChangePublisher, DeviceClient, Readings};
use crate::reconciler::ReconciliationEngine;

/// Quiet period during which on-demand refresh requests are coalesced.
pub const REFRESH_COOLDOWN: Duration = Duration::from_millis(500);

/// Which channels an on-demand cycle applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshScope {
    All,
    /// Query everything, apply only these channels.
    Channels(BTreeSet<ChannelKey>),
}

impl RefreshScope {
    #[must_use]
    pub fn channel(key: ChannelKey) -> Self {
        Self::Channels(BTreeSet::from([key]))
    }

    /// Union of two scopes; `All` absorbs everything.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Channels(mut a), Self::Channels(b)) => {
                a.extend(b);
                Self::Channels(a)
            }
            _ => Self::All,
        }
    }

    #[must_use]
    pub fn includes(&self, key: &ChannelKey) -> bool {
        match self {
            Self::All => true,
            Self::Channels(keys) => keys.contains(key),
        }
    }
}

/// Sender side of a poller's on-demand request queue.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    device: DeviceId,
    sender: mpsc::UnboundedSender<RefreshScope>,
}

impl RefreshHandle {
    #[must_use]
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// Queue an on-demand cycle. Never blocks.
    ///
    /// Returns `false` when the poller is gone.
    pub fn request(&self, scope: RefreshScope) -> bool {
        if self.sender.send(scope).is_err() {
            tracing::warn!(device = %self.device, "poller stopped, refresh request dropped");
            return false;
        }
        true
    }
}

/// Background poll loop of one device.
pub struct DevicePoller<C, P> {
    device: Arc<Device>,
    client: Arc<C>,
    engine: Arc<ReconciliationEngine<P>>,
    requests: mpsc::UnboundedReceiver<RefreshScope>,
    health: watch::Sender<DeviceHealth>,
    tracker: HealthTracker,
    cooldown: Duration,
}

impl<C, P> DevicePoller<C, P>
where
    C: DeviceClient + Send + Sync + 'static,
    P: ChangePublisher + Send + Sync + 'static,
{
    /// Create a poller together with its refresh handle and health feed.
    #[must_use]
    pub fn new(
        device: Arc<Device>,
        client: Arc<C>,
        engine: Arc<ReconciliationEngine<P>>,
    ) -> (Self, RefreshHandle, watch::Receiver<DeviceHealth>) {
        let (sender, requests) = mpsc::unbounded_channel();
        let (health, health_rx) = watch::channel(DeviceHealth::Healthy);
        let handle = RefreshHandle {
            device: device.id.clone(),
            sender,
        };
        let poller = Self {
            device,
            client,
            engine,
            requests,
            health,
            tracker: HealthTracker::default(),
            cooldown: REFRESH_COOLDOWN,
        };
        (poller, handle, health_rx)
    }

    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Run until every [`RefreshHandle`] is dropped, the controller rejects
    /// the credentials, or the task is aborted.
    ///
    /// Only cycles that apply every channel postpone the next periodic poll;
    /// per-entity refreshes leave the schedule untouched.
    #[tracing::instrument(name = "poller", skip(self), fields(device = %self.device.id))]
    pub async fn run(mut self) {
        match self.client.ping(&self.device).await {
            Ok(()) => tracing::info!(host = %self.device.host, "controller reachable"),
            Err(err) => tracing::warn!(host = %self.device.host, error = %err, "controller did not answer ping"),
        }

        let mut ticker = tokio::time::interval(self.device.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let scope = tokio::select! {
                _ = ticker.tick() => RefreshScope::All,
                request = self.requests.recv() => match request {
                    Some(first) => {
                        let scope = self.coalesce(first).await;
                        if scope == RefreshScope::All {
                            ticker.reset();
                        }
                        scope
                    }
                    None => {
                        tracing::debug!("every refresh handle dropped, poller stopped");
                        return;
                    }
                },
            };
            if self.poll(&scope).await.is_break() {
                break;
            }
        }

        while self.requests.recv().await.is_some() {
            tracing::warn!("polling suspended, ignoring refresh request");
        }
    }

    async fn coalesce(&mut self, first: RefreshScope) -> RefreshScope {
        let mut scope = first;
        let cooldown = tokio::time::sleep(self.cooldown);
        tokio::pin!(cooldown);
        loop {
            tokio::select! {
                () = &mut cooldown => break,
                next = self.requests.recv() => match next {
                    Some(next) => scope = scope.merge(next),
                    None => break,
                },
            }
        }
        scope
    }

    async fn poll(&mut self, scope: &RefreshScope) -> ControlFlow<()> {
        match self.client.query_all(&self.device).await {
            Ok(readings) => {
                let updates = self.updates_from(&readings, scope, time::now());
                let summary = self.engine.apply_batch(&updates);
                tracing::debug!(
                    changed = summary.changed,
                    stale = summary.stale,
                    "poll cycle complete"
                );
                if self.tracker.consecutive_failures() >= DEGRADED_AFTER_FAILURES {
                    tracing::info!("controller recovered");
                }
                let health = self.tracker.record_success();
                self.publish_health(health);
                ControlFlow::Continue(())
            }
            Err(BridgeError::Auth(err)) => {
                tracing::error!(error = %err, "controller rejected credentials, polling suspended");
                let health = self.tracker.record_auth_failure(err.to_string());
                self.publish_health(health);
                ControlFlow::Break(())
            }
            Err(err) => {
                let health = self.tracker.record_failure();
                let failures = self.tracker.consecutive_failures();
                tracing::warn!(
                    error = %err,
                    consecutive_failures = failures,
                    "poll cycle failed, keeping last known state"
                );
                if failures == DEGRADED_AFTER_FAILURES {
                    tracing::warn!("controller degraded");
                }
                self.publish_health(health);
                ControlFlow::Continue(())
            }
        }
    }

    fn updates_from(
        &self,
        readings: &Readings,
        scope: &RefreshScope,
        observed_at: Timestamp,
    ) -> Vec<StateUpdate> {
        self.device
            .channels
            .iter()
            .filter(|channel| scope.includes(&channel.key))
            .filter_map(|channel| {
                let Some(&on) = readings.get(&(channel.key.kind, channel.key.local_id)) else {
                    tracing::debug!(entity_id = %channel.entity_id, "channel missing from response");
                    return None;
                };
                Some(StateUpdate::poll(channel.key.clone(), on, observed_at))
            })
            .collect()
    }

    fn publish_health(&self, health: DeviceHealth) {
        self.health.send_if_modified(|current| {
            if *current == health {
                false
            } else {
                *current = health;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_store::StateStore;
    use crate::testing::{RecordingPublisher, StubClient, device, output, readings, relay};
    use ipxbridge_domain::channel::ChannelKind;
    use ipxbridge_domain::error::{AuthError, CommunicationError};

    struct Harness {
        client: Arc<StubClient>,
        publisher: Arc<RecordingPublisher>,
        engine: Arc<ReconciliationEngine<Arc<RecordingPublisher>>>,
    }

    impl Harness {
        fn new(devices: &[Device]) -> Self {
            let mut builder = StateStore::builder();
            for device in devices {
                builder.register(device).unwrap();
            }
            let publisher = Arc::new(RecordingPublisher::default());
            Self {
                client: Arc::new(StubClient::default()),
                engine: Arc::new(ReconciliationEngine::new(
                    Arc::new(builder.build()),
                    Arc::clone(&publisher),
                )),
                publisher,
            }
        }

        fn spawn(&self, device: Device) -> (RefreshHandle, watch::Receiver<DeviceHealth>) {
            let (poller, handle, health) = DevicePoller::new(
                Arc::new(device),
                Arc::clone(&self.client),
                Arc::clone(&self.engine),
            );
            tokio::spawn(poller.run());
            (handle, health)
        }

        fn is_on(&self, key: &ChannelKey) -> bool {
            self.engine.store().state(key).unwrap().on
        }
    }

    fn pumps() -> Device {
        device("device1", vec![relay("Pump", 7), relay("Fan", 8)])
    }

    fn comm_error() -> BridgeError {
        CommunicationError::Timeout { after_secs: 5 }.into()
    }

    async fn advance(duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    #[test]
    fn should_merge_scopes() {
        let a = RefreshScope::channel(output("d", 1));
        let b = RefreshScope::channel(output("d", 2));
        let merged = a.clone().merge(b);
        assert!(merged.includes(&output("d", 1)));
        assert!(merged.includes(&output("d", 2)));
        assert!(!merged.includes(&output("d", 3)));
        assert_eq!(a.merge(RefreshScope::All), RefreshScope::All);
    }

    #[tokio::test(start_paused = true)]
    async fn should_apply_initial_poll() {
        let harness = Harness::new(&[pumps()]);
        harness
            .client
            .steady("device1", readings(&[(ChannelKind::Output, 7, true)]));

        let (_handle, health) = harness.spawn(pumps());
        advance(Duration::from_millis(10)).await;

        assert!(harness.is_on(&output("device1", 7)));
        assert!(!harness.is_on(&output("device1", 8)));
        assert!(health.borrow().is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn should_degrade_after_three_failures_and_recover() {
        let harness = Harness::new(&[pumps()]);
        harness
            .client
            .script("device1", Ok(readings(&[(ChannelKind::Output, 7, true)])));
        for _ in 0..3 {
            harness.client.script("device1", Err(comm_error()));
        }
        harness
            .client
            .steady("device1", readings(&[(ChannelKind::Output, 7, true)]));

        let (_handle, health) = harness.spawn(pumps());
        advance(Duration::from_millis(10)).await;
        assert_eq!(harness.publisher.changes().len(), 1);

        advance(Duration::from_secs(20)).await;
        assert!(health.borrow().is_healthy());

        advance(Duration::from_secs(10)).await;
        assert_eq!(
            *health.borrow(),
            DeviceHealth::Degraded {
                consecutive_failures: 3
            }
        );
        assert!(harness.is_on(&output("device1", 7)));
        assert_eq!(harness.publisher.changes().len(), 1);
        assert_eq!(harness.engine.store().state(&output("device1", 7)).unwrap().revision, 1);

        advance(Duration::from_secs(10)).await;
        assert!(health.borrow().is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn should_suspend_polling_on_auth_error() {
        let harness = Harness::new(&[pumps()]);
        harness.client.script(
            "device1",
            Err(AuthError::DeviceRejected { status: 401 }.into()),
        );

        let (handle, health) = harness.spawn(pumps());
        advance(Duration::from_millis(10)).await;
        assert!(health.borrow().is_suspended());

        assert!(handle.request(RefreshScope::All));
        advance(Duration::from_secs(60)).await;

        assert_eq!(harness.client.query_count("device1"), 1);
        assert!(health.borrow().is_suspended());
    }

    #[tokio::test(start_paused = true)]
    async fn should_coalesce_refresh_requests() {
        let harness = Harness::new(&[pumps()]);
        let (handle, _health) = harness.spawn(pumps());
        advance(Duration::from_millis(10)).await;
        assert_eq!(harness.client.query_count("device1"), 1);

        handle.request(RefreshScope::channel(output("device1", 7)));
        handle.request(RefreshScope::All);
        handle.request(RefreshScope::channel(output("device1", 8)));
        advance(Duration::from_millis(100)).await;
        assert_eq!(harness.client.query_count("device1"), 1);

        advance(Duration::from_secs(1)).await;
        assert_eq!(harness.client.query_count("device1"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn should_apply_only_requested_channel_on_entity_refresh() {
        let harness = Harness::new(&[pumps()]);
        let (handle, _health) = harness.spawn(pumps());
        advance(Duration::from_millis(10)).await;

        harness.client.steady(
            "device1",
            readings(&[(ChannelKind::Output, 7, true), (ChannelKind::Output, 8, true)]),
        );
        handle.request(RefreshScope::channel(output("device1", 7)));
        advance(Duration::from_secs(1)).await;

        assert_eq!(harness.client.query_count("device1"), 2);
        assert!(harness.is_on(&output("device1", 7)));
        assert!(!harness.is_on(&output("device1", 8)));
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_periodic_poll_under_frequent_entity_refreshes() {
        let harness = Harness::new(&[pumps()]);
        let (handle, _health) = harness.spawn(pumps());
        advance(Duration::from_millis(10)).await;

        harness.client.steady(
            "device1",
            readings(&[(ChannelKind::Output, 7, true), (ChannelKind::Output, 8, true)]),
        );
        for _ in 0..12 {
            handle.request(RefreshScope::channel(output("device1", 7)));
            advance(Duration::from_secs(5)).await;
        }

        assert!(harness.is_on(&output("device1", 7)));
        assert!(harness.is_on(&output("device1", 8)));
    }

    #[tokio::test(start_paused = true)]
    async fn should_postpone_periodic_poll_after_full_refresh() {
        let harness = Harness::new(&[pumps()]);
        let (handle, _health) = harness.spawn(pumps());
        advance(Duration::from_secs(6)).await;
        assert_eq!(harness.client.query_count("device1"), 1);

        handle.request(RefreshScope::All);
        advance(Duration::from_secs(1)).await;
        assert_eq!(harness.client.query_count("device1"), 2);

        // the tick originally due at 10s moved to 16.5s
        advance(Duration::from_secs(5)).await;
        assert_eq!(harness.client.query_count("device1"), 2);
        advance(Duration::from_secs(5)).await;
        assert_eq!(harness.client.query_count("device1"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_when_every_refresh_handle_is_dropped() {
        let harness = Harness::new(&[pumps()]);
        let (handle, _health) = harness.spawn(pumps());
        advance(Duration::from_millis(10)).await;
        assert_eq!(harness.client.query_count("device1"), 1);

        drop(handle);
        advance(Duration::from_secs(60)).await;

        assert_eq!(harness.client.query_count("device1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_let_stalled_device_delay_another() {
        let other = device("device2", vec![relay("Heater", 1)]);
        let harness = Harness::new(&[pumps(), other.clone()]);
        harness.client.hang("device1");
        harness
            .client
            .steady("device2", readings(&[(ChannelKind::Output, 1, true)]));

        let _first = harness.spawn(pumps());
        let _second = harness.spawn(other);
        advance(Duration::from_millis(10)).await;

        assert!(harness.is_on(&output("device2", 1)));
        assert!(!harness.is_on(&output("device1", 7)));
    }

    #[tokio::test(start_paused = true)]
    async fn should_ignore_unconfigured_channels_in_response() {
        let harness = Harness::new(&[pumps()]);
        harness.client.steady(
            "device1",
            readings(&[(ChannelKind::Output, 1, true), (ChannelKind::Input, 7, true)]),
        );

        let _handle = harness.spawn(pumps());
        advance(Duration::from_millis(10)).await;

        assert!(harness.publisher.changes().is_empty());
    }
}
