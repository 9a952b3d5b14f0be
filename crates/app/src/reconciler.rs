//! Reconciliation engine: single arbiter of state store writes.
//!
//! Poll cycles and push notifications both end up here as [`StateUpdate`]s.
//! For each update the engine locks the target channel, applies the ordering
//! rule, and publishes a [`ChannelChange`] when the boolean actually flipped.
//! Publishing happens under the same lock, so notifications of one channel
//! leave in revision order. The engine never awaits and owns no IO.

use std::sync::Arc;

use ipxbridge_domain::error::NotFoundError;
use ipxbridge_domain::event::ChannelChange;
use ipxbridge_domain::update::{ApplyOutcome, StateUpdate};

use crate::ports::ChangePublisher;
use crate::state_store::StateStore;

/// Tally of a batch application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub changed: usize,
    pub unchanged: usize,
    pub stale: usize,
    pub unknown: usize,
}

impl BatchSummary {
    fn record(&mut self, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Changed { .. } => self.changed += 1,
            ApplyOutcome::Unchanged => self.unchanged += 1,
            ApplyOutcome::Stale => self.stale += 1,
        }
    }
}

pub struct ReconciliationEngine<P> {
    store: Arc<StateStore>,
    publisher: P,
}

impl<P: ChangePublisher> ReconciliationEngine<P> {
    #[must_use]
    pub fn new(store: Arc<StateStore>, publisher: P) -> Self {
        Self { store, publisher }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Offer one update to its channel.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] when the update targets a channel that is
    /// not configured.
    pub fn apply(&self, update: &StateUpdate) -> Result<ApplyOutcome, NotFoundError> {
        self.store
            .with_record(&update.channel, |channel, state| {
                let outcome = state.apply(update);
                match outcome {
                    ApplyOutcome::Changed { from, to } => {
                        tracing::info!(
                            entity_id = %channel.entity_id,
                            source = %update.source,
                            from,
                            to,
                            revision = state.revision,
                            "channel changed"
                        );
                        self.publisher.publish(ChannelChange {
                            channel: channel.key.clone(),
                            entity_id: channel.entity_id.clone(),
                            from,
                            to,
                            revision: state.revision,
                            source: update.source,
                            observed_at: update.observed_at,
                        });
                    }
                    ApplyOutcome::Unchanged => {
                        tracing::debug!(entity_id = %channel.entity_id, "update confirmed state");
                    }
                    ApplyOutcome::Stale => {
                        tracing::debug!(
                            entity_id = %channel.entity_id,
                            source = %update.source,
                            observed_at = %update.observed_at,
                            "discarding stale update"
                        );
                    }
                }
                outcome
            })
            .ok_or_else(|| NotFoundError {
                entity: "Channel",
                id: update.channel.to_string(),
            })
    }

    /// Apply every update in order. Unknown channels are counted, not fatal.
    pub fn apply_batch<'a>(
        &self,
        updates: impl IntoIterator<Item = &'a StateUpdate>,
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for update in updates {
            match self.apply(update) {
                Ok(outcome) => summary.record(outcome),
                Err(err) => {
                    tracing::debug!(error = %err, "update for unconfigured channel");
                    summary.unknown += 1;
                }
            }
        }
        summary
    }
}
