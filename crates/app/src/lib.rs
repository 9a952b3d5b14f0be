//! # ipxbridge-app
//!
//! Application layer: the synchronization core and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DeviceClient`: query and command a controller over the network
//!   - `ChangePublisher`: fan out channel change notifications
//! - Own the **State Store** and its single writer, the
//!   **Reconciliation Engine**
//! - Run the **Poll Coordinator** (one loop per device) and the
//!   **Push Receiver** (authentication plus per-device handoff queues)
//! - Expose **entity handles** (`ChannelEntity`) to whatever hub sits on top
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `ipxbridge-domain` only (plus `tokio` for tasks and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod bridge;
pub mod commands;
pub mod entity;
pub mod event_bus;
pub mod poll_coordinator;
pub mod ports;
pub mod push_receiver;
pub mod reconciler;
pub mod state_store;

#[cfg(test)]
mod testing;
