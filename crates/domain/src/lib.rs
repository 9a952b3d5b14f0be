//! # ipxbridge-domain
//!
//! Pure domain model for bridging IPX800-class relay controllers into a
//! home-automation hub.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Channels** (one physical output relay or digital input, with a
//!   presentation role and a reconciled boolean state)
//! - Define **Devices** (a controller endpoint owning a fixed channel set)
//! - Define **update intents** (poll- or push-sourced observations) and the
//!   ordering rule that decides whether an observation is newer than what
//!   is recorded
//! - Define **change notifications** and **device health**
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod channel;
pub mod device;
pub mod event;
pub mod health;
pub mod update;
