//! # ipxbridge-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the **push endpoints** the controller calls when an input or
//!   relay changes (`/api/ipx800v3/…`), authenticated with HTTP basic auth
//! - Serve a small **JSON API** over the channel store and device health
//! - Stream **change notifications** as Server-Sent Events
//! - Map HTTP requests into application calls (driving adapter) and
//!   domain errors into status codes
//!
//! ## Dependency rule
//! Depends on `ipxbridge-app` (for the bridge and push receiver) and
//! `ipxbridge-domain` (for types used in request/response mapping). Never
//! leaks axum types into the domain.

pub mod api;
pub mod auth;
pub mod error;
pub mod router;
pub mod state;
