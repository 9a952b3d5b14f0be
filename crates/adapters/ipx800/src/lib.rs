//! # ipxbridge-adapter-ipx800
//!
//! Driven adapter implementing the `DeviceClient` port for GCE Electronics
//! IPX800 V3 controllers.
//!
//! ## Wire protocol
//! - Full state: `GET /api/xdevices.json?cmd=10`, a flat JSON object whose
//!   `OUTn` / `INn` keys carry `0` or `1`
//! - Relay command: `GET /preset.htm?set{n}={0|1}`
//! - Optional HTTP basic auth on both
//!
//! ## Dependency rule
//! Depends on `ipxbridge-app` (for the port trait) and `ipxbridge-domain`.
//! `reqwest` types never cross the port boundary; failures are converted to
//! domain errors by [`Ipx800Error::into_domain`].

pub mod client;
pub mod error;
pub mod response;

pub use client::Ipx800Client;
pub use error::Ipx800Error;
