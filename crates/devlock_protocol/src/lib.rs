//! # devlock Protocol
//!
//! Wire types for the device status query.
//!
//! The agent issues one request per sync attempt:
//!
//! ```text
//! GET <endpoint>?imei=<device identity>
//! ```
//!
//! and expects a `200` response carrying a JSON object:
//!
//! ```json
//! { "locked": true, "lockMessage": "Payment overdue", "supportPhone": "555-1234" }
//! ```
//!
//! Every field is optional. A missing `locked` means unlocked.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod query;
mod status;

pub use error::{ProtocolError, ProtocolResult};
pub use query::{StatusQuery, IMEI_PARAM};
pub use status::{DeviceStatus, StatusDetails, DEFAULT_LOCK_MESSAGE};
