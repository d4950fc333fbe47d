//! # devlock Agent
//!
//! Remote device-lock enforcement agent.
//!
//! This crate provides:
//! - Device identity storage
//! - Status transport abstraction with an HTTP implementation
//! - Sync engine (one poll-interpret-apply attempt per call)
//! - Lock state machine driving an enforcement surface
//! - Signal bus and overlay runtime for the enforcement surface
//! - Scheduler with connectivity gating and retry with backoff
//!
//! ## Architecture
//!
//! ```text
//! Scheduler → SyncEngine → StatusTransport → authority
//!                 │
//!                 ▼
//!           LockController → SignalBus ⇒ LockOverlay (own thread)
//! ```
//!
//! ## Key Invariants
//!
//! - At most one sync attempt is in flight
//! - Lock state changes only on a successful sync; failures keep the last
//!   known state
//! - Applying the same status twice never re-triggers the surface
//! - Release is safe with zero or many surfaces listening
//! - A missing identity is terminal for the cycle and makes no request
//! - One agent per data directory

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod agent;
mod config;
mod connectivity;
mod controller;
mod dir;
mod engine;
mod error;
mod http;
mod identity;
mod overlay;
mod scheduler;
mod store;
mod surface;
mod transport;

pub use agent::{Agent, HttpSyncEngine};
pub use config::{
    AgentConfig, Backoff, NetworkRequirement, RequestConfig, RetryConfig, RetryPolicy,
    ScheduleConfig, IDENTITY_FILE, LOCK_STATE_FILE,
};
pub use connectivity::{AlwaysConnected, Connectivity, ManualConnectivity, TcpProbe};
pub use controller::{InitialLockPolicy, LockController, LockSnapshot, LockState, Transition};
pub use dir::{DataDir, AGENT_LOCK_FILE};
pub use engine::{SyncEngine, SyncOutcome, SyncRunner, SyncStats};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpResponse, HttpTransport, ReqwestClient};
pub use identity::{
    provision, DeviceIdentity, FileIdentityStore, IdentityStore, MemoryIdentityStore,
};
pub use overlay::{Dialer, LockOverlay, OverlayView, Presenter};
pub use scheduler::{CycleReport, Scheduler};
pub use store::{FileStateStore, MemoryStateStore, StateStore};
pub use surface::{EnforcementSurface, LockSignal, RecordingSurface, SignalBus};
pub use transport::{MockTransport, StatusTransport};

pub use devlock_protocol::{DeviceStatus, StatusDetails, DEFAULT_LOCK_MESSAGE};
