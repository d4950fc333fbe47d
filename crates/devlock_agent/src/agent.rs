//! Production wiring of the agent components.

use crate::config::{AgentConfig, NetworkRequirement};
use crate::connectivity::{AlwaysConnected, Connectivity, TcpProbe};
use crate::controller::LockController;
use crate::dir::DataDir;
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::http::{HttpTransport, ReqwestClient};
use crate::identity::FileIdentityStore;
use crate::scheduler::Scheduler;
use crate::store::FileStateStore;
use crate::surface::SignalBus;
use std::sync::Arc;

/// Sync engine talking HTTP, reading identity from disk and signalling
/// surfaces over a [`SignalBus`].
pub type HttpSyncEngine =
    SyncEngine<FileIdentityStore, HttpTransport<ReqwestClient>, Arc<SignalBus>>;

/// A fully wired agent.
///
/// Construct and drop it outside of any async runtime: the HTTP client owns
/// one.
pub struct Agent {
    config: AgentConfig,
    bus: Arc<SignalBus>,
    engine: Arc<HttpSyncEngine>,
    scheduler: Scheduler<HttpSyncEngine>,
    data_dir: DataDir,
}

impl Agent {
    /// Locks the data directory and builds every component from `config`.
    ///
    /// Fails with [`SyncError::DataDirLocked`] while another agent uses the
    /// same data directory.
    pub fn new(config: AgentConfig) -> SyncResult<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(SyncError::Config("status endpoint is empty".into()));
        }

        let data_dir = DataDir::open(config.data_dir())?;

        let probe = TcpProbe::for_endpoint(&config.endpoint, config.request.connect_timeout)?;
        let connectivity: Arc<dyn Connectivity> = match config.schedule.network {
            NetworkRequirement::Connected => Arc::new(probe),
            NetworkRequirement::NotRequired => Arc::new(AlwaysConnected),
        };

        let bus = Arc::new(SignalBus::new());
        let controller = Arc::new(LockController::with_store(
            Arc::clone(&bus),
            Arc::new(FileStateStore::new(config.state_path())),
            config.initial_policy,
        ));

        let client =
            ReqwestClient::new(config.request.connect_timeout, config.request.read_timeout)?;
        let engine = Arc::new(SyncEngine::new(
            FileIdentityStore::new(config.identity_path()),
            HttpTransport::new(config.endpoint.clone(), client),
            controller,
            config.request.total_timeout(),
        ));

        let scheduler = Scheduler::new(
            Arc::clone(&engine),
            config.schedule,
            Arc::new(config.retry.clone()),
            connectivity,
        );

        Ok(Self {
            config,
            bus,
            engine,
            scheduler,
            data_dir,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Returns the signal bus surfaces subscribe to.
    pub fn bus(&self) -> &Arc<SignalBus> {
        &self.bus
    }

    /// Returns the sync engine.
    pub fn engine(&self) -> &Arc<HttpSyncEngine> {
        &self.engine
    }

    /// Returns the locked data directory.
    pub fn data_dir(&self) -> &DataDir {
        &self.data_dir
    }

    /// Returns the scheduler.
    pub fn scheduler(&self) -> &Scheduler<HttpSyncEngine> {
        &self.scheduler
    }
}
