//! End-to-end tests of the agent against a local HTTP authority.

mod common;

use common::{Reply, StubAuthority};
use devlock_agent::{
    provision, Agent, AgentConfig, CycleReport, DeviceIdentity, FileIdentityStore,
    FileStateStore, HttpTransport, InitialLockPolicy, LockController, LockSignal, LockSnapshot,
    LockState, NetworkRequirement, ReqwestClient, RequestConfig, RetryConfig, ScheduleConfig,
    SignalBus, StateStore, SyncEngine, SyncError, SyncOutcome, Transition,
};
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;

const LOCKED_BODY: &str =
    r#"{"locked": true, "lockMessage": "Payment overdue", "supportPhone": "555-1234"}"#;
const UNLOCKED_BODY: &str = r#"{"locked": false}"#;

type HttpEngine = SyncEngine<FileIdentityStore, HttpTransport<ReqwestClient>, Arc<SignalBus>>;

fn short_timeouts() -> RequestConfig {
    RequestConfig::new(Duration::from_millis(300), Duration::from_millis(300))
}

/// Builds an engine over real files and a real HTTP client.
fn http_engine(
    authority: &StubAuthority,
    dir: &Path,
    policy: InitialLockPolicy,
) -> (HttpEngine, Arc<SignalBus>) {
    let config = AgentConfig::new(authority.endpoint(), dir).with_request(short_timeouts());
    let bus = Arc::new(SignalBus::new());
    let controller = Arc::new(LockController::with_store(
        Arc::clone(&bus),
        Arc::new(FileStateStore::new(config.state_path())),
        policy,
    ));
    let engine = SyncEngine::new(
        FileIdentityStore::new(config.identity_path()),
        HttpTransport::new(
            authority.endpoint(),
            ReqwestClient::new(config.request.connect_timeout, config.request.read_timeout)
                .unwrap(),
        ),
        controller,
        config.request.total_timeout(),
    );
    (engine, bus)
}

fn provision_imei(dir: &Path, imei: &str) {
    let config = AgentConfig::new("http://unused", dir);
    provision(&config.identity_path(), &DeviceIdentity::new(imei).unwrap()).unwrap();
}

fn drain(signals: &Receiver<LockSignal>) -> Vec<LockSignal> {
    signals.try_iter().collect()
}

fn payment_overdue() -> LockSignal {
    LockSignal::Activate {
        message: "Payment overdue".into(),
        support_phone: "555-1234".into(),
    }
}

#[test]
fn lock_then_unlock_over_http() {
    let authority = StubAuthority::start();
    let dir = tempdir().unwrap();
    provision_imei(dir.path(), "IMEI123");

    let (engine, bus) = http_engine(&authority, dir.path(), InitialLockPolicy::FailOpen);
    let signals = bus.subscribe();

    authority.respond_json(LOCKED_BODY);
    assert_eq!(engine.run_once(), SyncOutcome::Success);
    assert!(engine.controller().is_locked());
    assert_eq!(drain(&signals), vec![payment_overdue()]);
    assert_eq!(authority.requests(), vec!["/api/devices/sync?imei=IMEI123"]);

    // same answer again leaves the surface alone
    assert_eq!(engine.run_once(), SyncOutcome::Success);
    assert!(drain(&signals).is_empty());

    authority.respond_json(UNLOCKED_BODY);
    assert_eq!(engine.run_once(), SyncOutcome::Success);
    assert_eq!(engine.controller().state(), LockState::Unlocked);
    assert_eq!(drain(&signals), vec![LockSignal::Release]);

    let saved = FileStateStore::new(dir.path().join("lock_state.json"))
        .load()
        .unwrap();
    assert_eq!(saved, Some(LockSnapshot::unlocked()));
}

#[test]
fn timeout_is_retryable_and_keeps_lock() {
    let authority = StubAuthority::start();
    let dir = tempdir().unwrap();
    provision_imei(dir.path(), "IMEI123");

    let (engine, bus) = http_engine(&authority, dir.path(), InitialLockPolicy::FailOpen);
    let signals = bus.subscribe();

    authority.respond_json(LOCKED_BODY);
    assert_eq!(engine.run_once(), SyncOutcome::Success);
    drain(&signals);

    authority.reply(Reply::Hang(Duration::from_secs(3)));
    assert_eq!(engine.run_once(), SyncOutcome::RetryableFailure);

    assert!(engine.controller().is_locked());
    assert!(drain(&signals).is_empty());
    assert!(engine.transport().last_error().is_some());
}

#[test]
fn stalled_response_hits_read_timeout() {
    let authority = StubAuthority::start();
    let dir = tempdir().unwrap();
    provision_imei(dir.path(), "IMEI123");

    let (engine, bus) = http_engine(&authority, dir.path(), InitialLockPolicy::FailOpen);
    let signals = bus.subscribe();

    // slower than the read bound, faster than connect plus read
    authority.reply(Reply::Delayed(
        Duration::from_millis(450),
        LOCKED_BODY.to_string(),
    ));
    let start = Instant::now();
    assert_eq!(engine.run_once(), SyncOutcome::RetryableFailure);
    assert!(start.elapsed() < Duration::from_millis(450));

    assert_eq!(engine.controller().state(), LockState::Unlocked);
    assert!(drain(&signals).is_empty());
}

#[test]
fn not_found_is_retryable() {
    let authority = StubAuthority::start();
    let dir = tempdir().unwrap();
    provision_imei(dir.path(), "IMEI999");

    let (engine, _bus) = http_engine(&authority, dir.path(), InitialLockPolicy::FailOpen);
    authority.reply(Reply::Body(
        404,
        r#"{"message": "Device not registered"}"#.into(),
    ));

    assert_eq!(engine.run_once(), SyncOutcome::RetryableFailure);
    assert_eq!(engine.controller().state(), LockState::Unlocked);
    assert!(engine.stats().last_error.unwrap().contains("404"));
}

#[test]
fn malformed_body_is_retryable() {
    let authority = StubAuthority::start();
    let dir = tempdir().unwrap();
    provision_imei(dir.path(), "IMEI123");

    let (engine, bus) = http_engine(&authority, dir.path(), InitialLockPolicy::FailOpen);
    let signals = bus.subscribe();

    authority.reply(Reply::Body(200, "<html>Bad Gateway</html>".into()));
    assert_eq!(engine.run_once(), SyncOutcome::RetryableFailure);

    authority.reply(Reply::Body(200, "[true]".into()));
    assert_eq!(engine.run_once(), SyncOutcome::RetryableFailure);

    assert!(drain(&signals).is_empty());
}

#[test]
fn missing_identity_makes_no_request() {
    let authority = StubAuthority::start();
    let dir = tempdir().unwrap();

    let (engine, _bus) = http_engine(&authority, dir.path(), InitialLockPolicy::FailOpen);
    assert_eq!(engine.run_once(), SyncOutcome::TerminalFailure);
    assert_eq!(authority.hits(), 0);
}

#[test]
fn empty_object_means_unlocked() {
    let authority = StubAuthority::start();
    let dir = tempdir().unwrap();
    provision_imei(dir.path(), "IMEI123");

    let (engine, bus) = http_engine(&authority, dir.path(), InitialLockPolicy::FailOpen);
    let signals = bus.subscribe();

    authority.respond_json("{}");
    assert_eq!(engine.run_once(), SyncOutcome::Success);
    assert_eq!(engine.controller().state(), LockState::Unlocked);
    // first confirmed unlock still clears any leftover view
    assert_eq!(drain(&signals), vec![LockSignal::Release]);
}

#[test]
fn restart_restores_last_known_lock() {
    let authority = StubAuthority::start();
    let dir = tempdir().unwrap();
    provision_imei(dir.path(), "IMEI123");

    {
        let (engine, _bus) =
            http_engine(&authority, dir.path(), InitialLockPolicy::RestoreLastKnown);
        authority.respond_json(LOCKED_BODY);
        assert_eq!(engine.run_once(), SyncOutcome::Success);
    }

    // authority unreachable after restart
    authority.reply(Reply::Hang(Duration::from_secs(3)));
    let (engine, bus) = http_engine(&authority, dir.path(), InitialLockPolicy::RestoreLastKnown);
    assert!(engine.controller().is_locked());

    // an overlay started after the restore still gets the activation
    let signals = bus.subscribe();
    assert_eq!(drain(&signals), vec![payment_overdue()]);

    assert_eq!(engine.run_once(), SyncOutcome::RetryableFailure);
    assert!(engine.controller().is_locked());
}

#[test]
fn fail_open_restart_starts_unlocked() {
    let authority = StubAuthority::start();
    let dir = tempdir().unwrap();
    provision_imei(dir.path(), "IMEI123");

    {
        let (engine, _bus) = http_engine(&authority, dir.path(), InitialLockPolicy::FailOpen);
        authority.respond_json(LOCKED_BODY);
        engine.run_once();
    }

    let (engine, bus) = http_engine(&authority, dir.path(), InitialLockPolicy::FailOpen);
    let signals = bus.subscribe();
    assert_eq!(engine.controller().state(), LockState::Unlocked);
    assert!(drain(&signals).is_empty());

    authority.respond_json(LOCKED_BODY);
    engine.run_once();
    assert_eq!(drain(&signals), vec![payment_overdue()]);
    assert_eq!(
        engine.controller().apply(&devlock_agent::DeviceStatus::unlocked()),
        Transition::Released
    );
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

fn agent_config(authority: &StubAuthority, dir: &Path) -> AgentConfig {
    AgentConfig::new(authority.endpoint(), dir)
        .with_request(short_timeouts())
        .with_schedule(ScheduleConfig::new(Duration::from_secs(900)))
        .with_retry(
            RetryConfig::new(3)
                .with_initial_delay(Duration::from_millis(10))
                .with_jitter(false),
        )
}

#[test]
fn scheduler_cycle_locks_device() {
    let authority = StubAuthority::start();
    let dir = tempdir().unwrap();
    provision_imei(dir.path(), "IMEI123");
    authority.respond_json(LOCKED_BODY);

    let agent = Agent::new(agent_config(&authority, dir.path())).unwrap();
    let signals = agent.bus().subscribe();

    let report = runtime().block_on(agent.scheduler().run_cycle());
    assert_eq!(
        report,
        CycleReport::Completed {
            outcome: SyncOutcome::Success,
            attempts: 1
        }
    );
    assert_eq!(drain(&signals), vec![payment_overdue()]);
    assert_eq!(agent.engine().stats().successes, 1);
}

#[test]
fn running_agent_blocks_second_agent() {
    let authority = StubAuthority::start();
    let dir = tempdir().unwrap();
    provision_imei(dir.path(), "IMEI123");

    let running = Agent::new(agent_config(&authority, dir.path())).unwrap();
    let signals = running.bus().subscribe();

    let err = Agent::new(agent_config(&authority, dir.path())).err().unwrap();
    assert!(matches!(err, SyncError::DataDirLocked { .. }));
    assert_eq!(authority.hits(), 0);

    // unlocks still go through the agent that owns the overlay
    authority.respond_json(UNLOCKED_BODY);
    assert_eq!(running.engine().run_once(), SyncOutcome::Success);
    assert_eq!(drain(&signals), vec![LockSignal::Release]);
}

#[test]
fn scheduler_retries_unavailable_authority() {
    let authority = StubAuthority::start();
    let dir = tempdir().unwrap();
    provision_imei(dir.path(), "IMEI123");
    authority.reply(Reply::Body(503, String::new()));

    let agent = Agent::new(agent_config(&authority, dir.path())).unwrap();
    let report = runtime().block_on(agent.scheduler().run_cycle());

    assert_eq!(
        report,
        CycleReport::Completed {
            outcome: SyncOutcome::RetryableFailure,
            attempts: 3
        }
    );
    assert_eq!(authority.hits(), 3);
}

#[test]
fn scheduler_defers_when_offline() {
    let dir = tempdir().unwrap();
    provision_imei(dir.path(), "IMEI123");

    // nothing listens on the endpoint's port
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = AgentConfig::new(format!("http://127.0.0.1:{}/api/devices/sync", port), dir.path())
        .with_request(short_timeouts())
        .with_retry(RetryConfig::no_retry());

    let agent = Agent::new(config.clone()).unwrap();
    assert_eq!(
        runtime().block_on(agent.scheduler().run_cycle()),
        CycleReport::Offline
    );
    assert_eq!(agent.engine().stats().attempts, 0);
    drop(agent);

    let agent = Agent::new(
        config.with_schedule(
            ScheduleConfig::new(Duration::from_secs(900))
                .with_network(NetworkRequirement::NotRequired),
        ),
    )
    .unwrap();
    let report = runtime().block_on(agent.scheduler().run_cycle());
    assert_eq!(
        report,
        CycleReport::Completed {
            outcome: SyncOutcome::RetryableFailure,
            attempts: 1
        }
    );
}
