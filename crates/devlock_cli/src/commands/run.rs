//! Run command implementation.

use crate::terminal::{self, LogDialer, TerminalPresenter};
use devlock_agent::{
    Agent, AgentConfig, LockOverlay, NetworkRequirement, RetryConfig, ScheduleConfig,
};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Longest accepted cadence, one week.
const MAX_INTERVAL_MINS: u64 = 7 * 24 * 60;

/// Builds the schedule from the command-line values.
pub fn schedule(interval_mins: u64, no_network_check: bool) -> ScheduleConfig {
    let network = if no_network_check {
        NetworkRequirement::NotRequired
    } else {
        NetworkRequirement::Connected
    };
    let minutes = interval_mins.clamp(1, MAX_INTERVAL_MINS);
    ScheduleConfig::new(Duration::from_secs(minutes.saturating_mul(60))).with_network(network)
}

/// Builds the retry policy from the command-line values.
pub fn retry(max_attempts: u32, retry_delay_secs: u64) -> RetryConfig {
    RetryConfig::new(max_attempts).with_initial_delay(Duration::from_secs(retry_delay_secs))
}

/// Runs the agent until Ctrl-C.
pub fn run(config: AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(endpoint = %config.endpoint, data_dir = %config.data_dir().display(), "starting agent");

    // The HTTP client owns its own runtime; build it before ours.
    let agent = Agent::new(config).map_err(|e| e.to_string())?;

    let signals = agent.bus().subscribe();
    let (actions_tx, actions) = mpsc::channel();
    terminal::spawn_input(actions_tx)?;

    let overlay = thread::Builder::new()
        .name("lock-overlay".into())
        .spawn(move || {
            let mut overlay = LockOverlay::new(TerminalPresenter::stdout());
            terminal::drive(&mut overlay, &signals, &actions, &LogDialer);
        })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    runtime.block_on(async {
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("shutdown requested");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
            }
        });
        agent.scheduler().run(shutdown_rx).await;
    });
    drop(runtime);

    let stats = agent.engine().stats();
    info!(
        attempts = stats.attempts,
        successes = stats.successes,
        locked = agent.engine().controller().is_locked(),
        "agent stopped"
    );

    // Dropping the agent closes the bus, which ends the overlay loop.
    drop(agent);
    overlay.join().map_err(|_| "overlay thread panicked")?;

    Ok(())
}
