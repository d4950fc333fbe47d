//! Sync command implementation.

use devlock_agent::{Agent, AgentConfig, LockState, SyncOutcome};

/// Runs one sync attempt and returns the process exit code.
pub fn run(config: AgentConfig) -> Result<i32, Box<dyn std::error::Error>> {
    // Refused while another agent (e.g. `devlock run`) owns the data dir.
    let agent = Agent::new(config).map_err(|e| e.to_string())?;
    let outcome = agent.engine().run_once();
    let stats = agent.engine().stats();

    println!("Sync: {}", outcome);
    match agent.engine().controller().state() {
        LockState::Unlocked => println!("  State: unlocked"),
        LockState::Locked {
            message,
            support_phone,
        } => {
            println!("  State: locked");
            println!("  Message: {}", message);
            if !support_phone.is_empty() {
                println!("  Support: {}", support_phone);
            }
        }
    }
    if let Some(error) = stats.last_error {
        println!("  Error: {}", error);
    }

    Ok(exit_code(outcome))
}

/// Maps an outcome to an exit code.
pub fn exit_code(outcome: SyncOutcome) -> i32 {
    match outcome {
        SyncOutcome::Success => 0,
        SyncOutcome::RetryableFailure => 1,
        SyncOutcome::TerminalFailure => 2,
    }
}
