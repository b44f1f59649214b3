//! Command-line argument definitions (clap).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::machine::store::DEFAULT_STORE_FILE;

#[derive(Parser, Debug)]
#[command(name = "fleetfand")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fleet-wide BMC fan control via ipmitool", long_about = None)]
pub struct Args {
    /// Path to the machine store
    #[arg(long, default_value = DEFAULT_STORE_FILE)]
    pub store: PathBuf,

    /// Log filter (overrides RUST_LOG), e.g. "debug" or "fleetfan=trace"
    #[arg(long)]
    pub log_level: Option<String>,

    /// With no command, runs the scheduler daemon.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List registered machines
    List,

    /// Register a new machine (created disabled, with a default curve preset)
    CreateMachine {
        #[arg(long)]
        name: String,
        /// BMC host or IP
        #[arg(long)]
        host: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        password: String,
        /// Recurrence expression, 5-field crontab or 6-field with seconds
        #[arg(long, default_value = "*/2 * * * *")]
        cron: String,
    },

    /// Enable scheduled fan control for a machine (restart a running daemon to pick up the change)
    Enable { id: String },

    /// Disable scheduled fan control for a machine (restart a running daemon to pick up the change)
    Disable { id: String },

    /// Run one apply cycle for a machine and report the outcome
    Apply { id: String },

    /// Dump chassis status, power and sensor telemetry for a machine
    Status { id: String },

    /// Show the tail of a machine's system event log
    Sel {
        id: String,
        #[arg(long, default_value_t = 20)]
        lines: u32,
        /// Clear the event log instead of reading it
        #[arg(long)]
        clear: bool,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::Args;

    #[test]
    fn enable_disable_help_states_restart_requirement() {
        let cmd = Args::command();
        for name in ["enable", "disable"] {
            let about = cmd
                .find_subcommand(name)
                .unwrap()
                .get_about()
                .unwrap()
                .to_string();
            assert!(about.contains("restart"), "{name}: {about}");
        }
    }
}
