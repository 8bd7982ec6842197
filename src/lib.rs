//! MyQS, My Queuing System: a batch job queue for one host, kept as
//! plain files under `~/.config/myqs/<hostname>/`.
//!
//! `myqsub` adds jobs, `myqsd` runs them within a CPU slot budget,
//! `myqstat` shows them and `myqdel` removes them.  The tools never talk
//! to each other directly: all coordination goes through the files, with
//! pid lock files guarding job id allocation and the daemon singleton.

#[macro_use]
extern crate serde_derive;

pub mod config;
pub mod daemon;
pub mod error;
pub mod job;
pub mod jobid;
pub mod lock;
pub mod process;
pub mod status;
pub mod store;
pub mod submit;

use std::time::{SystemTime, UNIX_EPOCH};

pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::job::{Job, JobId, JobState, Queue};
pub use crate::lock::{LockHandle, LockManager};
pub use crate::process::{JobHandle, OsProcesses, Processes};
pub use crate::store::JobStore;

/// Seconds since the epoch.
pub fn now() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Local time as `YYYY-MM-DD-HH:MM:SS`.
pub fn timestamp(secs: f64) -> String {
    use chrono::TimeZone;
    match chrono::Local.timestamp_opt(secs as i64, 0) {
        chrono::LocalResult::Single(t) | chrono::LocalResult::Ambiguous(t, _) => {
            t.format("%Y-%m-%d-%H:%M:%S").to_string()
        }
        chrono::LocalResult::None => format!("{}", secs as i64),
    }
}

/// Sends `tracing` output to stderr, filtered by `RUST_LOG` or else
/// `default`.  Colour is only used when stderr is a terminal.
pub fn init_logging(default: &str) {
    use std::io::IsTerminal;
    install_subscriber(default, std::io::stderr().is_terminal());
}

/// Like `init_logging`, but never coloured: for a process whose stderr
/// is about to be redirected to a log file.
pub fn init_plain_logging(default: &str) {
    install_subscriber(default, false);
}

fn install_subscriber(default: &str, ansi: bool) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(ansi)
        .try_init()
        .ok();
}
