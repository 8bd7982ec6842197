use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Where this host's queue lives and how the tools behave.  Built once
/// in `main` and handed to everything else.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub home: PathBuf,
    /// Usually `$HOME/.config`.
    pub root: PathBuf,
    pub hostname: String,
    /// CPU slots the daemon may hand out.
    pub slots: u32,
    pub poll_interval: Duration,
    /// `None` waits forever.
    pub lock_timeout: Option<Duration>,
}

impl Config {
    pub fn new(home: &Path, hostname: &str) -> Config {
        Config {
            home: home.to_path_buf(),
            root: home.join(".config"),
            hostname: short_hostname(hostname),
            slots: num_cpus::get_physical() as u32,
            poll_interval: DEFAULT_POLL_INTERVAL,
            lock_timeout: Some(DEFAULT_LOCK_TIMEOUT),
        }
    }

    /// Reads the home directory and host name from the environment.
    /// `MYQS_CONFIG_ROOT` replaces `$HOME/.config`, and
    /// `MYQS_LOCK_TIMEOUT` (seconds, 0 for none) the lock timeout.
    pub fn from_env() -> Result<Config> {
        let home = dirs::home_dir().ok_or(Error::NoHomeDirectory)?;
        let host = hostname::get().map_err(Error::Hostname)?;
        let mut config = Config::new(&home, &host.to_string_lossy());
        if let Some(root) = std::env::var_os("MYQS_CONFIG_ROOT") {
            if !root.is_empty() {
                config.root = PathBuf::from(root);
            }
        }
        if let Ok(secs) = std::env::var("MYQS_LOCK_TIMEOUT") {
            let secs = secs.trim().parse::<u64>().map_err(|_| Error::InvalidArgument(
                format!("MYQS_LOCK_TIMEOUT must be a number of seconds, not {:?}", secs)))?;
            config.lock_timeout = if secs == 0 { None } else { Some(Duration::from_secs(secs)) };
        }
        Ok(config)
    }

    pub fn with_slots(mut self, slots: u32) -> Config {
        self.slots = slots;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Config {
        self.poll_interval = interval;
        self
    }

    /// `<root>/myqs/<hostname>`
    pub fn host_dir(&self) -> PathBuf {
        self.root.join("myqs").join(&self.hostname)
    }

    /// Where the detached daemon writes its own output.
    pub fn daemon_log(&self) -> PathBuf {
        self.host_dir().join("myqsd.log")
    }
}

/// `Node7.example.org` → `node7`
pub fn short_hostname(name: &str) -> String {
    name.split('.').next().unwrap_or(name).to_lowercase()
}
