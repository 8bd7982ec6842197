use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot {op} {path:?}: {source}")]
    Store {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot {op} lock file {path:?}: {source}")]
    Lock {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("gave up waiting for lock file {path:?} after {}s", .waited.as_secs())]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("invalid job descriptor {path:?}: {reason}")]
    InvalidJob { path: PathBuf, reason: String },

    #[error("{0}")]
    InvalidArgument(String),

    #[error("cannot determine home directory")]
    NoHomeDirectory,

    #[error("cannot determine host name: {0}")]
    Hostname(#[source] std::io::Error),

    #[error("MyQS batch job scheduler is already running with pid {pid}")]
    DaemonRunning { pid: u32 },

    #[error("cannot start MyQS batch job scheduler daemon: {0}")]
    Daemonize(String),

    #[error("no free job ids: all {} ids are in use", crate::jobid::MAX_JOB_ID)]
    QueueFull,
}

impl Error {
    pub(crate) fn store(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Error {
        Error::Store { op, path: path.into(), source }
    }

    pub(crate) fn lock(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Error {
        Error::Lock { op, path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
