use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::job::JobId;
use crate::store;

pub const MAX_JOB_ID: JobId = 32767;
pub const LAST_FILE: &str = "myqs.last";

/// The persisted job id counter.  It does no locking of its own: callers
/// must hold the submission lock.
pub struct JobIdAllocator {
    path: PathBuf,
}

impl JobIdAllocator {
    pub fn new(dir: &Path) -> JobIdAllocator {
        JobIdAllocator { path: dir.join(LAST_FILE) }
    }

    /// The last id handed out, or 0 if none has been (or the file is
    /// unreadable garbage).
    pub fn last(&self) -> Result<JobId> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(s.lines().next()
                        .and_then(|l| l.trim().parse::<JobId>().ok())
                        .unwrap_or(0)),
            Err(ref e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(Error::store("read", &self.path, e)),
        }
    }

    pub fn next_id(&self) -> Result<JobId> {
        self.next_free(|_| false)
    }

    /// Advances the counter past any id for which `taken` is true, so an
    /// id still in use from before a wraparound is never reissued.
    pub fn next_free<F: Fn(JobId) -> bool>(&self, taken: F) -> Result<JobId> {
        let mut id = self.last()?;
        for _ in 0..MAX_JOB_ID {
            id = following(id);
            if !taken(id) {
                store::write_atomically(&self.path, format!("{}\n", id).as_bytes())?;
                return Ok(id);
            }
        }
        Err(Error::QueueFull)
    }
}

fn following(id: JobId) -> JobId {
    if id >= MAX_JOB_ID { 1 } else { id + 1 }
}
