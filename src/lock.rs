//! PID lock files.
//!
//! A lock is a file in the host directory holding the decimal pid of its
//! holder.  It is created with `O_EXCL`, so of several processes racing
//! to create it exactly one wins.  A lock whose holder is gone is stale
//! and is removed by whoever next tries to take it.
//!
//! Known weakness: the pid is the only fencing token.  On Linux a holder
//! is only believed if its process started before the lock file was
//! written, which catches recycled pids, but elsewhere a recycled pid
//! keeps a stale lock looking valid until that process exits.
//!
//! Reclaiming renames the lock aside and links it back if its holder
//! turns out to be live.  While it is aside a third process can create a
//! fresh lock, the link back then fails, and two processes both believe
//! they hold the lock.

use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tracing::debug;

use crate::error::{Error, Result};
use crate::process::Processes;

/// Serializes job id allocation and job file creation.
pub const SUBMIT_LOCK: &str = "myqsub.pid";
/// Held by the scheduler daemon for its whole life.
pub const DAEMON_LOCK: &str = "myqsd.pid";

const RETRY_INTERVAL: Duration = Duration::from_secs(1);
/// A lock file too young to hold a pid may still be being written.
const UNWRITTEN_GRACE: Duration = Duration::from_secs(5);

pub struct LockManager<'a, P: Processes + ?Sized> {
    dir: PathBuf,
    processes: &'a P,
    timeout: Option<Duration>,
    retry: Duration,
}

/// A held lock.  Dropping it releases the lock.
#[derive(Debug)]
pub struct LockHandle {
    path: PathBuf,
    pid: u32,
    released: bool,
}

/// What a lock file says about its holder.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Holder {
    Free,
    Live(u32),
    Stale,
}

impl<'a, P: Processes + ?Sized> LockManager<'a, P> {
    pub fn new(dir: &Path, processes: &'a P, timeout: Option<Duration>) -> LockManager<'a, P> {
        LockManager {
            dir: dir.to_path_buf(),
            processes,
            timeout,
            retry: RETRY_INTERVAL,
        }
    }

    pub fn with_retry_interval(mut self, retry: Duration) -> LockManager<'a, P> {
        self.retry = retry;
        self
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Blocks until the named lock is ours, reclaiming stale locks on the
    /// way.  Gives up with `LockTimeout` once the configured timeout
    /// passes.
    pub fn acquire(&self, name: &str) -> Result<LockHandle> {
        let started = Instant::now();
        loop {
            if let Some(handle) = self.try_acquire(name)? {
                return Ok(handle);
            }
            if let Some(timeout) = self.timeout {
                if started.elapsed() >= timeout {
                    return Err(Error::LockTimeout { path: self.path(name), waited: timeout });
                }
            }
            debug!("waiting for lock {:?}", self.path(name));
            std::thread::sleep(self.retry);
        }
    }

    /// One attempt: reclaims the lock if stale, then tries to create it.
    pub fn try_acquire(&self, name: &str) -> Result<Option<LockHandle>> {
        let path = self.path(name);
        match self.holder(name)? {
            Holder::Live(_) => return Ok(None),
            Holder::Stale => self.reclaim(&path)?,
            Holder::Free => (),
        }
        let pid = std::process::id();
        let mut f = match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(ref e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(Error::lock("create", path, e)),
        };
        f.write_all(format!("{}\n", pid).as_bytes())
            .and_then(|_| f.sync_all())
            .map_err(|e| Error::lock("write", &path, e))?;
        debug!("acquired lock {:?}", path);
        Ok(Some(LockHandle { path, pid, released: false }))
    }

    /// Read-only check of the named lock.
    pub fn holder(&self, name: &str) -> Result<Holder> {
        let path = self.path(name);
        let pid = match read_pid(&path) {
            Ok(pid) => pid,
            Err(ref e) if e.kind() == ErrorKind::NotFound => return Ok(Holder::Free),
            Err(e) => return Err(Error::lock("read", path, e)),
        };
        match pid {
            Some(pid) if self.processes.is_lock_holder(pid, &path) => Ok(Holder::Live(pid)),
            Some(_) => Ok(Holder::Stale),
            None => {
                let age = path.metadata().and_then(|m| m.modified()).ok()
                    .and_then(|t| SystemTime::now().duration_since(t).ok());
                match age {
                    Some(age) if age < UNWRITTEN_GRACE => Ok(Holder::Live(0)),
                    // It vanished between reading and stat-ing it.
                    None if !path.exists() => Ok(Holder::Free),
                    _ => Ok(Holder::Stale),
                }
            }
        }
    }

    /// True if a live process holds the named lock.  A stale lock is
    /// removed before answering.
    pub fn is_locked(&self, name: &str) -> Result<bool> {
        match self.holder(name)? {
            Holder::Live(_) => Ok(true),
            Holder::Stale => {
                self.reclaim(&self.path(name))?;
                Ok(false)
            }
            Holder::Free => Ok(false),
        }
    }

    /// Removes a stale lock.  The file is first renamed to a name private
    /// to this process, so a lock that another contender recreated in the
    /// meantime is put back instead of deleted.
    fn reclaim(&self, path: &Path) -> Result<()> {
        let aside = path.with_extension(format!("stale.{}", std::process::id()));
        match fs::rename(path, &aside) {
            Ok(()) => (),
            Err(ref e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::lock("reclaim", path, e)),
        }
        let restore = match read_pid(&aside) {
            Ok(Some(pid)) => self.processes.is_lock_holder(pid, &aside),
            _ => false,
        };
        if restore {
            // A hard link fails if yet another lock now exists, which
            // leaves that one in charge.
            fs::hard_link(&aside, path).ok();
        } else {
            debug!("removing stale lock {:?}", path);
        }
        fs::remove_file(&aside).map_err(|e| Error::lock("remove", aside, e))
    }

    /// Returns the pid recorded in the named lock, if any.
    pub fn recorded_pid(&self, name: &str) -> Option<u32> {
        read_pid(&self.path(name)).ok().and_then(|p| p)
    }
}

impl LockHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if the lock file still names this holder.
    pub fn still_held(&self) -> bool {
        match read_pid(&self.path) {
            Ok(Some(pid)) => pid == self.pid,
            _ => false,
        }
    }

    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.remove()
    }

    fn remove(&self) -> Result<()> {
        // Never delete a lock someone else took over.
        if !self.still_held() {
            return Ok(());
        }
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(ref e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::lock("remove", &self.path, e)),
        }
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if !self.released {
            self.remove().ok();
        }
    }
}

fn read_pid(path: &Path) -> std::io::Result<Option<u32>> {
    let mut data = String::new();
    fs::File::open(path)?.read_to_string(&mut data)?;
    Ok(data.lines().next().and_then(|l| l.trim().parse::<u32>().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fake::FakeProcesses;

    fn me() -> u32 {
        std::process::id()
    }

    #[test]
    fn acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let procs = FakeProcesses::new();
        procs.spawn(me());
        let locks = LockManager::new(dir.path(), &procs, None);
        let handle = locks.acquire(SUBMIT_LOCK).unwrap();
        let contents = fs::read_to_string(dir.path().join(SUBMIT_LOCK)).unwrap();
        assert_eq!(contents, format!("{}\n", me()));
        handle.release().unwrap();
        assert!(!dir.path().join(SUBMIT_LOCK).exists());
    }

    #[test]
    fn dropping_handle_releases() {
        let dir = tempfile::tempdir().unwrap();
        let procs = FakeProcesses::new();
        procs.spawn(me());
        let locks = LockManager::new(dir.path(), &procs, None);
        {
            let _handle = locks.acquire(SUBMIT_LOCK).unwrap();
            assert!(locks.is_locked(SUBMIT_LOCK).unwrap());
        }
        assert!(!locks.is_locked(SUBMIT_LOCK).unwrap());
    }

    #[test]
    fn stale_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let procs = FakeProcesses::new();
        procs.spawn(me());
        fs::write(dir.path().join(SUBMIT_LOCK), "999999\n").unwrap();
        let locks = LockManager::new(dir.path(), &procs, Some(Duration::from_secs(0)));
        assert_eq!(locks.holder(SUBMIT_LOCK).unwrap(), Holder::Stale);
        let handle = locks.acquire(SUBMIT_LOCK).unwrap();
        assert!(handle.still_held());
        assert!(!dir.path().join(format!("myqsub.stale.{}", me())).exists());
    }

    #[test]
    fn live_lock_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let procs = FakeProcesses::new();
        procs.spawn(4321);
        fs::write(dir.path().join(SUBMIT_LOCK), "4321\n").unwrap();
        let locks = LockManager::new(dir.path(), &procs, Some(Duration::from_millis(30)))
            .with_retry_interval(Duration::from_millis(10));
        match locks.acquire(SUBMIT_LOCK) {
            Err(Error::LockTimeout { .. }) => (),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(fs::read_to_string(dir.path().join(SUBMIT_LOCK)).unwrap(), "4321\n");
    }

    #[test]
    fn acquire_succeeds_once_holder_exits() {
        let dir = tempfile::tempdir().unwrap();
        let procs = FakeProcesses::new();
        procs.spawn(4321);
        fs::write(dir.path().join(DAEMON_LOCK), "4321\n").unwrap();
        let locks = LockManager::new(dir.path(), &procs, None);
        assert!(locks.try_acquire(DAEMON_LOCK).unwrap().is_none());
        procs.exit(4321);
        assert!(locks.try_acquire(DAEMON_LOCK).unwrap().is_some());
    }

    #[test]
    fn is_locked_removes_stale_daemon_lock() {
        let dir = tempfile::tempdir().unwrap();
        let procs = FakeProcesses::new();
        fs::write(dir.path().join(DAEMON_LOCK), "4321\n").unwrap();
        let locks = LockManager::new(dir.path(), &procs, None);
        assert!(!locks.is_locked(DAEMON_LOCK).unwrap());
        assert!(!dir.path().join(DAEMON_LOCK).exists());
    }

    #[test]
    fn fresh_empty_lock_counts_as_held() {
        let dir = tempfile::tempdir().unwrap();
        let procs = FakeProcesses::new();
        fs::write(dir.path().join(SUBMIT_LOCK), "").unwrap();
        let locks = LockManager::new(dir.path(), &procs, None);
        assert_eq!(locks.holder(SUBMIT_LOCK).unwrap(), Holder::Live(0));
    }

    #[test]
    fn release_leaves_a_lock_taken_over_by_another() {
        let dir = tempfile::tempdir().unwrap();
        let procs = FakeProcesses::new();
        procs.spawn(me());
        let locks = LockManager::new(dir.path(), &procs, None);
        let handle = locks.acquire(DAEMON_LOCK).unwrap();
        fs::write(dir.path().join(DAEMON_LOCK), "4321\n").unwrap();
        assert!(!handle.still_held());
        handle.release().unwrap();
        assert!(dir.path().join(DAEMON_LOCK).exists());
    }

    #[test]
    fn missing_directory_is_a_lock_error() {
        let dir = tempfile::tempdir().unwrap();
        let procs = FakeProcesses::new();
        let locks = LockManager::new(&dir.path().join("missing"), &procs, None);
        match locks.try_acquire(SUBMIT_LOCK) {
            Err(Error::Lock { op: "create", .. }) => (),
            other => panic!("expected lock error, got {:?}", other),
        }
    }
}
