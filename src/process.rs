//! Process liveness and process-group control.
//!
//! Everything above this module asks "is this pid alive?" or "is this job
//! still running?" through [`Processes`] and [`JobHandle`], so that tests
//! can substitute a fake process table.

use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

/// A dispatched job's process group.
pub trait JobHandle {
    fn pgid(&self) -> u32;
    /// True while any member of the group exists.
    fn is_alive(&self) -> bool;
    fn terminate(&self) -> std::io::Result<()>;
}

pub trait Processes {
    fn is_process_alive(&self, pid: u32) -> bool;

    /// Whether `pid` could be the process that wrote the lock file at
    /// `lock`.  A process that started after the lock file was last
    /// modified is a recycled pid, not the holder.
    fn is_lock_holder(&self, pid: u32, _lock: &Path) -> bool {
        self.is_process_alive(pid)
    }

    fn job_handle(&self, pgid: u32) -> Box<dyn JobHandle>;

    fn terminate_process(&self, pid: u32) -> std::io::Result<()>;
}

/// The real process table.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsProcesses;

impl Processes for OsProcesses {
    fn is_process_alive(&self, pid: u32) -> bool {
        pid_exists(pid)
    }

    fn is_lock_holder(&self, pid: u32, lock: &Path) -> bool {
        if !pid_exists(pid) {
            return false;
        }
        match (process_start_time(pid), modified(lock)) {
            // Allow for the coarse resolution of the boot time.
            (Some(started), Some(written)) => started <= written + Duration::from_secs(1),
            _ => true,
        }
    }

    fn job_handle(&self, pgid: u32) -> Box<dyn JobHandle> {
        Box::new(ProcessGroup { pgid })
    }

    fn terminate_process(&self, pid: u32) -> std::io::Result<()> {
        signal(pid as libc::pid_t, libc::SIGTERM)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ProcessGroup {
    pgid: u32,
}

impl JobHandle for ProcessGroup {
    fn pgid(&self) -> u32 {
        self.pgid
    }
    fn is_alive(&self) -> bool {
        pgid_exists(self.pgid)
    }
    fn terminate(&self) -> std::io::Result<()> {
        if self.pgid <= 1 {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput,
                                           "refusing to signal process group <= 1"));
        }
        signal(-(self.pgid as libc::pid_t), libc::SIGTERM)
    }
}

/// Determine if a process exists with this pid.  The kill system call
/// when given a zero signal just checks if the process exists.
fn pid_exists(pid: u32) -> bool {
    if pid == 0 || pid > libc::pid_t::max_value() as u32 {
        return false;
    }
    alive_after_kill(unsafe { libc::kill(pid as libc::pid_t, 0) })
}

/// Same as `pid_exists`, but for every member of a process group.
fn pgid_exists(pgid: u32) -> bool {
    if pgid <= 1 || pgid > libc::pid_t::max_value() as u32 {
        return false;
    }
    alive_after_kill(unsafe { libc::kill(-(pgid as libc::pid_t), 0) })
}

fn alive_after_kill(ret: libc::c_int) -> bool {
    // EPERM means it exists but belongs to someone else.
    ret == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

fn signal(target: libc::pid_t, sig: libc::c_int) -> std::io::Result<()> {
    if unsafe { libc::kill(target, sig) } == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

fn modified(path: &Path) -> Option<Duration> {
    path.metadata().ok()?.modified().ok()?.duration_since(UNIX_EPOCH).ok()
}

#[cfg(target_os = "linux")]
fn process_start_time(pid: u32) -> Option<Duration> {
    let process = procfs::process::Process::new(pid as i32).ok()?;
    let ticks = procfs::ticks_per_second().ok()? as u64;
    let boot = procfs::boot_time_secs().ok()?;
    if ticks == 0 {
        return None;
    }
    let since_boot = process.stat.starttime as u64 / ticks;
    Some(Duration::from_secs(boot + since_boot))
}

#[cfg(not(target_os = "linux"))]
fn process_start_time(_pid: u32) -> Option<Duration> {
    None
}
