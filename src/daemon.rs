//! The scheduler daemon.
//!
//! One daemon runs per host directory, holding `myqsd.pid` for its whole
//! life.  Each poll it reaps its own finished children, deletes run files
//! whose process group has gone, and then starts queued jobs (express
//! before normal, lowest id first) while their CPU slots fit in what is
//! left of the budget.  A job that does not fit stays queued even if a
//! later, smaller one is started ahead of it.

use std::collections::HashSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::Watcher;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::job::{Job, JobId, JobState};
use crate::lock::{Holder, LockManager, DAEMON_LOCK};
use crate::process::{OsProcesses, Processes};
use crate::store::JobStore;
use crate::{now, timestamp};

const STOP_WAIT: Duration = Duration::from_secs(10);

/// Starts jobs and notices when the ones it started have exited.
pub trait Launcher {
    /// Starts `job` in a new process group and returns the group id.
    fn launch(&mut self, job: &Job, start: f64) -> std::io::Result<u32>;
    /// Ids of launched jobs whose leader process has exited since the
    /// last call.
    fn reap(&mut self) -> Vec<JobId>;
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PollSummary {
    pub finished: Vec<JobId>,
    pub dispatched: Vec<JobId>,
    pub waiting: usize,
    pub used: u32,
}

pub struct Scheduler<'a, P: Processes + ?Sized, L: Launcher> {
    store: JobStore,
    processes: &'a P,
    launcher: L,
    slots: u32,
    oversized: HashSet<JobId>,
}

impl<'a, P: Processes + ?Sized, L: Launcher> Scheduler<'a, P, L> {
    pub fn new(store: JobStore, processes: &'a P, launcher: L, slots: u32)
               -> Scheduler<'a, P, L> {
        Scheduler { store, processes, launcher, slots, oversized: HashSet::new() }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Deals with run files left by an earlier daemon whose jobs are no
    /// longer running: they are put back in the queue if `requeue`, and
    /// deleted otherwise.  Jobs still running are adopted.
    pub fn recover(&mut self, requeue: bool) -> Result<Vec<JobId>> {
        let mut orphans = Vec::new();
        for (id, state) in self.store.list_jobs()? {
            if state != JobState::Running {
                continue;
            }
            let job = match self.read(id) {
                Some(job) => job,
                None => continue,
            };
            if let Some(pgid) = job.pgid {
                if self.processes.job_handle(pgid).is_alive() {
                    info!("adopting running job {} (pgid {})", id, pgid);
                    continue;
                }
            }
            if requeue {
                info!("Batch job with jobid {} being requeued after restart", id);
                self.store.requeue(id)?;
            } else {
                info!("discarding run file of job {}, which is no longer running", id);
                self.store.remove_running(id)?;
            }
            orphans.push(id);
        }
        Ok(orphans)
    }

    /// Reads a job, logging and skipping one that is corrupt.
    fn read(&self, id: JobId) -> Option<Job> {
        match self.store.read_job(id) {
            Ok(job) => job,
            Err(e) => {
                warn!("skipping job {}: {}", id, e);
                None
            }
        }
    }

    pub fn poll(&mut self) -> Result<PollSummary> {
        let mut summary = PollSummary::default();
        for id in self.launcher.reap() {
            info!("job {} leader exited", id);
        }

        let mut queued = Vec::new();
        for (id, state) in self.store.list_jobs()? {
            let job = match self.read(id) {
                Some(job) => job,
                None => continue,
            };
            match state {
                JobState::Queued => queued.push(job),
                _ => match job.pgid {
                    Some(pgid) if !self.processes.job_handle(pgid).is_alive() => {
                        self.store.remove_running(id)?;
                        info!("job {} finished", id);
                        summary.finished.push(id);
                    }
                    // No pgid yet means it is still being started.
                    _ => summary.used += job.ncpus,
                },
            }
        }

        queued.sort_by_key(|j| j.priority());
        self.oversized.retain(|id| queued.iter().any(|j| j.id == *id));
        for job in queued {
            if job.ncpus > self.slots {
                if self.oversized.insert(job.id) {
                    warn!("job {} needs {} cpus but only {} slots exist; leaving it queued",
                          job.id, job.ncpus, self.slots);
                }
                summary.waiting += 1;
                continue;
            }
            if summary.used + job.ncpus > self.slots {
                summary.waiting += 1;
                continue;
            }
            if self.dispatch(&job)? {
                summary.used += job.ncpus;
                summary.dispatched.push(job.id);
            }
        }
        Ok(summary)
    }

    /// Promotes and starts one job.  Returns false if the job vanished
    /// first or could not be started.
    fn dispatch(&mut self, job: &Job) -> Result<bool> {
        if !self.store.promote(job.id)? {
            // Deleted or dispatched since we listed it.
            return Ok(false);
        }
        let start = now();
        let pgid = match self.launcher.launch(job, start) {
            Ok(pgid) => pgid,
            Err(e) => {
                match e.kind() {
                    ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                        error!("cannot start job {} ({:?}): {}; removing it",
                               job.id, job.command, e);
                        self.store.remove_running(job.id)?;
                    }
                    _ => {
                        warn!("cannot start job {} ({:?}): {}; requeueing it",
                              job.id, job.command, e);
                        self.store.requeue(job.id)?;
                    }
                }
                return Ok(false);
            }
        };
        if let Err(e) = self.store.record_start(job.id, start, pgid) {
            error!("cannot record start of job {}: {}; stopping it", job.id, e);
            self.processes.job_handle(pgid).terminate().ok();
            self.store.remove_running(job.id)?;
            return Ok(false);
        }
        info!("started job {} ({:?}) pgid {} using {} cpus",
              job.id, job.command, pgid, job.ncpus);
        Ok(true)
    }
}

/// Runs jobs as real processes, writing their output to the job log.
pub struct ProcessLauncher {
    home: PathBuf,
    children: Vec<(JobId, Child, PathBuf)>,
}

impl ProcessLauncher {
    pub fn new(home: &Path) -> ProcessLauncher {
        ProcessLauncher { home: home.to_path_buf(), children: Vec::new() }
    }

    fn command(&self, job: &Job) -> (Command, PathBuf) {
        let cwd = if job.directory.is_dir() { job.directory.clone() } else { self.home.clone() };
        let script = cwd.join(&job.command);
        let mut cmd = if needs_shell(&script) {
            let mut sh = Command::new("/bin/sh");
            sh.arg(&script);
            sh
        } else {
            Command::new(&script)
        };
        cmd.current_dir(&cwd).stdin(Stdio::null());
        if !job.path_env.is_empty() {
            cmd.env("PATH", &job.path_env);
        }
        (cmd, script)
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&mut self, job: &Job, start: f64) -> std::io::Result<u32> {
        let logpath = job.logfile(&self.home);
        let (mut cmd, script) = self.command(job);
        if !script.is_file() {
            return Err(std::io::Error::new(ErrorKind::NotFound,
                                           format!("{:?} does not exist", script)));
        }
        let mut log = fs::OpenOptions::new().create(true).append(true).open(&logpath)?;
        write!(log, "\nMyQS v{}, My Queuing System batch job exec.\n\n\
                     MyQS JOBID  = {}\nMyQS QUEUE  = {}\nMyQS NCPUS  = {}\n",
               env!("CARGO_PKG_VERSION"), job.id, job.queue, job.ncpus)?;
        log.flush()?;
        // The child reports its own pgid, so the header stays ahead of
        // anything the job prints.  Only preallocated bytes are touched
        // between fork and exec.
        let tail = format!("MyQS START  = {}\n{}\n", timestamp(start), "-".repeat(80))
            .into_bytes();
        cmd.stdout(Stdio::from(log.try_clone()?)).stderr(Stdio::from(log));
        unsafe {
            cmd.pre_exec(move || {
                if libc::setpgid(0, 0) != 0 {
                    return Err(std::io::Error::last_os_error());
                }
                // make jobs always be maximally nice!
                libc::nice(19);
                let mut buf = [0u8; 40];
                let line = pgid_line(libc::getpid() as u32, &mut buf);
                libc::write(1, line.as_ptr() as *const libc::c_void, line.len());
                libc::write(1, tail.as_ptr() as *const libc::c_void, tail.len());
                Ok(())
            });
        }
        let child = cmd.spawn()?;
        let pgid = child.id();
        self.children.push((job.id, child, logpath));
        Ok(pgid)
    }

    fn reap(&mut self) -> Vec<JobId> {
        let mut done = Vec::new();
        let mut i = 0;
        while i < self.children.len() {
            let status = match self.children[i].1.try_wait() {
                Ok(Some(status)) => Some(status.code()),
                Ok(None) => None,
                Err(e) => {
                    warn!("cannot wait for job {}: {}", self.children[i].0, e);
                    Some(None)
                }
            };
            match status {
                None => i += 1,
                Some(code) => {
                    let (id, _, logpath) = self.children.swap_remove(i);
                    if let Ok(mut f) = fs::OpenOptions::new().append(true).open(&logpath) {
                        writeln!(f, "{}\nMyQS FINISH = {}{}", "-".repeat(80),
                                 timestamp(now()),
                                 code.map(|c| format!(" (exit status {})", c))
                                     .unwrap_or_default()).ok();
                    }
                    done.push(id);
                }
            }
        }
        done
    }
}

/// Formats `MyQS PGID   = <pgid>\n` into `buf` without allocating.
fn pgid_line(pgid: u32, buf: &mut [u8; 40]) -> &[u8] {
    const PREFIX: &[u8] = b"MyQS PGID   = ";
    buf[..PREFIX.len()].copy_from_slice(PREFIX);
    let mut digits = [0u8; 10];
    let mut n = pgid;
    let mut len = 0;
    loop {
        digits[len] = b'0' + (n % 10) as u8;
        len += 1;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    let mut end = PREFIX.len();
    for d in digits[..len].iter().rev() {
        buf[end] = *d;
        end += 1;
    }
    buf[end] = b'\n';
    &buf[..end + 1]
}

/// Scripts that cannot be executed directly, or that ask for `/bin/sh`,
/// are run through `/bin/sh`.
fn needs_shell(script: &Path) -> bool {
    let executable = script.metadata()
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false);
    if !executable {
        return true;
    }
    match fs::read(script) {
        Ok(data) => data.split(|&b| b == b'\n').next()
            .map(|l| l.strip_suffix(b"\r").unwrap_or(l) == b"#!/bin/sh")
            .unwrap_or(false),
        Err(_) => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DaemonOptions {
    pub foreground: bool,
    pub requeue: bool,
}

/// Runs the daemon until it is replaced or killed.
pub fn run(config: &Config, options: &DaemonOptions) -> Result<()> {
    let store = JobStore::open(&config.host_dir())?;
    let processes = OsProcesses;
    let locks = LockManager::new(store.dir(), &processes, None);
    if let Holder::Live(pid) = locks.holder(DAEMON_LOCK)? {
        return Err(Error::DaemonRunning { pid });
    }
    if !options.foreground {
        let log = config.daemon_log();
        unix_daemonize::daemonize_redirect(Some(log.clone()), Some(log),
                                           unix_daemonize::ChdirMode::ChdirRoot)
            .map_err(|e| Error::Daemonize(format!("{:?}", e)))?;
    }
    let lock = match locks.try_acquire(DAEMON_LOCK)? {
        Some(lock) => lock,
        None => return Err(Error::DaemonRunning {
            pid: locks.recorded_pid(DAEMON_LOCK).unwrap_or(0),
        }),
    };
    info!("==================");
    info!("MyQS batch job scheduler {} starting on {} with {} slots in {:?}",
          std::process::id(), config.hostname, config.slots, store.dir());

    let launcher = ProcessLauncher::new(&config.home);
    let mut scheduler = Scheduler::new(store.clone(), &processes, launcher, config.slots);
    scheduler.recover(options.requeue)?;

    let (tx, rx) = mpsc::channel();
    // Polling still works without it; the watcher only wakes us early.
    let watcher = notify::watcher(tx, Duration::from_millis(200))
        .and_then(|mut w| w.watch(store.dir(), notify::RecursiveMode::NonRecursive).map(|_| w));
    let _watcher = match watcher {
        Ok(w) => Some(w),
        Err(e) => {
            warn!("cannot watch {:?}, falling back to polling: {}", store.dir(), e);
            None
        }
    };

    let mut last = (u32::max_value(), usize::max_value());
    loop {
        if !lock.still_held() {
            info!("I {} have been replaced by {:?}.", std::process::id(),
                  locks.recorded_pid(DAEMON_LOCK));
            return Ok(()); // being replaced is not an error!
        }
        match scheduler.poll() {
            Ok(summary) => {
                if (summary.used, summary.waiting) != last {
                    info!("Currently using {}/{} cores, with {} jobs waiting.",
                          summary.used, config.slots, summary.waiting);
                    last = (summary.used, summary.waiting);
                }
            }
            Err(e) => {
                if !store.dir().is_dir() {
                    return Err(e);
                }
                error!("poll failed: {}", e);
            }
        }
        match rx.recv_timeout(config.poll_interval) {
            Ok(_) => while rx.try_recv().is_ok() {},
            Err(mpsc::RecvTimeoutError::Timeout) => (),
            Err(mpsc::RecvTimeoutError::Disconnected) => std::thread::sleep(config.poll_interval),
        }
    }
}

/// Asks a running daemon to exit and waits for its lock to clear.
/// Returns the pid it stopped, if one was running.
pub fn stop(config: &Config) -> Result<Option<u32>> {
    stop_with(&config.host_dir(), &OsProcesses, STOP_WAIT)
}

fn stop_with<P: Processes + ?Sized>(dir: &Path, processes: &P, wait: Duration)
                                    -> Result<Option<u32>> {
    let locks = LockManager::new(dir, processes, None);
    let pid = match locks.holder(DAEMON_LOCK)? {
        Holder::Live(pid) if pid != 0 => pid,
        _ => return Ok(None),
    };
    processes.terminate_process(pid)
        .map_err(|e| Error::lock("stop holder of", locks.path(DAEMON_LOCK), e))?;
    let started = Instant::now();
    while locks.is_locked(DAEMON_LOCK)? {
        if started.elapsed() > wait {
            return Err(Error::LockTimeout { path: locks.path(DAEMON_LOCK), waited: wait });
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    Ok(Some(pid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Queue;
    use crate::process::fake::FakeProcesses;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Pretends to start jobs: each launch creates a live fake group.
    struct FakeLauncher {
        procs: FakeProcesses,
        next_pgid: u32,
        launched: Rc<RefCell<Vec<JobId>>>,
        fail_with: Option<ErrorKind>,
    }

    impl Launcher for FakeLauncher {
        fn launch(&mut self, job: &Job, _start: f64) -> std::io::Result<u32> {
            if let Some(kind) = self.fail_with {
                return Err(std::io::Error::from(kind));
            }
            self.next_pgid += 1;
            self.procs.spawn_group(self.next_pgid);
            self.launched.borrow_mut().push(job.id);
            Ok(self.next_pgid)
        }
        fn reap(&mut self) -> Vec<JobId> {
            Vec::new()
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: JobStore,
        procs: FakeProcesses,
        launched: Rc<RefCell<Vec<JobId>>>,
    }

    impl Fixture {
        fn new() -> Fixture {
            let dir = tempfile::tempdir().unwrap();
            let store = JobStore::open(dir.path()).unwrap();
            Fixture {
                _dir: dir,
                store,
                procs: FakeProcesses::new(),
                launched: Rc::new(RefCell::new(Vec::new())),
            }
        }
        fn launcher(&self, fail_with: Option<ErrorKind>) -> FakeLauncher {
            FakeLauncher {
                procs: self.procs.clone(),
                next_pgid: 1000,
                launched: self.launched.clone(),
                fail_with,
            }
        }
        fn scheduler(&self, slots: u32) -> Scheduler<FakeProcesses, FakeLauncher> {
            Scheduler::new(self.store.clone(), &self.procs, self.launcher(None), slots)
        }
        fn queue(&self, id: JobId, queue: Queue, ncpus: u32) {
            let job = Job::new(id, PathBuf::from("job.sh"), PathBuf::from("/tmp"),
                               String::new(), queue, ncpus).unwrap();
            self.store.write_job(&job).unwrap();
        }
        fn running(&self, id: JobId, ncpus: u32, pgid: u32) {
            self.queue(id, Queue::Normal, ncpus);
            self.store.promote(id).unwrap();
            self.store.record_start(id, 1.0, pgid).unwrap();
        }
        fn state(&self, id: JobId) -> Option<JobState> {
            self.store.list_jobs().unwrap().into_iter()
                .find(|&(i, _)| i == id).map(|(_, s)| s)
        }
    }

    #[test]
    fn dispatches_within_budget() {
        let f = Fixture::new();
        f.queue(1, Queue::Normal, 1);
        f.queue(2, Queue::Normal, 1);
        f.queue(3, Queue::Normal, 1);
        let summary = f.scheduler(2).poll().unwrap();
        assert_eq!(summary.dispatched, vec![1, 2]);
        assert_eq!(summary.used, 2);
        assert_eq!(summary.waiting, 1);
        assert_eq!(f.state(3), Some(JobState::Queued));
        let job = f.store.read_job(1).unwrap().unwrap();
        assert_eq!(job.state, JobState::Running);
        assert_eq!(job.pgid, Some(1001));
        assert!(job.start.is_some());
    }

    #[test]
    fn express_goes_first() {
        let f = Fixture::new();
        f.queue(1, Queue::Normal, 1);
        f.queue(2, Queue::Express, 1);
        f.scheduler(1).poll().unwrap();
        assert_eq!(*f.launched.borrow(), vec![2]);
    }

    #[test]
    fn waits_for_running_job_to_finish() {
        let f = Fixture::new();
        f.procs.spawn_group(500);
        f.running(1, 1, 500);
        f.queue(2, Queue::Normal, 1);
        let mut scheduler = f.scheduler(1);
        let summary = scheduler.poll().unwrap();
        assert!(summary.dispatched.is_empty());
        assert_eq!(f.state(2), Some(JobState::Queued));

        f.procs.exit_group(500);
        let summary = scheduler.poll().unwrap();
        assert_eq!(summary.finished, vec![1]);
        assert_eq!(summary.dispatched, vec![2]);
        assert_eq!(f.state(1), None);
        assert_eq!(f.state(2), Some(JobState::Running));
    }

    #[test]
    fn smaller_job_backfills_around_a_big_one() {
        let f = Fixture::new();
        f.queue(1, Queue::Normal, 3);
        f.queue(2, Queue::Normal, 1);
        let summary = f.scheduler(2).poll().unwrap();
        assert_eq!(summary.dispatched, vec![2]);
        assert_eq!(f.state(1), Some(JobState::Queued));
    }

    #[test]
    fn oversized_job_stays_queued() {
        let f = Fixture::new();
        f.queue(1, Queue::Express, 8);
        let mut scheduler = f.scheduler(4);
        for _ in 0..3 {
            assert!(scheduler.poll().unwrap().dispatched.is_empty());
        }
        assert_eq!(f.state(1), Some(JobState::Queued));
    }

    #[test]
    fn missing_command_is_dropped_not_retried() {
        let f = Fixture::new();
        f.queue(1, Queue::Normal, 1);
        let mut scheduler = Scheduler::new(f.store.clone(), &f.procs,
                                           f.launcher(Some(ErrorKind::NotFound)), 1);
        let summary = scheduler.poll().unwrap();
        assert!(summary.dispatched.is_empty());
        assert_eq!(f.state(1), None);
    }

    #[test]
    fn spawn_failure_requeues_and_loop_continues() {
        let f = Fixture::new();
        f.queue(1, Queue::Normal, 1);
        f.queue(2, Queue::Normal, 1);
        let mut scheduler = Scheduler::new(f.store.clone(), &f.procs,
                                           f.launcher(Some(ErrorKind::Other)), 2);
        let summary = scheduler.poll().unwrap();
        assert!(summary.dispatched.is_empty());
        assert_eq!(f.state(1), Some(JobState::Queued));
        assert_eq!(f.state(2), Some(JobState::Queued));
        assert_eq!(f.store.read_job(1).unwrap().unwrap().pgid, None);
    }

    #[test]
    fn recover_discards_or_requeues_dead_jobs() {
        let f = Fixture::new();
        f.procs.spawn_group(600);
        f.running(1, 1, 600);
        f.running(2, 1, 601);
        f.running(3, 1, 602);
        assert_eq!(f.scheduler(2).recover(false).unwrap(), vec![2, 3]);
        assert_eq!(f.state(1), Some(JobState::Running));
        assert_eq!(f.state(2), None);

        f.running(4, 1, 603);
        assert_eq!(f.scheduler(2).recover(true).unwrap(), vec![4]);
        assert_eq!(f.state(4), Some(JobState::Queued));
    }

    #[test]
    fn corrupt_job_is_skipped() {
        let f = Fixture::new();
        fs::write(f.store.dir().join("1.q"), "garbage\n").unwrap();
        f.queue(2, Queue::Normal, 1);
        let summary = f.scheduler(1).poll().unwrap();
        assert_eq!(summary.dispatched, vec![2]);
    }

    #[test]
    fn stop_terminates_live_daemon() {
        let f = Fixture::new();
        f.procs.spawn(4321);
        fs::write(f.store.dir().join(DAEMON_LOCK), "4321\n").unwrap();
        let stopped = stop_with(f.store.dir(), &f.procs, Duration::from_secs(1)).unwrap();
        assert_eq!(stopped, Some(4321));
        assert_eq!(*f.procs.terminated.lock().unwrap(), vec![4321]);
        assert!(!f.store.dir().join(DAEMON_LOCK).exists());
        assert_eq!(stop_with(f.store.dir(), &f.procs, Duration::from_secs(1)).unwrap(), None);
    }

    #[test]
    fn pgid_line_formats_digits() {
        let mut buf = [0u8; 40];
        assert_eq!(pgid_line(0, &mut buf), b"MyQS PGID   = 0\n");
        let mut buf = [0u8; 40];
        assert_eq!(pgid_line(4294967295, &mut buf), b"MyQS PGID   = 4294967295\n");
    }

    #[test]
    fn shell_is_used_for_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("a.sh");
        fs::write(&script, "echo hi\n").unwrap();
        assert!(needs_shell(&script));
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(!needs_shell(&script));
        fs::write(&script, "#!/bin/sh\necho hi\n").unwrap();
        assert!(needs_shell(&script));
    }

    #[test]
    fn process_launcher_runs_job_and_logs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hello.sh"), "echo hello from $PATH\n").unwrap();
        let job = Job::new(9, PathBuf::from("hello.sh"), dir.path().to_path_buf(),
                           "/usr/bin:/bin".to_string(), Queue::Normal, 1).unwrap();
        let mut launcher = ProcessLauncher::new(dir.path());
        let pgid = launcher.launch(&job, now()).unwrap();
        assert!(pgid > 1);
        let started = Instant::now();
        let mut done = Vec::new();
        while done.is_empty() && started.elapsed() < Duration::from_secs(10) {
            std::thread::sleep(Duration::from_millis(20));
            done = launcher.reap();
        }
        assert_eq!(done, vec![9]);
        let log = fs::read_to_string(dir.path().join("hello.sh.o9")).unwrap();
        assert!(log.contains("MyQS JOBID  = 9"));
        assert!(log.contains(&format!("MyQS PGID   = {}", pgid)));
        assert!(log.contains("hello from /usr/bin:/bin"));
        assert!(log.contains("MyQS FINISH = "));
        assert!(log.find("MyQS PGID").unwrap() < log.find("hello from").unwrap());
        assert!(!OsProcesses.job_handle(pgid).is_alive());
    }
}
