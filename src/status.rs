use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Result;
use crate::job::{Job, JobId, JobState, Queue};
use crate::lock::{LockManager, DAEMON_LOCK};
use crate::process::Processes;
use crate::store::JobStore;

/// Lines of a running job's log shown under its row.
pub const TAIL_LINES: usize = 5;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: JobId,
    pub queue: Queue,
    pub command: String,
    pub ncpus: u32,
    pub state: JobState,
    pub elapsed_minutes: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tail: Vec<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Report {
    pub hostname: String,
    pub jobs: Vec<JobRow>,
    pub scheduler_running: bool,
}

/// Builds a snapshot of the job directory.  Nothing in the store is
/// changed: a run file whose process group is gone is reported STOPPED
/// and left for the daemon to clean up.  A stale daemon lock is removed.
pub fn report<P: Processes + ?Sized>(store: &JobStore, locks: &LockManager<P>,
                                     processes: &P, hostname: &str, home: &Path,
                                     now: f64) -> Result<Report> {
    let mut jobs = Vec::new();
    for (id, _) in store.list_jobs()? {
        // Unreadable or half-deleted jobs are left out of the table.
        let job = match store.read_job(id) {
            Ok(Some(job)) => job,
            _ => continue,
        };
        jobs.push(row(&job, processes, home, now));
    }
    let scheduler_running = locks.is_locked(DAEMON_LOCK)?;
    Ok(Report { hostname: hostname.to_string(), jobs, scheduler_running })
}

fn row<P: Processes + ?Sized>(job: &Job, processes: &P, home: &Path, now: f64) -> JobRow {
    let mut state = job.state;
    let mut tail = Vec::new();
    if state == JobState::Running {
        if let Some(pgid) = job.pgid {
            if processes.job_handle(pgid).is_alive() {
                tail = log_tail(&job.logfile(home), TAIL_LINES);
            } else {
                state = JobState::Stopped;
            }
        }
    }
    JobRow {
        id: job.id,
        queue: job.queue,
        command: job.command.display().to_string(),
        ncpus: job.ncpus,
        state,
        elapsed_minutes: job.elapsed_minutes(now),
        tail,
    }
}

fn log_tail(path: &Path, n: usize) -> Vec<String> {
    let f = match fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return Vec::new(),
    };
    let mut tail = std::collections::VecDeque::with_capacity(n + 1);
    for line in BufReader::new(f).split(b'\n').flat_map(|l| l.ok()) {
        tail.push_back(String::from_utf8_lossy(&line).trim_end().to_string());
        if tail.len() > n {
            tail.pop_front();
        }
    }
    tail.into_iter().collect()
}

impl Report {
    pub fn table(&self) -> String {
        let mut out = format!("{:5}  {:9}  {:42}  {:>4}  {:7}  {:>5}\n",
                              "JOBID", "QUEUENAME", "JOBNAME", "CPUS", "STATE", "TIME");
        for job in &self.jobs {
            let elapsed = job.elapsed_minutes.map(|m| m.to_string())
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!("{:5}  {:9}  {:42}  {:>4}  {:7}  {:>5}\n",
                                  job.id, job.queue.as_str(), job.command, job.ncpus,
                                  job.state.to_string(), elapsed));
            for line in &job.tail {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }

    pub fn scheduler_line(&self) -> &'static str {
        if self.scheduler_running {
            "MyQS batch job scheduler is running."
        } else {
            "MyQS batch job scheduler not running. Run \"myqsd\" command."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fake::FakeProcesses;
    use std::path::PathBuf;

    struct Fixture {
        dir: tempfile::TempDir,
        store: JobStore,
        procs: FakeProcesses,
    }

    impl Fixture {
        fn new() -> Fixture {
            let dir = tempfile::tempdir().unwrap();
            let store = JobStore::open(&dir.path().join("host")).unwrap();
            Fixture { dir, store, procs: FakeProcesses::new() }
        }
        fn queue(&self, id: JobId, ncpus: u32) {
            let job = Job::new(id, PathBuf::from("job.sh"), self.dir.path().to_path_buf(),
                               String::new(), Queue::Normal, ncpus).unwrap();
            self.store.write_job(&job).unwrap();
        }
        fn running(&self, id: JobId, start: f64, pgid: u32) {
            self.queue(id, 1);
            self.store.promote(id).unwrap();
            self.store.record_start(id, start, pgid).unwrap();
        }
        fn report(&self) -> Report {
            let locks = LockManager::new(self.store.dir(), &self.procs, None);
            report(&self.store, &locks, &self.procs, "box", self.dir.path(), 1000.0).unwrap()
        }
    }

    #[test]
    fn empty_queue_without_daemon() {
        let f = Fixture::new();
        let report = f.report();
        assert!(report.jobs.is_empty());
        assert!(!report.scheduler_running);
        assert!(report.scheduler_line().contains("scheduler not running"));
    }

    #[test]
    fn stale_daemon_lock_reported_not_running() {
        let f = Fixture::new();
        fs::write(f.store.dir().join(DAEMON_LOCK), "31337\n").unwrap();
        assert!(!f.report().scheduler_running);
        assert!(!f.store.dir().join(DAEMON_LOCK).exists());
    }

    #[test]
    fn live_daemon_reported_running() {
        let f = Fixture::new();
        f.procs.spawn(31337);
        fs::write(f.store.dir().join(DAEMON_LOCK), "31337\n").unwrap();
        assert!(f.report().scheduler_running);
    }

    #[test]
    fn states_and_elapsed_time() {
        let f = Fixture::new();
        f.queue(1, 2);
        f.procs.spawn_group(700);
        f.running(2, 1000.0 - 150.0, 700);
        f.running(3, 1000.0 - 60.0, 701);
        let report = f.report();
        let summary: Vec<_> = report.jobs.iter()
            .map(|j| (j.id, j.state, j.elapsed_minutes)).collect();
        assert_eq!(summary, vec![
            (1, JobState::Queued, None),
            (2, JobState::Running, Some(2)),
            (3, JobState::Stopped, Some(1)),
        ]);
    }

    #[test]
    fn stopped_jobs_are_not_removed() {
        let f = Fixture::new();
        f.running(3, 1.0, 701);
        f.report();
        assert_eq!(f.store.list_jobs().unwrap(), vec![(3, JobState::Running)]);
    }

    #[test]
    fn running_job_shows_log_tail() {
        let f = Fixture::new();
        f.procs.spawn_group(700);
        f.running(2, 900.0, 700);
        let lines: Vec<String> = (1..=8).map(|i| format!("line {}", i)).collect();
        fs::write(f.dir.path().join("job.sh.o2"), lines.join("\n") + "\n").unwrap();
        let report = f.report();
        assert_eq!(report.jobs[0].tail, lines[3..].to_vec());
        let table = report.table();
        assert!(table.contains("line 8\n"));
        assert!(!table.contains("line 3\n"));
    }

    #[test]
    fn table_layout() {
        let f = Fixture::new();
        f.queue(12, 4);
        let table = f.report().table();
        let mut lines = table.lines();
        assert!(lines.next().unwrap().starts_with("JOBID  QUEUENAME  JOBNAME"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("   12  normal     job.sh"));
        assert!(row.contains("QUEUED"));
        assert!(row.trim_end().ends_with('-'));
    }
}
