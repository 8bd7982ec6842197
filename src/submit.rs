use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::job::{Job, JobId, Queue};
use crate::jobid::JobIdAllocator;
use crate::lock::{LockManager, DAEMON_LOCK, SUBMIT_LOCK};
use crate::process::Processes;
use crate::store::JobStore;

/// The part of a submission shared by every file in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub directory: PathBuf,
    pub path_env: String,
    pub queue: Queue,
    pub ncpus: u32,
}

impl Request {
    /// A request from the calling process's working directory and `PATH`.
    pub fn here(queue: Queue, ncpus: u32) -> Result<Request> {
        let directory = std::env::current_dir()
            .map_err(|e| Error::store("read current directory", ".", e))?;
        let path_env = std::env::var("PATH").unwrap_or_default();
        Ok(Request { directory, path_env, queue, ncpus })
    }
}

/// What became of one file of a batch.
#[derive(Debug)]
pub enum Outcome {
    Submitted(JobId),
    /// The batch file does not exist or cannot be read.
    Missing(PathBuf),
    Rejected(PathBuf, Error),
}

pub struct Submitter<'a, P: Processes + ?Sized> {
    store: &'a JobStore,
    locks: LockManager<'a, P>,
    ids: JobIdAllocator,
}

impl<'a, P: Processes + ?Sized> Submitter<'a, P> {
    pub fn new(store: &'a JobStore, locks: LockManager<'a, P>) -> Submitter<'a, P> {
        Submitter { store, locks, ids: JobIdAllocator::new(store.dir()) }
    }

    /// Submits one batch file.
    pub fn submit(&self, command: &Path, request: &Request) -> Result<JobId> {
        let mut outcomes = self.submit_all(&[command.to_path_buf()], request)?;
        match outcomes.pop() {
            Some(Outcome::Submitted(id)) => Ok(id),
            Some(Outcome::Missing(path)) => Err(Error::InvalidArgument(
                format!("MyQS cannot find {:?} batch file.", path))),
            Some(Outcome::Rejected(_, e)) => Err(e),
            None => Err(Error::InvalidArgument("nothing to submit".to_string())),
        }
    }

    /// Submits every file under one hold of the submission lock, so ids
    /// come out consecutive.  A missing file is skipped; failing to take
    /// the lock or write the store aborts the rest of the batch.
    pub fn submit_all(&self, commands: &[PathBuf], request: &Request) -> Result<Vec<Outcome>> {
        if request.ncpus < 1 {
            return Err(Error::InvalidArgument(
                "You must specify a positive integer for the number of cpus.".to_string()));
        }
        let lock = self.locks.acquire(SUBMIT_LOCK)?;
        let mut outcomes = Vec::with_capacity(commands.len());
        for command in commands {
            if !is_readable_file(&request.directory.join(command)) {
                outcomes.push(Outcome::Missing(command.clone()));
                continue;
            }
            let job = Job::new(0, command.clone(), request.directory.clone(),
                               request.path_env.clone(), request.queue, request.ncpus);
            let mut job = match job {
                Ok(job) => job,
                Err(e) => {
                    outcomes.push(Outcome::Rejected(command.clone(), e));
                    continue;
                }
            };
            job.id = self.ids.next_free(|id| self.store.exists(id))?;
            self.store.write_job(&job)?;
            info!("queued job {} ({:?})", job.id, job.command);
            outcomes.push(Outcome::Submitted(job.id));
        }
        lock.release()?;
        Ok(outcomes)
    }

    /// Whether the scheduler daemon holds its lock.  Clears a stale one.
    pub fn scheduler_running(&self) -> Result<bool> {
        self.locks.is_locked(DAEMON_LOCK)
    }
}

fn is_readable_file(path: &Path) -> bool {
    path.is_file() && std::fs::File::open(path).is_ok()
}
