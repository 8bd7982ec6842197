//! The job directory.
//!
//! Each job is one file named after its id.  The extension carries the
//! state (`.q` queued, `.r` running) and nothing outside this module
//! knows that.  Every write goes to a temporary file which is then
//! renamed into place, so readers only ever see complete descriptors.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::job::{Job, JobId, JobState};

const QUEUED: &str = "q";
const RUNNING: &str = "r";

#[derive(Debug, Clone)]
pub struct JobStore {
    dir: PathBuf,
}

impl JobStore {
    /// Opens the store, creating the directory (mode 0700) if needed.
    pub fn open(dir: &Path) -> Result<JobStore> {
        if !dir.is_dir() {
            fs::create_dir_all(dir).map_err(|e| Error::store("create directory", dir, e))?;
            fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
                .map_err(|e| Error::store("set permissions on", dir, e))?;
        }
        Ok(JobStore { dir: dir.to_path_buf() })
    }

    /// A store over an existing directory, for readers that must not
    /// create anything.
    pub fn existing(dir: &Path) -> JobStore {
        JobStore { dir: dir.to_path_buf() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&self, id: JobId, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, ext))
    }

    fn path_for(&self, id: JobId, state: JobState) -> PathBuf {
        match state {
            JobState::Queued => self.file(id, QUEUED),
            JobState::Running | JobState::Stopped => self.file(id, RUNNING),
        }
    }

    /// Writes `job` as a queue file.
    pub fn write_job(&self, job: &Job) -> Result<PathBuf> {
        let path = self.file(job.id, QUEUED);
        write_atomically(&path, job.descriptor().as_bytes())?;
        Ok(path)
    }

    /// Renames the queue file to a run file.  Returns false if the queue
    /// file is gone (deleted or already dispatched).
    pub fn promote(&self, id: JobId) -> Result<bool> {
        self.rename(id, QUEUED, RUNNING)
    }

    /// Puts a run file back in the queue, dropping its dispatch fields.
    pub fn requeue(&self, id: JobId) -> Result<bool> {
        let mut job = match self.read_job(id)? {
            Some(job) => job,
            None => return Ok(false),
        };
        if job.state == JobState::Queued {
            return Ok(true);
        }
        job.start = None;
        job.pgid = None;
        let from = self.file(id, RUNNING);
        write_atomically(&from, job.descriptor().as_bytes())?;
        self.rename(id, RUNNING, QUEUED)
    }

    /// Records dispatch details in an existing run file.
    pub fn record_start(&self, id: JobId, start: f64, pgid: u32) -> Result<Job> {
        let path = self.file(id, RUNNING);
        let mut job = match self.read_file(id, JobState::Running, &path)? {
            Some(job) => job,
            None => return Err(Error::store("update", path,
                                            std::io::Error::from(ErrorKind::NotFound))),
        };
        job.start = Some(start);
        job.pgid = Some(pgid);
        write_atomically(&path, job.descriptor().as_bytes())?;
        Ok(job)
    }

    fn rename(&self, id: JobId, from: &str, to: &str) -> Result<bool> {
        let (src, dst) = (self.file(id, from), self.file(id, to));
        match fs::rename(&src, &dst) {
            Ok(()) => {
                debug!("renamed {:?} to {:?}", src, dst);
                Ok(true)
            }
            Err(ref e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::store("rename", src, e)),
        }
    }

    /// Every job present, by id.
    ///
    /// A directory scan that races with a rename can miss the renamed
    /// file altogether, so this merges two consecutive scans.  A job
    /// renamed once cannot be missed by both.  A job whose start failed
    /// goes `.q` -> `.r` -> `.q` in quick succession and can still be
    /// left out; it shows up again on the next listing.
    pub fn list_jobs(&self) -> Result<Vec<(JobId, JobState)>> {
        let mut jobs = self.scan()?;
        for (id, state) in self.scan()? {
            jobs.insert(id, state);
        }
        Ok(jobs.into_iter().collect())
    }

    fn scan(&self) -> Result<BTreeMap<JobId, JobState>> {
        let mut jobs = BTreeMap::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(ref e) if e.kind() == ErrorKind::NotFound => return Ok(jobs),
            Err(e) => return Err(Error::store("list", &self.dir, e)),
        };
        for entry in entries.flat_map(|r| r.ok()) {
            let path = entry.path();
            let state = match path.extension().and_then(|e| e.to_str()) {
                Some(QUEUED) => JobState::Queued,
                Some(RUNNING) => JobState::Running,
                _ => continue,
            };
            let id = match path.file_stem().and_then(|s| s.to_str())
                .and_then(|s| s.parse::<JobId>().ok()) {
                    Some(id) => id,
                    None => continue,
                };
            // Seen under both names: the run file is the newer one.
            let seen = jobs.entry(id).or_insert(state);
            if state == JobState::Running {
                *seen = JobState::Running;
            }
        }
        Ok(jobs)
    }

    /// Reads a job in whichever state it is in.  `None` means there is
    /// no such job.
    pub fn read_job(&self, id: JobId) -> Result<Option<Job>> {
        for &state in &[JobState::Queued, JobState::Running] {
            let path = self.path_for(id, state);
            if let Some(job) = self.read_file(id, state, &path)? {
                return Ok(Some(job));
            }
        }
        // It may have been requeued between the two reads.
        self.read_file(id, JobState::Queued, &self.path_for(id, JobState::Queued))
    }

    fn read_file(&self, id: JobId, state: JobState, path: &Path) -> Result<Option<Job>> {
        match fs::read_to_string(path) {
            Ok(text) => Job::parse(id, state, &text, path).map(Some),
            Err(ref e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::store("read", path, e)),
        }
    }

    pub fn exists(&self, id: JobId) -> bool {
        self.file(id, QUEUED).exists() || self.file(id, RUNNING).exists()
    }

    /// Deletes the job's file in whatever state.  Missing is fine.
    pub fn remove_job(&self, id: JobId) -> Result<()> {
        for ext in &[QUEUED, RUNNING] {
            remove_if_present(&self.file(id, ext))?;
        }
        Ok(())
    }

    /// Deletes the job only if it is still queued.  Returns false if it
    /// was not (never existed, or the daemon got to it first).
    pub fn remove_queued(&self, id: JobId) -> Result<bool> {
        let path = self.file(id, QUEUED);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(ref e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::store("remove", path, e)),
        }
    }

    /// Deletes the run file only.
    pub fn remove_running(&self, id: JobId) -> Result<()> {
        remove_if_present(&self.file(id, RUNNING))
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(ref e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::store("remove", path, e)),
    }
}

/// Writes `data` to a temporary sibling of `path`, flushes it to disk,
/// and renames it over `path`.
pub(crate) fn write_atomically(path: &Path, data: &[u8]) -> Result<()> {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()));
    let written = fs::File::create(&tmp)
        .and_then(|mut f| {
            f.write_all(data)?;
            f.sync_all()
        });
    if let Err(e) = written {
        fs::remove_file(&tmp).ok();
        return Err(Error::store("write", tmp, e));
    }
    fs::rename(&tmp, path).map_err(|e| {
        fs::remove_file(&tmp).ok();
        Error::store("rename into place", path, e)
    })
}
