use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// A job identifier, in `1..=32767`.
pub type JobId = u32;

#[derive(Serialize, Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Queue {
    // Declaration order is dispatch priority.
    Express,
    Normal,
}

impl Queue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Queue::Express => "express",
            Queue::Normal => "normal",
        }
    }
}

impl Default for Queue {
    fn default() -> Queue {
        Queue::Normal
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Queue {
    type Err = Error;
    fn from_str(s: &str) -> Result<Queue> {
        match s {
            "normal" => Ok(Queue::Normal),
            "express" => Ok(Queue::Express),
            _ => Err(Error::InvalidArgument(
                format!("Cannot submit to non-existent queue {:?}.", s))),
        }
    }
}

/// Where a job is in its lifecycle.  `Stopped` is never stored: it is
/// what a run-file whose process group has vanished looks like to a reader.
#[derive(Serialize, Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    Queued,
    Running,
    Stopped,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            JobState::Queued => "QUEUED",
            JobState::Running => "RUNNING",
            JobState::Stopped => "STOPPED",
        })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub command: PathBuf,
    pub directory: PathBuf,
    pub path_env: String,
    pub queue: Queue,
    pub ncpus: u32,
    pub state: JobState,
    /// Epoch seconds at dispatch.
    pub start: Option<f64>,
    pub pgid: Option<u32>,
}

const COMMAND: &str = "COMMAND";
const DIRECTORY: &str = "DIRECTORY";
const PATH: &str = "PATH";
const QUEUE: &str = "QUEUE";
const NCPUS: &str = "NCPUS";
const START: &str = "START";
const PGID: &str = "PGID";

impl Job {
    pub fn new(id: JobId, command: PathBuf, directory: PathBuf, path_env: String,
               queue: Queue, ncpus: u32) -> Result<Job> {
        if ncpus < 1 {
            return Err(Error::InvalidArgument(
                "You must specify a positive integer for the number of cpus.".to_string()));
        }
        for (key, value) in &[(COMMAND, command.to_string_lossy()),
                              (DIRECTORY, directory.to_string_lossy())] {
            if value.contains('\n') {
                return Err(Error::InvalidArgument(
                    format!("{} {:?} cannot contain a newline.", key, value)));
            }
        }
        if path_env.contains('\n') {
            return Err(Error::InvalidArgument("PATH cannot contain a newline.".to_string()));
        }
        Ok(Job {
            id,
            command,
            directory,
            path_env,
            queue,
            ncpus,
            state: JobState::Queued,
            start: None,
            pgid: None,
        })
    }

    /// The `KEY=value` lines stored in the job's queue or run file.
    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}={}\n", COMMAND, self.command.display()));
        out.push_str(&format!("{}={}\n", DIRECTORY, self.directory.display()));
        out.push_str(&format!("{}={}\n", PATH, self.path_env));
        out.push_str(&format!("{}={}\n", QUEUE, self.queue));
        out.push_str(&format!("{}={}\n", NCPUS, self.ncpus));
        if let Some(start) = self.start {
            out.push_str(&format!("{}={}\n", START, start));
        }
        if let Some(pgid) = self.pgid {
            out.push_str(&format!("{}={}\n", PGID, pgid));
        }
        out
    }

    /// Parses a descriptor.  `path` is only used for error messages.
    /// Unknown keys and lines without `=` are ignored, and a malformed
    /// `START` or `PGID` is treated as absent.
    pub fn parse(id: JobId, state: JobState, text: &str, path: &Path) -> Result<Job> {
        let invalid = |reason: String| Error::InvalidJob { path: path.to_path_buf(), reason };
        let mut command = None;
        let mut directory = None;
        let mut path_env = String::new();
        let mut queue = None;
        let mut ncpus = None;
        let mut start = None;
        let mut pgid = None;
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            let mut kv = line.splitn(2, '=');
            let (key, value) = match (kv.next(), kv.next()) {
                (Some(k), Some(v)) => (k.trim(), v),
                _ => continue,
            };
            match key {
                COMMAND => command = Some(PathBuf::from(value)),
                DIRECTORY => directory = Some(PathBuf::from(value)),
                PATH => path_env = value.to_string(),
                QUEUE => queue = Some(value.parse::<Queue>()
                                      .map_err(|e| invalid(e.to_string()))?),
                NCPUS => ncpus = Some(value.trim().parse::<u32>()
                                      .map_err(|e| invalid(format!("NCPUS={}: {}", value, e)))?),
                START => start = value.trim().parse::<f64>().ok(),
                PGID => pgid = value.trim().parse::<u32>().ok(),
                _ => (),
            }
        }
        let ncpus = ncpus.ok_or_else(|| invalid("missing NCPUS".to_string()))?;
        if ncpus < 1 {
            return Err(invalid("NCPUS must be at least 1".to_string()));
        }
        Ok(Job {
            id,
            command: command.ok_or_else(|| invalid("missing COMMAND".to_string()))?,
            directory: directory.ok_or_else(|| invalid("missing DIRECTORY".to_string()))?,
            path_env,
            queue: queue.ok_or_else(|| invalid("missing QUEUE".to_string()))?,
            ncpus,
            state,
            start,
            pgid,
        })
    }

    /// Where the job's output goes: `<directory>/<command name>.o<id>`,
    /// falling back to `home` when the directory has gone away.
    pub fn logfile(&self, home: &Path) -> PathBuf {
        let name = match self.command.file_name() {
            Some(n) => n.to_string_lossy().into_owned(),
            None => self.command.to_string_lossy().into_owned(),
        };
        let name = format!("{}.o{}", name, self.id);
        if self.directory.is_dir() {
            self.directory.join(name)
        } else {
            home.join(name)
        }
    }

    /// Whole minutes since dispatch, if the job has started.
    pub fn elapsed_minutes(&self, now: f64) -> Option<u64> {
        self.start.map(|s| if now > s { ((now - s) / 60.0) as u64 } else { 0 })
    }

    /// Dispatch order: express before normal, then ascending id.
    pub fn priority(&self) -> (Queue, JobId) {
        (self.queue, self.id)
    }
}
