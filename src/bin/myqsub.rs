#[macro_use]
extern crate clap;

use std::path::PathBuf;

use myqs::submit::{Outcome, Request, Submitter};
use myqs::{Config, JobStore, LockManager, OsProcesses, Queue};

fn main() {
    let m = clap::App::new("myqsub")
        .version(crate_version!())
        .about("MyQS, My Queuing System batch job submission.")
        .arg(clap::Arg::with_name("ncpus")
             .short("n")
             .takes_value(true)
             .value_name("NCPUS")
             .default_value("1")
             .hide_default_value(true)
             .help("Select CPU core slots to reserve for job. Default is 1."))
        .arg(clap::Arg::with_name("queue")
             .short("q")
             .takes_value(true)
             .value_name("QUEUE")
             .possible_values(&["normal", "express"])
             .default_value("normal")
             .hide_default_value(true)
             .help("Select \"normal\" or \"express\" queue. Default is \"normal\"."))
        .arg(clap::Arg::with_name("files")
             .index(1)
             .multiple(true)
             .required(true)
             .value_name("batch.sh")
             .help("Batch job file."))
        .get_matches();
    myqs::init_logging("warn");

    let ncpus = value_t!(m, "ncpus", u32).unwrap_or_else(|e| e.exit());
    if ncpus < 1 {
        fail("You must specify a positive integer for the number of cpus.");
    }
    let queue = value_t!(m, "queue", Queue).unwrap_or_else(|e| e.exit());
    let files: Vec<PathBuf> = m.values_of_os("files")
        .map(|v| v.map(PathBuf::from).collect())
        .unwrap_or_default();

    let config = Config::from_env().unwrap_or_else(|e| fail(e));
    let store = JobStore::open(&config.host_dir()).unwrap_or_else(|e| fail(e));
    let processes = OsProcesses;
    let locks = LockManager::new(store.dir(), &processes, config.lock_timeout);
    let submitter = Submitter::new(&store, locks);
    let request = Request::here(queue, ncpus).unwrap_or_else(|e| fail(e));

    let outcomes = submitter.submit_all(&files, &request).unwrap_or_else(|e| fail(e));
    for outcome in outcomes {
        match outcome {
            Outcome::Submitted(id) => {
                println!("Batch job with jobid {} has been submitted into MyQS.", id)
            }
            Outcome::Missing(path) => println!("MyQS cannot find {:?} batch file.", path),
            Outcome::Rejected(path, e) => println!("MyQS cannot submit {:?}: {}", path, e),
        }
    }
    match submitter.scheduler_running() {
        Ok(true) => (),
        Ok(false) => println!("MyQS batch job scheduler not running. Run \"myqsd\" command."),
        Err(e) => eprintln!("myqsub: {}", e),
    }
}

fn fail<E: std::fmt::Display>(e: E) -> ! {
    eprintln!("myqsub: {}", e);
    std::process::exit(1);
}
