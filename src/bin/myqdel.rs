#[macro_use]
extern crate clap;

use myqs::{Config, JobId, JobState, JobStore, OsProcesses, Processes};

fn main() {
    let m = clap::App::new("myqdel")
        .version(crate_version!())
        .about("MyQS, My Queuing System batch job deletion.")
        .arg(clap::Arg::with_name("kill")
             .short("k")
             .help("Kill a running job's process group."))
        .arg(clap::Arg::with_name("jobids")
             .index(1)
             .multiple(true)
             .required(true)
             .value_name("JOBID")
             .help("Batch job id."))
        .get_matches();
    myqs::init_logging("warn");

    let ids = values_t!(m, "jobids", JobId).unwrap_or_else(|e| e.exit());
    let config = Config::from_env().unwrap_or_else(|e| fail(e));
    let store = JobStore::existing(&config.host_dir());
    let processes = OsProcesses;
    let kill = m.is_present("kill");
    let mut failed = false;
    for id in ids {
        match delete(&store, &processes, id, kill) {
            Ok(true) => (),
            Ok(false) => failed = true,
            Err(e) => {
                eprintln!("myqdel: {}", e);
                failed = true;
            }
        }
    }
    if failed {
        std::process::exit(1);
    }
}

/// Returns false if a kill was requested and could not be delivered.
fn delete(store: &JobStore, processes: &OsProcesses, id: JobId, kill: bool)
          -> myqs::Result<bool> {
    if store.remove_queued(id)? {
        println!("Batch job with jobid {} has been deleted from MyQS.", id);
        return Ok(true);
    }
    match store.read_job(id)? {
        Some(ref job) if job.state == JobState::Running => {
            if !kill {
                println!("MyQS cannot delete batch job with jobid {} as it is running.", id);
                return Ok(true);
            }
            match job.pgid {
                Some(pgid) => {
                    let group = processes.job_handle(pgid);
                    if group.is_alive() {
                        if let Err(e) = group.terminate() {
                            eprintln!("myqdel: cannot kill batch job {}: {}", id, e);
                            return Ok(false);
                        }
                    }
                    println!("Batch job with jobid {} has been killed.", id);
                }
                // Dispatched but not yet started: nothing to signal.
                None => println!("MyQS cannot kill batch job with jobid {} as it is starting.",
                                 id),
            }
        }
        // Requeued by the daemon since the first attempt.
        Some(_) => {
            if store.remove_queued(id)? {
                println!("Batch job with jobid {} has been deleted from MyQS.", id);
            }
        }
        None => println!("MyQS cannot delete batch job with jobid {} as it does not exist.", id),
    }
    Ok(true)
}

fn fail<E: std::fmt::Display>(e: E) -> ! {
    eprintln!("myqdel: {}", e);
    std::process::exit(1);
}
