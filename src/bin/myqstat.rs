#[macro_use]
extern crate clap;

use myqs::{Config, JobStore, LockManager, OsProcesses};

fn main() {
    let m = clap::App::new("myqstat")
        .version(crate_version!())
        .about("MyQS, My Queuing System batch job statistics.")
        .arg(clap::Arg::with_name("json")
             .long("json")
             .help("print the report as JSON"))
        .get_matches();
    myqs::init_logging("warn");

    // Best effort: this never fails the caller.
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("myqstat: {}", e);
            return;
        }
    };
    let store = JobStore::existing(&config.host_dir());
    let processes = OsProcesses;
    let locks = LockManager::new(store.dir(), &processes, None);
    let report = match myqs::status::report(&store, &locks, &processes, &config.hostname,
                                            &config.home, myqs::now()) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("myqstat: {}", e);
            return;
        }
    };
    if m.is_present("json") {
        match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("myqstat: {}", e),
        }
        return;
    }
    println!("\nMyQS {}, My Queuing System batch job statistics on HOST {:?}.\n",
             crate_version!(), report.hostname);
    print!("{}", report.table());
    println!();
    if !report.scheduler_running {
        println!("{}", report.scheduler_line());
    }
}
