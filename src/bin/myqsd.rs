#[macro_use]
extern crate clap;

use std::time::Duration;

use myqs::daemon::{self, DaemonOptions};
use myqs::Config;

const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

fn main() {
    let m = clap::App::new("myqsd")
        .version(crate_version!())
        .about("MyQS, My Queuing System batch scheduler daemon.")
        .arg(clap::Arg::with_name("slots")
             .index(1)
             .value_name("SLOTS")
             .help("The maximum number of CPU execution slots to create \
                    [default: physical cores]"))
        .arg(clap::Arg::with_name("foreground")
             .long("foreground")
             .short("f")
             .help("stay attached to the terminal instead of detaching"))
        .arg(clap::Arg::with_name("restart")
             .long("restart")
             .help("stop a running scheduler first"))
        .arg(clap::Arg::with_name("stop")
             .long("stop")
             .conflicts_with_all(&["restart", "foreground"])
             .help("stop the running scheduler and exit"))
        .arg(clap::Arg::with_name("requeue")
             .long("requeue")
             .help("requeue jobs left running by a previous scheduler instead of discarding them"))
        .arg(clap::Arg::with_name("interval")
             .long("interval")
             .short("i")
             .takes_value(true)
             .value_name("SECONDS")
             .default_value("1")
             .help("how often to look for work"))
        .get_matches();
    if m.is_present("foreground") {
        myqs::init_logging("info");
    } else {
        myqs::init_plain_logging("info");
    }

    let mut config = Config::from_env().unwrap_or_else(|e| fail(e));
    if m.is_present("slots") {
        let slots = value_t!(m, "slots", u32).unwrap_or_else(|e| e.exit());
        if slots < 1 {
            fail("You must specify a positive integer for the number of slots.");
        }
        config = config.with_slots(slots);
    } else if config.slots < 1 {
        config = config.with_slots(1);
    }
    let interval = value_t!(m, "interval", f64).unwrap_or_else(|e| e.exit());
    let interval = match Duration::try_from_secs_f64(interval) {
        Ok(d) if d > Duration::from_secs(0) && d <= MAX_INTERVAL => d,
        _ => fail("The poll interval must be a positive number of seconds, at most a day."),
    };
    config = config.with_poll_interval(interval);

    if m.is_present("stop") || m.is_present("restart") {
        match daemon::stop(&config) {
            Ok(Some(pid)) => println!("Stopping MyQS batch job scheduler (pid {})...", pid),
            Ok(None) => println!("MyQS batch job scheduler not running."),
            Err(e) => fail(e),
        }
        if m.is_present("stop") {
            return;
        }
    }

    let options = DaemonOptions {
        foreground: m.is_present("foreground"),
        requeue: m.is_present("requeue"),
    };
    println!("Starting MyQS batch job scheduler with {} slots...", config.slots);
    if let Err(e) = daemon::run(&config, &options) {
        fail(e);
    }
}

fn fail<E: std::fmt::Display>(e: E) -> ! {
    eprintln!("myqsd: {}", e);
    std::process::exit(1);
}
