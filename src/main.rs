#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

mod opt;

use std::process::exit;

use clap::Parser;
use runcheck_diagnostics::{ErrorLog, Location, TooManyErrors};
use runcheck_format::{checker_names, find_checker};

use crate::opt::Opt;

/// Exit code reported when the submission has errors or the checker fails.
const EXIT_FAILURE: i32 = 255;

fn main() {
    let opt = Opt::parse();
    opt.logger.enable_log();

    let Some(checker) = find_checker(&opt.checker) else {
        eprintln!(
            "Unknown checker '{}'. The available checkers are: {}.",
            opt.checker,
            checker_names().join(", ")
        );
        exit(2);
    };

    let mut log = ErrorLog::new(&opt.runfile, checker.max_errors());
    println!("Writing errors to {}", log.path().display());

    let check_opt = opt.to_check_opt();
    if let Err(e) = checker.run(&check_opt, &mut log) {
        if e.downcast_ref::<TooManyErrors>().is_some() {
            debug!("validation aborted: {e}");
        } else {
            // the failure goes in the errlog too
            debug!("checker failed: {e:?}");
            let _ = log.error(Location::None, format!("{e:#}"));
        }
    }

    if opt.logger.verbose > 0 {
        for diagnostic in log.diagnostics() {
            eprintln!("{}", diagnostic.terminal_line());
        }
    }

    let failed = log.error_count() > 0;
    if let Err(e) = log.close() {
        eprintln!("Error: cannot write the error log: {e}");
        exit(EXIT_FAILURE);
    }
    exit(if failed { EXIT_FAILURE } else { 0 });
}
