#![allow(dead_code)]

use runcheck_diagnostics::{ErrorLog, Location, TooManyErrors};
use runcheck_format::{find_checker, CheckOpt};

/// Result of a full checker invocation, driver-style.
pub struct Verdict {
    /// Whether the run validated clean (exit code 0).
    pub clean: bool,
    /// The errlog sidecar contents.
    pub errlog: String,
}

impl Verdict {
    /// The errlog lines tagged ERROR.
    pub fn error_lines(&self) -> Vec<&str> {
        self.errlog
            .lines()
            .filter(|line| line.starts_with("ERROR"))
            .collect()
    }
}

/// Run the checker registered under `tag` the way the driver does: findings
/// land in the errlog, failures are recorded rather than propagated, and the
/// log is closed exactly once.
pub fn run_checker(tag: &str, opt: &CheckOpt) -> Verdict {
    let checker = find_checker(tag).expect("unknown checker tag");
    let mut log = ErrorLog::new(&opt.runfile, checker.max_errors());
    if let Err(e) = checker.run(opt, &mut log) {
        if e.downcast_ref::<TooManyErrors>().is_none() {
            let _ = log.error(Location::None, format!("{e:#}"));
        }
    }
    let clean = log.error_count() == 0;
    let path = log.path().to_owned();
    log.close().expect("cannot write the errlog");
    Verdict {
        clean,
        errlog: std::fs::read_to_string(path).expect("cannot read the errlog"),
    }
}
