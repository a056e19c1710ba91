//! Diagnostic records and the errlog sink shared by every run checker.
//!
//! A checker accumulates [`Diagnostic`]s into an [`ErrorLog`] bound to the
//! submission's `.errlog` sidecar file. Errors count toward a configurable
//! threshold; crossing it aborts the remaining validation pass by returning
//! [`TooManyErrors`] from [`ErrorLog::error`], which the caller propagates
//! with `?` up to the top-level driver.

#[macro_use]
extern crate log;

use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use colored::{Color, Colorize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default maximum number of errors before a run is aborted.
pub const DEFAULT_MAX_ERRORS: usize = 25;

/// How severe a diagnostic is.
#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// The submission violates a rule and cannot be accepted as-is.
    Error,
    /// Something looks off but does not invalidate the submission.
    Warning,
}

impl Severity {
    /// The uppercase tag this severity gets in the errlog.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
        }
    }

    /// The color of this severity on a terminal.
    pub fn color(&self) -> Color {
        match self {
            Severity::Error => Color::BrightRed,
            Severity::Warning => Color::BrightYellow,
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where in the submission a diagnostic points.
///
/// Line-oriented formats attribute findings to 1-based physical lines;
/// whole-document formats fall back to record indices or no position at all.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Location {
    /// 1-based line number in the submission file.
    Line(u64),
    /// 1-based index of the record inside a whole-document submission.
    Record(usize),
    /// No position is available.
    None,
}

impl Location {
    /// The ` Line <n>`/` Item <n>` clause of the errlog line, empty for `None`.
    fn clause(&self) -> String {
        match self {
            Location::Line(line) => format!(" Line {}", line),
            Location::Record(index) => format!(" Item {}", index),
            Location::None => String::new(),
        }
    }
}

/// A single validation finding. Immutable once appended to the log.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    severity: Severity,
    location: Location,
    message: String,
}

impl Diagnostic {
    /// Make a new error diagnostic.
    pub fn error(location: Location, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            location,
            message: message.into(),
        }
    }

    /// Make a new warning diagnostic.
    pub fn warning(location: Location, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            location,
            message: message.into(),
        }
    }

    /// The severity of this diagnostic.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Where this diagnostic points in the submission.
    pub fn location(&self) -> Location {
        self.location
    }

    /// The message of this diagnostic.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The errlog line with the severity tag colored for a terminal.
    pub fn terminal_line(&self) -> String {
        format!(
            "{}{}: {}",
            self.severity
                .as_str()
                .color(self.severity.color())
                .bold(),
            self.location.clause(),
            self.message
        )
    }
}

impl Display for Diagnostic {
    /// The plain errlog form: `ERROR Line <n>: <message>`.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}: {}",
            self.severity.as_str(),
            self.location.clause(),
            self.message
        )
    }
}

/// The error-count threshold was crossed: the validation pass must stop.
///
/// Returned by [`ErrorLog::error`] so that the abort is explicit in every
/// caller's control flow instead of unwinding through it.
#[derive(Debug, Clone, Error)]
#[error("stopping, too many errors ({count})")]
pub struct TooManyErrors {
    /// Number of errors accumulated when the threshold was crossed.
    pub count: usize,
}

/// Ordered accumulator of diagnostics for one checker invocation, bound to
/// the submission's `.errlog` sidecar file.
///
/// The log buffers records in memory; [`ErrorLog::close`] renders them to the
/// sidecar exactly once. The driver owns the close call and must reach it on
/// every exit path.
#[derive(Debug)]
pub struct ErrorLog {
    path: PathBuf,
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    max_errors: usize,
}

impl ErrorLog {
    /// Bind a new, empty log to `<runfile>.errlog`.
    pub fn new(runfile: &Path, max_errors: usize) -> Self {
        let mut name = runfile.as_os_str().to_owned();
        name.push(".errlog");
        Self {
            path: name.into(),
            diagnostics: Vec::new(),
            error_count: 0,
            max_errors,
        }
    }

    /// The path of the errlog sidecar file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an error record.
    ///
    /// Crossing the threshold appends a final "too many errors" record and
    /// returns `Err`; the caller must stop the pass. A pass producing exactly
    /// `max_errors` errors runs to completion.
    pub fn error(
        &mut self,
        location: Location,
        message: impl Into<String>,
    ) -> Result<(), TooManyErrors> {
        self.diagnostics.push(Diagnostic::error(location, message));
        self.error_count += 1;
        if self.error_count > self.max_errors {
            self.diagnostics.push(Diagnostic::error(
                Location::None,
                "Stopping, too many errors",
            ));
            return Err(TooManyErrors {
                count: self.error_count,
            });
        }
        Ok(())
    }

    /// Append a warning record. Warnings never count toward the threshold.
    pub fn warn(&mut self, location: Location, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::warning(location, message));
    }

    /// Number of errors recorded so far.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// All the records appended so far, in insertion order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Render the log to the sidecar file, one record per line, or the
    /// literal `No errors` when nothing was ever appended.
    pub fn close(self) -> std::io::Result<()> {
        debug!(
            "Writing {} diagnostics to {}",
            self.diagnostics.len(),
            self.path.display()
        );
        let file = File::create(&self.path)?;
        let mut out = BufWriter::new(file);
        if self.diagnostics.is_empty() {
            writeln!(out, "No errors")?;
        } else {
            for diagnostic in &self.diagnostics {
                writeln!(out, "{}", diagnostic)?;
            }
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn log_in(dir: &Path, max_errors: usize) -> ErrorLog {
        ErrorLog::new(&dir.join("submission.jsonl"), max_errors)
    }

    fn contents(log: ErrorLog) -> String {
        let path = log.path().to_owned();
        log.close().unwrap();
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn no_errors_literal_when_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = log_in(dir.path(), DEFAULT_MAX_ERRORS);
        assert_eq!(contents(log), "No errors\n");
    }

    #[test]
    fn records_are_rendered_in_insertion_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut log = log_in(dir.path(), DEFAULT_MAX_ERRORS);
        log.warn(Location::Line(1), "looks odd");
        log.error(Location::Line(2), "missing field").unwrap();
        log.error(Location::None, "bad trailer").unwrap();
        assert_eq!(
            contents(log),
            "WARNING Line 1: looks odd\n\
             ERROR Line 2: missing field\n\
             ERROR: bad trailer\n"
        );
    }

    #[test]
    fn warnings_do_not_count_toward_the_threshold() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut log = log_in(dir.path(), 2);
        for _ in 0..10 {
            log.warn(Location::None, "meh");
        }
        assert_eq!(log.error_count(), 0);
    }

    #[test]
    fn threshold_aborts_only_past_the_limit() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut log = log_in(dir.path(), 3);
        for i in 0..3u64 {
            log.error(Location::Line(i + 1), "bad").unwrap();
        }
        // the limit itself completes; one more aborts
        let err = log.error(Location::Line(4), "bad").unwrap_err();
        assert_eq!(err.count, 4);
        let text = contents(log);
        assert!(text.ends_with("ERROR: Stopping, too many errors\n"), "{text}");
    }

    #[test]
    fn sidecar_path_is_runfile_plus_errlog() {
        let log = ErrorLog::new(Path::new("/tmp/runs/myrun.txt"), 25);
        assert_eq!(log.path(), Path::new("/tmp/runs/myrun.txt.errlog"));
    }

    #[test]
    fn item_locations_render_as_item() {
        let diag = Diagnostic::error(Location::Record(3), "not a dictionary");
        assert_eq!(diag.to_string(), "ERROR Item 3: not a dictionary");
    }
}
