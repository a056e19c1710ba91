use std::path::{Path, PathBuf};

use clap::Parser;
use regex::{Regex, RegexBuilder};
use runcheck_format::{checker_names, CheckOpt};

/// Validate a participant-submitted run file against a task's format rules.
///
/// The verdict is the exit code: 0 when the submission is clean, 255 when it
/// has errors. Every finding is written to `<runfile>.errlog`.
#[derive(Parser, Debug)]
#[clap(name = "runcheck", version)]
pub struct Opt {
    /// Which checker to run.
    #[clap(long_help = checker_long_help())]
    pub checker: String,

    /// The submission file to validate.
    pub runfile: PathBuf,

    /// File containing the reference topic/request ids, one per line.
    #[clap(short = 'f', long = "topicfile")]
    pub topicfile: Option<PathBuf>,

    /// JSON file describing the expected submission structure.
    #[clap(short = 't', long = "testfile")]
    pub testfile: Option<PathBuf>,

    /// Maximum number of documents allowed for a topic.
    #[clap(short = 'm', long = "maxret", default_value = "1000")]
    pub maxret: usize,

    /// Regular expression for topic ids, case-insensitive.
    #[clap(long = "topics", value_parser = parse_pattern)]
    pub topics: Option<Regex>,

    /// Regular expression for document ids, case-insensitive.
    #[clap(short = 'd', long = "docnos", value_parser = parse_pattern)]
    pub docnos: Option<Regex>,

    #[clap(flatten)]
    pub logger: LoggerOpt,
}

#[derive(Parser, Debug, Clone)]
pub struct LoggerOpt {
    /// Verbose mode (-v, -vv, -vvv, etc.). Also echoes the findings to
    /// stderr.
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl LoggerOpt {
    /// Configure the global logger based on the verbosity level.
    pub fn enable_log(&self) {
        let mut builder = env_logger::Builder::from_default_env();
        match self.verbose {
            0 => {}
            1 => {
                builder.filter_level(log::LevelFilter::Info);
            }
            2 => {
                builder.filter_level(log::LevelFilter::Debug);
            }
            _ => {
                builder.filter_level(log::LevelFilter::Trace);
            }
        }
        builder.format_timestamp_nanos().init();
    }
}

impl Opt {
    /// Make a `CheckOpt` from these command line options.
    pub fn to_check_opt(&self) -> CheckOpt {
        let mut opt = CheckOpt::new(&self.runfile);
        opt.topicfile = self.topicfile.clone();
        opt.testfile = self.testfile.clone();
        opt.maxret = self.maxret;
        opt.topics = self.topics.clone();
        opt.docnos = self.docnos.clone();
        opt.search_roots = exe_dir().into_iter().collect();
        opt
    }
}

/// The historical checkers compile their patterns case-insensitively.
fn parse_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Directory of the running binary, used as the fallback search root for
/// reference files: checkers run from the submission's directory, but the
/// reference data lives next to the checker.
fn exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_owned))
}

/// Returns the long-help for the checker argument.
fn checker_long_help() -> &'static str {
    lazy_static! {
        static ref DOC: String = format!(
            "Which checker to run.\n\nThe available checkers are: {}.",
            checker_names().join(", ")
        );
    }
    &DOC
}
