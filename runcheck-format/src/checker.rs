//! The checker trait and the per-task registry.

use std::path::PathBuf;

use anyhow::Error;
use regex::Regex;
use runcheck_diagnostics::ErrorLog;

use crate::checkers;

/// Options shared by every checker invocation, assembled from the command
/// line by the driver.
#[derive(Debug, Clone)]
pub struct CheckOpt {
    /// Path of the submission to validate.
    pub runfile: PathBuf,
    /// File containing the reference ids, one per line.
    pub topicfile: Option<PathBuf>,
    /// JSON file describing the expected submission structure.
    pub testfile: Option<PathBuf>,
    /// Maximum number of documents allowed for a topic.
    pub maxret: usize,
    /// Pattern admitting topic ids when no topic file is given.
    pub topics: Option<Regex>,
    /// Pattern admitting document ids.
    pub docnos: Option<Regex>,
    /// Directories searched, in order, for reference files that are not
    /// found at the path given.
    pub search_roots: Vec<PathBuf>,
}

impl CheckOpt {
    /// Options for validating `runfile`, everything else defaulted.
    pub fn new(runfile: impl Into<PathBuf>) -> Self {
        Self {
            runfile: runfile.into(),
            topicfile: None,
            testfile: None,
            maxret: 1000,
            topics: None,
            docnos: None,
            search_roots: Vec::new(),
        }
    }
}

/// A validator for one submission format.
pub trait Checker: std::fmt::Debug {
    /// The registry tag naming this checker.
    fn name(&self) -> &'static str;

    /// Error threshold after which the run is aborted.
    fn max_errors(&self) -> usize {
        runcheck_diagnostics::DEFAULT_MAX_ERRORS
    }

    /// Validate the submission, recording every finding in `log`.
    ///
    /// `Err` means the pass stopped early: either the error threshold was
    /// crossed ([`TooManyErrors`](runcheck_diagnostics::TooManyErrors)
    /// somewhere in the chain) or the run itself could not proceed (missing
    /// reference data, unreadable submission). Validation findings are
    /// recorded in the log, never returned as `Err`.
    fn run(&self, opt: &CheckOpt, log: &mut ErrorLog) -> Result<(), Error>;
}

/// All the registered checkers, in registry order.
fn all_checkers() -> Vec<Box<dyn Checker>> {
    vec![
        Box::new(checkers::trec::TrecRun),
        Box::new(checkers::lateral::LateralQuestions),
        Box::new(checkers::vqa::VqaAnswers),
        Box::new(checkers::neuclir::NeuclirReport),
        Box::new(checkers::biogen::BiogenAnswers),
        Box::new(checkers::rag::RagResponses),
        Box::new(checkers::plaba::PlabaTask1),
        Box::new(checkers::plaba::PlabaTask2),
        Box::new(checkers::medvidqa::MedVidQaVideos),
        Box::new(checkers::medvidqa::MedVidQaSteps),
        Box::new(checkers::paper::PaperPdf),
    ]
}

/// Find the checker registered under `name`.
pub fn find_checker(name: &str) -> Option<Box<dyn Checker>> {
    all_checkers().into_iter().find(|c| c.name() == name)
}

/// The tags of all the registered checkers.
pub fn checker_names() -> Vec<&'static str> {
    all_checkers().iter().map(|c| c.name()).collect()
}
