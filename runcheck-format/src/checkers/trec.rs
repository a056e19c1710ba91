//! Checker for standard retrieval runs.
//!
//! Six whitespace-separated fields per line: topic, Q0, docno, rank, score,
//! runtag. Checks for:
//! - missing or non-matching runtag
//! - incorrect or missing topics
//! - malformed ranks and document numbers
//! - documents retrieved more than once for a topic
//!
//! A line with the wrong field count aborts the run: column semantics are
//! undefined from there on.

use anyhow::Error;
use regex::{Regex, RegexBuilder};
use runcheck_diagnostics::{ErrorLog, Location};

use crate::context::{Observation, Runtag};
use crate::readers::{BadLine, DelimitedFormat, Delimiter, Flow};
use crate::reference::TopicRegistry;
use crate::rules::{full_match, prefix_match};
use crate::{CheckOpt, Checker};

lazy_static! {
    static ref DEFAULT_TOPICS: Regex = RegexBuilder::new(r"\d+")
        .case_insensitive(true)
        .build()
        .unwrap();
    static ref DEFAULT_DOCNOS: Regex = RegexBuilder::new(r"\w+")
        .case_insensitive(true)
        .build()
        .unwrap();
}

/// Checker for standard six-field retrieval runs.
#[derive(Debug, Default)]
pub struct TrecRun;

impl Checker for TrecRun {
    fn name(&self) -> &'static str {
        "trec"
    }

    fn run(&self, opt: &CheckOpt, log: &mut ErrorLog) -> Result<(), Error> {
        let has_topicfile = opt.topicfile.is_some();
        let mut topics = match &opt.topicfile {
            Some(path) => TopicRegistry::from_file(path, &opt.search_roots)?,
            None => TopicRegistry::default(),
        };
        let topics_re = opt.topics.as_ref().unwrap_or(&DEFAULT_TOPICS);
        let docnos_re = opt.docnos.as_ref().unwrap_or(&DEFAULT_DOCNOS);
        let file_stem = opt
            .runfile
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut runtag = Runtag::default();
        let mut warned_about_q0 = false;

        let format = DelimitedFormat {
            delimiter: Delimiter::Whitespace,
            fields: 6,
            on_bad_line: BadLine::Fatal,
        };
        let outcome = format.for_each_record(&opt.runfile, log, |record, log| {
            let line = Location::Line(record.line);
            let (topic, q0, docno, rank) = (
                record.fields[0].as_str(),
                record.fields[1].as_str(),
                record.fields[2].as_str(),
                record.fields[3].as_str(),
            );
            let tag = record.fields[5].as_str();

            match runtag.observe(tag) {
                Observation::Mismatch(canonical) => {
                    log.error(
                        line,
                        format!("Run tag inconsistent (\"{tag}\" instead of \"{canonical}\")"),
                    )?;
                }
                Observation::Match if tag != file_stem => {
                    log.error(line, "Runtag does not match file")?;
                    // catastrophic fail, stop checking
                    return Ok(Flow::Abort);
                }
                _ => {}
            }

            if !topics.contains(topic) {
                if has_topicfile {
                    log.error(line, format!("Unknown test topic ({topic})"))?;
                    // end checks for this line
                    return Ok(Flow::Continue);
                } else if prefix_match(topics_re, topic) {
                    topics.admit(topic);
                } else {
                    log.error(line, format!("Unknown test topic ({topic})"))?;
                }
            }

            if q0 != "Q0" && !warned_about_q0 {
                log.error(line, format!("Field 2 is \"{q0}\" and not Q0"))?;
                // if they got it wrong on one line, it's probably on all of them
                warned_about_q0 = true;
            }

            // rank must be a non-negative integer in canonical form
            match rank.parse::<i64>() {
                Ok(value) if value >= 0 && value.to_string() == rank => {}
                _ => {
                    log.error(
                        line,
                        format!("Column 4 (rank) {rank} must be a positive integer"),
                    )?;
                }
            }

            if full_match(docnos_re, docno) {
                if !topics.record_doc(topic, docno) {
                    log.error(
                        line,
                        format!("{docno} retrieved more than once for topic {topic}"),
                    )?;
                    return Ok(Flow::Continue);
                }
            } else {
                log.error(line, format!("Unrecognized docno {docno}"))?;
                return Ok(Flow::Continue);
            }
            topics.tally(topic);
            Ok(Flow::Continue)
        })?;

        if let Flow::Abort = outcome.flow {
            return Ok(());
        }
        let last = Location::Line(outcome.lines);
        for (topic, count) in topics.iter() {
            if count == 0 {
                log.error(last, format!("No documents retrieved for topic {topic}"))?;
            } else if count > opt.maxret {
                log.error(
                    last,
                    format!("Too many documents ({count}) retrieved for topic {topic}"),
                )?;
            }
        }
        Ok(())
    }
}
