//! Checker for biomedical generation runs.
//!
//! One JSON document with the run metadata and a `results` array of
//! per-topic answers. Checks for:
//! - missing metadata fields
//! - incorrect or missing topics
//! - malformed or duplicate references
//! - citations not backed by the references list
//! - generation length over the cap
//!
//! Length is measured in NFKC-normalized whitespace tokens and an
//! over-length answer is repaired by trimming trailing sentences, not
//! rejected. The error threshold is large enough for a full pass over all
//! 65 topics.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use anyhow::Error;
use regex::Regex;
use runcheck_diagnostics::{ErrorLog, Location};
use serde_json::Value;

use crate::readers::{read_json, ReadError};
use crate::reference::TopicRegistry;
use crate::rules::{full_match, id_string, nfkc_tokens, repair_answer_length, require};
use crate::{CheckOpt, Checker};

lazy_static! {
    static ref DOCNO_RE: Regex = Regex::new(r"^\d+$").unwrap();
    static ref CITE_RE: Regex = Regex::new(r"\[(\d+?)\]").unwrap();
}

const TOPIC_RANGE: RangeInclusive<u32> = 116..=180;
const MAX_REFERENCES: usize = 3;
const MAX_ANSWER_TOKENS: usize = 400;

/// Checker for biomedical generation runs.
#[derive(Debug, Default)]
pub struct BiogenAnswers;

impl Checker for BiogenAnswers {
    fn name(&self) -> &'static str {
        "biogen"
    }

    fn max_errors(&self) -> usize {
        930
    }

    fn run(&self, opt: &CheckOpt, log: &mut ErrorLog) -> Result<(), Error> {
        let mut topics = TopicRegistry::from_range(TOPIC_RANGE);

        let doc = match read_json(&opt.runfile) {
            Ok(doc) => doc,
            Err(ReadError::Json(e)) => {
                log.error(
                    Location::None,
                    format!(
                        "Error parsing JSON at line {} column {}",
                        e.line(),
                        e.column()
                    ),
                )?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let root = Location::Record(1);
        for key in ["team_id", "run_name", "contact_email"] {
            require(&doc, key, root, log)?;
        }
        let Some(results) = require(&doc, "results", root, log)? else {
            return Ok(());
        };
        let Some(results) = results.as_array() else {
            log.error(root, "\"results\" must be a list")?;
            return Ok(());
        };

        for (index, output) in results.iter().enumerate() {
            let item = Location::Record(index + 1);
            let Some(topic_id) = require(output, "topic_id", item, log)?.map(id_string) else {
                continue;
            };
            if !topics.contains(&topic_id) {
                log.error(item, format!("Invalid topic ID {topic_id}"))?;
            }
            topics.tally(&topic_id);

            let Some(references) = require(output, "references", item, log)? else {
                continue;
            };
            let mut refs: HashSet<String> = HashSet::new();
            match references.as_array() {
                Some(list) => {
                    for reference in list {
                        let reference = id_string(reference);
                        if !full_match(&DOCNO_RE, &reference) {
                            log.error(
                                item,
                                format!(
                                    "Invalid reference docno {reference} for topic {topic_id}"
                                ),
                            )?;
                        } else if refs.contains(&reference) {
                            log.error(
                                item,
                                format!(
                                    "Duplicate document {reference} in references for topic {topic_id}"
                                ),
                            )?;
                        } else if refs.len() >= MAX_REFERENCES {
                            log.warn(
                                item,
                                format!(
                                    "Too many references (max {MAX_REFERENCES}), extras ignored for topic {topic_id}"
                                ),
                            );
                        } else {
                            refs.insert(reference);
                        }
                    }
                }
                None => log.error(item, "\"references\" must be a list")?,
            }

            let Some(answer) = require(output, "answer", item, log)? else {
                continue;
            };
            let Some(answer) = answer.as_array() else {
                log.error(item, "\"answer\" must be a list of sentences")?;
                continue;
            };

            let mut sentences = answer.clone();
            let length: usize = sentences
                .iter()
                .map(|s| nfkc_tokens(s.get("text").and_then(Value::as_str).unwrap_or("")))
                .sum();
            if length > MAX_ANSWER_TOKENS {
                repair_answer_length(&mut sentences, length, MAX_ANSWER_TOKENS, item, log);
            }

            for sentence in &sentences {
                let text = sentence.get("text").and_then(Value::as_str).unwrap_or("");
                for capture in CITE_RE.captures_iter(text) {
                    if !refs.contains(&capture[1]) {
                        log.error(
                            item,
                            format!(
                                "Answer for topic {topic_id} has a citation that is not in the references list."
                            ),
                        )?;
                    }
                }
            }
        }

        for (topic, count) in topics.iter() {
            if count == 0 {
                log.error(Location::None, format!("No answers for topic {topic}"))?;
            }
        }
        Ok(())
    }
}
