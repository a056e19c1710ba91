//! Checkers for the plain-language adaptation tasks.
//!
//! Both tasks validate one JSON document against a reference testfile that
//! fixes the expected structure. Task 1 checks term labels against the
//! allowed label set and infers participation in the optional label and
//! label-text sub-tasks from the first term that reveals it. Task 2 checks
//! that the submitted abstracts mirror the reference sentence counts.

use anyhow::{bail, Error};
use runcheck_diagnostics::{ErrorLog, Location};
use serde_json::Value;

use crate::context::Participation;
use crate::readers::{read_json, ReadError};
use crate::reference::load_structure;
use crate::rules::id_string;
use crate::{CheckOpt, Checker};

const LABELS: [&str; 5] = ["SUBSTITUTE", "GENERALIZE", "EXPLAIN", "EXEMPLIFY", "OMIT"];

/// Parse the run file, logging a parse failure the way these tasks word it.
fn read_run(opt: &CheckOpt, log: &mut ErrorLog) -> Result<Option<Value>, Error> {
    match read_json(&opt.runfile) {
        Ok(doc) => Ok(Some(doc)),
        Err(ReadError::Json(e)) => {
            log.error(
                Location::None,
                format!("Couldn't parse run file as JSON ({e})"),
            )?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Checker for the term-labeling task.
#[derive(Debug, Default)]
pub struct PlabaTask1;

impl Checker for PlabaTask1 {
    fn name(&self) -> &'static str {
        "plaba1"
    }

    fn run(&self, opt: &CheckOpt, log: &mut ErrorLog) -> Result<(), Error> {
        let Some(testfile) = &opt.testfile else {
            log.error(Location::None, "Test file required.")?;
            return Ok(());
        };
        let test = load_structure(testfile, &opt.search_roots)?;
        let Some(test) = test.as_object() else {
            bail!("test file must be a JSON object");
        };
        let Some(data) = read_run(opt, log)? else {
            return Ok(());
        };

        // participation in the optional sub-tasks, frozen by the first term
        // that reveals each mode
        let mut labeled = Participation::default();
        let mut labeled_with_text = Participation::default();
        let none = Location::None;

        for akey in test.keys() {
            let Some(entry) = data.get(akey) else {
                log.error(none, format!("{akey} missing"))?;
                continue;
            };
            let Some(terms) = entry.as_object() else {
                // no labels at all for this document
                match labeled {
                    Participation::Yes => log.error(
                        none,
                        format!(
                            "To participate in the labeling task, all terms must have labels; missing in {akey}"
                        ),
                    )?,
                    Participation::Undetermined => {
                        labeled.freeze(false);
                    }
                    Participation::No => {}
                }
                continue;
            };

            for (term, replacements) in terms {
                let Some(replacements) = replacements.as_array() else {
                    log.error(
                        none,
                        format!(
                            "Value associated with term \"{term}\" in {akey} is a {}; must be an array",
                            crate::rules::type_name(replacements)
                        ),
                    )?;
                    continue;
                };

                match labeled {
                    Participation::No => log.error(
                        none,
                        format!(
                            "To participate in the labeling task, all terms must have labels; found labels for {term} in {akey} but not for the first term"
                        ),
                    )?,
                    Participation::Undetermined => {
                        labeled.freeze(true);
                    }
                    Participation::Yes => {}
                }

                for replacement in replacements {
                    let Some(replacement) = replacement.as_array() else {
                        log.error(
                            none,
                            format!("Label entry for term \"{term}\" in {akey} must be an array"),
                        )?;
                        continue;
                    };
                    if replacement.is_empty() {
                        log.error(
                            none,
                            format!("Term \"{term}\" in {akey} has empty label array"),
                        )?;
                        continue;
                    }
                    let label = id_string(&replacement[0]);
                    if !LABELS.contains(&label.as_str()) {
                        log.error(
                            none,
                            format!(
                                "Invalid label \"{label}\" for term \"{term}\" in {akey}; labels must be one of {{{}}}",
                                LABELS.join(",")
                            ),
                        )?;
                    }

                    let has_text = replacement.len() > 1
                        && replacement[1].as_str().is_some_and(|text| !text.is_empty());
                    if label != "OMIT" {
                        match labeled_with_text {
                            Participation::Yes if replacement.len() < 2 => log.error(
                                none,
                                format!(
                                    "To participate in the label-text task, all non-OMIT labels must be accompanied by text (no text for label {label} for term \"{term}\" in {akey})"
                                ),
                            )?,
                            Participation::No if replacement.len() > 1 => log.error(
                                none,
                                format!(
                                    "To participate in the label-text task, all non-OMIT labels must be accompanied by text (label {label} for term \"{term}\" in {akey} has text but the first label did not)"
                                ),
                            )?,
                            Participation::Undetermined => {
                                labeled_with_text.freeze(has_text);
                            }
                            _ => {}
                        }
                    } else if has_text {
                        log.warn(
                            none,
                            format!(
                                "Ignoring text entry for OMIT label for term \"{term}\" in {akey}"
                            ),
                        );
                    }

                    if replacement.len() > 2 {
                        log.error(
                            none,
                            format!(
                                "Too many items after label {label} for term \"{term}\" in {akey}; must be at most one more item"
                            ),
                        )?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Checker for the abstract-adaptation task.
#[derive(Debug, Default)]
pub struct PlabaTask2;

impl Checker for PlabaTask2 {
    fn name(&self) -> &'static str {
        "plaba2"
    }

    fn run(&self, opt: &CheckOpt, log: &mut ErrorLog) -> Result<(), Error> {
        let Some(testfile) = &opt.testfile else {
            log.error(Location::None, "Test file required.")?;
            return Ok(());
        };
        let test = load_structure(testfile, &opt.search_roots)?;
        let Some(test) = test.as_object() else {
            bail!("test file must be a JSON object");
        };
        let Some(data) = read_run(opt, log)? else {
            return Ok(());
        };
        let none = Location::None;

        for (qkey, qitem) in test {
            let Some(submitted) = data.get(qkey) else {
                log.error(none, format!("{qkey} missing"))?;
                continue;
            };
            let Some(submitted_abstracts) = submitted.get("abstracts") else {
                log.error(none, format!("Field \"abstracts\" missing from {qkey}"))?;
                continue;
            };
            let Some(expected_abstracts) = qitem.get("abstracts").and_then(Value::as_object)
            else {
                continue;
            };
            for (akey, aitem) in expected_abstracts {
                let Some(submitted_abstract) = submitted_abstracts.get(akey) else {
                    log.error(none, format!("{akey} not in {qkey}"))?;
                    continue;
                };
                let Some(sentences) = submitted_abstract
                    .get("sentences")
                    .and_then(Value::as_array)
                else {
                    log.error(
                        none,
                        format!("Field \"sentences\" missing from {qkey} {akey}"),
                    )?;
                    continue;
                };
                let expected = aitem
                    .get("sentences")
                    .and_then(Value::as_array)
                    .map(|s| s.len())
                    .unwrap_or(0);
                if expected != sentences.len() {
                    log.error(
                        none,
                        format!(
                            "{qkey} {akey} should have {expected} sentences but has {}",
                            sentences.len()
                        ),
                    )?;
                }
            }
        }
        Ok(())
    }
}
