//! Checkers for medical video question-answering predictions.
//!
//! Two sibling formats share one shape: a JSON list with a fixed number of
//! prediction items, each carrying an id and a non-empty list of nested
//! objects with required, non-empty, partly numeric fields. Payloads must be
//! plain ASCII.

use anyhow::Error;
use runcheck_diagnostics::{ErrorLog, Location, TooManyErrors};
use serde_json::Value;

use crate::readers::{read_json, ReadError};
use crate::rules::{id_string, is_blank};
use crate::{CheckOpt, Checker};

/// Parse the run file, which must hold one JSON list.
fn read_items(opt: &CheckOpt, log: &mut ErrorLog) -> Result<Option<Vec<Value>>, Error> {
    let doc = match read_json(&opt.runfile) {
        Ok(doc) => doc,
        Err(ReadError::Json(_)) => {
            log.error(Location::None, "File is not JSON")?;
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    match doc {
        Value::Array(items) => Ok(Some(items)),
        _ => {
            log.error(Location::None, "Top-level JSON must be a list.")?;
            Ok(None)
        }
    }
}

/// Report every non-ASCII payload value, one error per offending field.
fn check_ascii(items: &[Value], log: &mut ErrorLog) -> Result<(), TooManyErrors> {
    for (index, item) in items.iter().enumerate() {
        let Some(fields) = item.as_object() else {
            continue;
        };
        for value in fields.values() {
            let rendered = id_string(value);
            if !rendered.is_ascii() {
                log.error(
                    Location::Record(index + 1),
                    format!("Non-ascii characters in the file: {rendered}"),
                )?;
            }
        }
    }
    Ok(())
}

/// Check one required, non-empty, numeric field of a nested object.
fn check_numeric_field(
    obj: &Value,
    key: &str,
    owner: &str,
    location: Location,
    log: &mut ErrorLog,
) -> Result<(), TooManyErrors> {
    match obj.get(key) {
        None => log.error(location, format!("Missing \"{key}\" field for {owner}"))?,
        Some(value) if is_blank(Some(value)) => log.error(
            location,
            format!("\"{key}\" field cannot be empty for {owner}"),
        )?,
        Some(value) if !value.is_number() => log.error(
            location,
            format!("\"{key}\" field must be a number for {owner}"),
        )?,
        _ => {}
    }
    Ok(())
}

/// Checker for the video-retrieval predictions.
#[derive(Debug, Default)]
pub struct MedVidQaVideos;

/// Expected number of questions in a complete submission.
const EXPECTED_QUESTIONS: usize = 52;

impl Checker for MedVidQaVideos {
    fn name(&self) -> &'static str {
        "medvidqa"
    }

    fn run(&self, opt: &CheckOpt, log: &mut ErrorLog) -> Result<(), Error> {
        let Some(items) = read_items(opt, log)? else {
            return Ok(());
        };
        if items.len() != EXPECTED_QUESTIONS {
            log.error(
                Location::None,
                format!(
                    "Submission does not have predictions for all {EXPECTED_QUESTIONS} questions"
                ),
            )?;
        }

        for (index, item) in items.iter().enumerate() {
            let loc = Location::Record(index + 1);
            if item.get("question_id").is_none() {
                log.error(loc, "Entry is missing \"question_id\" field.")?;
                continue;
            }
            if is_blank(item.get("question_id")) {
                log.error(loc, "\"question_id\" field cannot be empty")?;
            }
            let question = id_string(&item["question_id"]);
            let owner = format!("question id {question}");

            let Some(videos) = item.get("relevant_videos") else {
                log.error(loc, "Entry is missing \"relevant_videos\" field.")?;
                continue;
            };
            let Some(videos) = videos.as_array() else {
                log.error(loc, format!("\"relevant_videos\" must be a list for {owner}"))?;
                continue;
            };
            if videos.is_empty() {
                log.error(loc, format!("Entry has zero relevant videos for {owner}"))?;
            }
            for video in videos {
                if !video.is_object() {
                    log.error(
                        loc,
                        format!("One of the relevant videos for {owner} is not a dictionary"),
                    )?;
                    continue;
                }
                if video.get("video_id").is_none() {
                    log.error(loc, format!("Missing \"video_id\" field for {owner}"))?;
                } else if is_blank(video.get("video_id")) {
                    log.error(loc, "\"video_id\" field cannot be empty")?;
                }
                check_numeric_field(video, "relevant_score", &owner, loc, log)?;
                check_numeric_field(video, "answer_start_second", &owner, loc, log)?;
                check_numeric_field(video, "answer_end_second", &owner, loc, log)?;
            }
        }
        check_ascii(&items, log)?;
        Ok(())
    }
}

/// Checker for the step-captioning predictions.
#[derive(Debug, Default)]
pub struct MedVidQaSteps;

/// Expected number of video segments in a complete submission.
const EXPECTED_SEGMENTS: usize = 90;

impl Checker for MedVidQaSteps {
    fn name(&self) -> &'static str {
        "medvidqa-steps"
    }

    fn run(&self, opt: &CheckOpt, log: &mut ErrorLog) -> Result<(), Error> {
        let Some(items) = read_items(opt, log)? else {
            return Ok(());
        };
        if items.len() != EXPECTED_SEGMENTS {
            log.error(
                Location::None,
                format!(
                    "Submission does not have predictions for all {EXPECTED_SEGMENTS} segments"
                ),
            )?;
        }

        for (index, item) in items.iter().enumerate() {
            let loc = Location::Record(index + 1);
            if item.get("sample_id").is_none() {
                log.error(loc, "Entry is missing \"sample_id\" field.")?;
                continue;
            }
            if is_blank(item.get("sample_id")) {
                log.error(loc, "\"sample_id\" field cannot be empty")?;
            }
            let sample = id_string(&item["sample_id"]);
            let owner = format!("sample id {sample}");

            let Some(steps) = item.get("steps_list") else {
                log.error(loc, "Entry is missing \"steps_list\" field.")?;
                continue;
            };
            let Some(steps) = steps.as_array() else {
                log.error(loc, format!("\"steps_list\" must be a list for {owner}"))?;
                continue;
            };
            if steps.is_empty() {
                log.error(loc, format!("Entry has an empty steps list for {owner}"))?;
            }
            for step in steps {
                if !step.is_object() {
                    log.error(
                        loc,
                        format!("One of the steps for {owner} is not a dictionary"),
                    )?;
                    continue;
                }
                for key in ["step_caption", "step_caption_start", "step_caption_end"] {
                    match step.get(key) {
                        None => {
                            log.error(loc, format!("Missing \"{key}\" field for {owner}"))?
                        }
                        Some(value) if is_blank(Some(value)) => log.error(
                            loc,
                            format!("\"{key}\" field cannot be empty for {owner}"),
                        )?,
                        _ => {}
                    }
                }
            }
        }
        check_ascii(&items, log)?;
        Ok(())
    }
}
