//! Checker for retrieval-augmented generation runs.
//!
//! The submission is either one JSON list or JSON-Lines (autodetected), one
//! entry per topic, each with a `metadata` object and a `responses` list.
//! Checks for:
//! - top-level shape and per-entry schema
//! - inconsistent team or run ids
//! - duplicate or missing topics
//! - citation counts and response word counts

use std::collections::HashSet;
use std::ops::RangeInclusive;

use anyhow::Error;
use itertools::Itertools;
use runcheck_diagnostics::{ErrorLog, Location};
use serde_json::Value;

use crate::context::{Observation, Runtag};
use crate::readers::{read_json_or_jsonl, ReadError};
use crate::reference::TopicRegistry;
use crate::rules::{id_string, type_name};
use crate::{CheckOpt, Checker};

const TOPIC_RANGE: RangeInclusive<u32> = 181..=210;
const MAX_CITATIONS: usize = 3;
const MAX_RESPONSE_WORDS: usize = 250;

/// Checker for retrieval-augmented generation runs.
#[derive(Debug, Default)]
pub struct RagResponses;

impl Checker for RagResponses {
    fn name(&self) -> &'static str {
        "rag"
    }

    fn run(&self, opt: &CheckOpt, log: &mut ErrorLog) -> Result<(), Error> {
        let mut topics = match &opt.topicfile {
            Some(path) => TopicRegistry::from_file(path, &opt.search_roots)?,
            None => TopicRegistry::from_range(TOPIC_RANGE),
        };

        let data = match read_json_or_jsonl(&opt.runfile) {
            Ok(data) => data,
            Err(ReadError::Json(e)) => {
                log.error(Location::None, format!("Invalid JSON format: {e}"))?;
                return Ok(());
            }
            Err(ReadError::JsonLine { line, source }) => {
                log.error(
                    Location::Line(line),
                    format!("Invalid JSONL format: {source}"),
                )?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let Some(entries) = data.as_array() else {
            log.error(Location::None, "Top-level JSON must be a list.")?;
            return Ok(());
        };
        if entries.len() != topics.len() {
            log.error(
                Location::None,
                format!(
                    "Mismatch in number of topics: expected {}, found {}",
                    topics.len(),
                    entries.len()
                ),
            )?;
        }

        let mut team_id = Runtag::default();
        let mut run_id = Runtag::default();
        let mut seen_topics: HashSet<String> = HashSet::new();

        for (index, entry) in entries.iter().enumerate() {
            let item = Location::Record(index + 1);
            let Some(fields) = entry.as_object() else {
                log.error(item, "Entry is not a JSON object.")?;
                continue;
            };

            let required = ["metadata", "responses"];
            let missing = required
                .iter()
                .filter(|key| !fields.contains_key(**key))
                .join(", ");
            let extra = fields
                .keys()
                .filter(|key| !required.contains(&key.as_str()))
                .join(", ");
            if !extra.is_empty() {
                log.warn(item, format!("Contains extra fields: {extra}."));
            }
            if !missing.is_empty() {
                log.error(item, format!("Missing required fields: {missing}."))?;
                continue;
            }

            let metadata = &entry["metadata"];
            if !metadata.is_object() {
                log.error(item, "'metadata' must be a JSON object.")?;
                continue;
            }
            for (key, tag) in [("team_id", &mut team_id), ("run_id", &mut run_id)] {
                match metadata.get(key) {
                    None => log.error(item, format!("'metadata' is missing key: '{key}'."))?,
                    Some(Value::String(value)) => {
                        if let Observation::Mismatch(canonical) = tag.observe(value) {
                            log.error(
                                item,
                                format!("Inconsistent {key} '{value}' (expected '{canonical}')."),
                            )?;
                        }
                    }
                    Some(other) => log.error(
                        item,
                        format!("'metadata.{key}' must be a string, got {}.", type_name(other)),
                    )?,
                }
            }

            match metadata.get("topic_id") {
                None => log.error(item, "'metadata' is missing key: 'topic_id'.")?,
                Some(value @ (Value::String(_) | Value::Number(_))) => {
                    let topic_id = id_string(value);
                    if !topics.contains(&topic_id) {
                        log.error(item, format!("Invalid or missing topic_id: {topic_id}"))?;
                    } else if !seen_topics.insert(topic_id.clone()) {
                        log.error(item, format!("Duplicate topic_id '{topic_id}'."))?;
                    } else {
                        topics.tally(&topic_id);
                    }
                }
                Some(other) => log.error(
                    item,
                    format!(
                        "'metadata.topic_id' must be a string or a number, got {}.",
                        type_name(other)
                    ),
                )?,
            }

            let Some(responses) = entry["responses"].as_array() else {
                log.error(item, "'responses' must be a list.")?;
                continue;
            };
            let mut total_words = 0;
            for (rindex, response) in responses.iter().enumerate() {
                let rnum = rindex + 1;
                if !response.is_object() {
                    log.error(item, format!("Response #{rnum} is not a JSON object."))?;
                    continue;
                }
                if response.get("text").is_none() || response.get("citations").is_none() {
                    log.error(
                        item,
                        format!("Response #{rnum} missing 'text' or 'citations'."),
                    )?;
                    continue;
                }
                match &response["text"] {
                    Value::String(text) => total_words += text.split_whitespace().count(),
                    other => log.error(
                        item,
                        format!(
                            "'text' in response #{rnum} must be a string, got {}.",
                            type_name(other)
                        ),
                    )?,
                }
                match &response["citations"] {
                    Value::Array(citations) => {
                        if citations.len() > MAX_CITATIONS {
                            log.error(
                                item,
                                format!(
                                    "Response #{rnum} has {} citations (max {MAX_CITATIONS}).",
                                    citations.len()
                                ),
                            )?;
                        }
                        for (cindex, citation) in citations.iter().enumerate() {
                            if !matches!(citation, Value::String(_) | Value::Number(_)) {
                                log.error(
                                    item,
                                    format!(
                                        "citations[{}] in response #{rnum} must be a string or a number, got {}.",
                                        cindex + 1,
                                        type_name(citation)
                                    ),
                                )?;
                            }
                        }
                    }
                    // a map of citation ids is fine, the keys are strings
                    Value::Object(_) => {}
                    other => log.error(
                        item,
                        format!(
                            "'citations' in response #{rnum} must be a list or a map, got {}.",
                            type_name(other)
                        ),
                    )?,
                }
            }
            if total_words > MAX_RESPONSE_WORDS {
                log.error(
                    item,
                    format!(
                        "Total word count {total_words} exceeds {MAX_RESPONSE_WORDS} limit."
                    ),
                )?;
            }
        }

        let missing = topics
            .iter()
            .filter(|(_, count)| *count == 0)
            .map(|(topic, _)| topic)
            .join(", ");
        if !missing.is_empty() {
            log.error(Location::None, format!("Missing topic_ids: [{missing}]"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn entry(topic: u32) -> Value {
        json!({
            "metadata": {"team_id": "team", "run_id": "run1", "topic_id": topic.to_string()},
            "responses": [{"text": "A grounded answer.", "citations": ["doc-1"]}],
        })
    }

    fn full_entries() -> Vec<Value> {
        TOPIC_RANGE.map(entry).collect()
    }

    fn check_lines(content: &str) -> Vec<String> {
        let dir = tempfile::TempDir::new().unwrap();
        let runfile = dir.path().join("rag.jsonl");
        std::fs::write(&runfile, content).unwrap();
        let opt = CheckOpt::new(&runfile);
        let mut log = ErrorLog::new(&runfile, runcheck_diagnostics::DEFAULT_MAX_ERRORS);
        RagResponses.run(&opt, &mut log).unwrap();
        log.diagnostics().iter().map(|d| d.to_string()).collect()
    }

    fn check_entries(entries: &[Value]) -> Vec<String> {
        let content = entries.iter().map(|e| e.to_string()).join("\n") + "\n";
        check_lines(&content)
    }

    #[test]
    fn clean_jsonl_run_has_no_findings() {
        let findings = check_entries(&full_entries());
        assert!(findings.is_empty(), "{findings:?}");
    }

    #[test]
    fn clean_whole_document_run_has_no_findings() {
        let findings = check_lines(&Value::Array(full_entries()).to_string());
        assert!(findings.is_empty(), "{findings:?}");
    }

    #[test]
    fn inconsistent_ids_are_reported() {
        let mut entries = full_entries();
        entries[1]["metadata"]["team_id"] = json!("other");
        let findings = check_entries(&entries);
        assert_eq!(
            findings,
            vec!["ERROR Item 2: Inconsistent team_id 'other' (expected 'team')."]
        );
    }

    #[test]
    fn duplicate_and_missing_topics() {
        let mut entries = full_entries();
        entries[1] = entry(181);
        let findings = check_entries(&entries);
        assert_eq!(
            findings,
            vec![
                "ERROR Item 2: Duplicate topic_id '181'.",
                "ERROR: Missing topic_ids: [182]",
            ]
        );
    }

    #[test]
    fn extra_fields_warn_missing_fields_error() {
        let mut entries = full_entries();
        entries[0]["debug"] = json!(true);
        entries[1] = json!({"metadata": {"team_id": "team", "run_id": "run1", "topic_id": "182"}});
        let findings = check_entries(&entries);
        assert_eq!(
            findings,
            vec![
                "WARNING Item 1: Contains extra fields: debug.",
                "ERROR Item 2: Missing required fields: responses.",
                "ERROR: Missing topic_ids: [182]",
            ]
        );
    }

    #[test]
    fn too_many_citations_and_word_cap() {
        let mut entries = full_entries();
        let long_text = vec!["word"; 251].join(" ");
        entries[0]["responses"] = json!([
            {"text": long_text, "citations": ["a", "b", "c", "d"]},
        ]);
        let findings = check_entries(&entries);
        assert_eq!(
            findings,
            vec![
                "ERROR Item 1: Response #1 has 4 citations (max 3).",
                "ERROR Item 1: Total word count 251 exceeds 250 limit.",
            ]
        );
    }

    #[test]
    fn wrong_entry_count_is_reported() {
        let entries: Vec<Value> = full_entries().into_iter().take(2).collect();
        let findings = check_entries(&entries);
        assert_eq!(
            findings[0],
            "ERROR: Mismatch in number of topics: expected 30, found 2"
        );
    }

    #[test]
    fn type_errors_name_the_actual_type() {
        let mut entries = full_entries();
        entries[0]["metadata"]["team_id"] = json!(17);
        entries[0]["responses"] = json!([{"text": 42, "citations": "doc-1"}]);
        let findings = check_entries(&entries);
        assert_eq!(
            findings,
            vec![
                "ERROR Item 1: 'metadata.team_id' must be a string, got number.",
                "ERROR Item 1: 'text' in response #1 must be a string, got number.",
                "ERROR Item 1: 'citations' in response #1 must be a list or a map, got string.",
            ]
        );
    }
}
