//! Checker for cross-language report-generation runs.
//!
//! One JSON object per line, one report per request. Checks for:
//! - missing or non-matching run_id
//! - incorrect or missing requests
//! - bogus collection ids
//! - missing sentences, bogus or repeated citations
//! - report length
//!
//! Length is measured in NFKC-normalized characters; there is no repair
//! step for this task, an over-length report is an error.

use std::collections::HashSet;

use anyhow::{bail, Error};
use regex::Regex;
use runcheck_diagnostics::{ErrorLog, Location};

use crate::context::Runtag;
use crate::readers::{read_jsonl, Flow};
use crate::reference::TopicRegistry;
use crate::rules::{id_string, nfkc_chars, require_all};
use crate::{CheckOpt, Checker};

lazy_static! {
    static ref UUID_RE: Regex = Regex::new(
        r"(?i)^[a-f0-9]{8}-?[a-f0-9]{4}-?4[a-f0-9]{3}-?[89ab][a-f0-9]{3}-?[a-f0-9]{12}\z"
    )
    .unwrap();
}

const COLLECTION_IDS: [&str; 3] = ["neuclir/1/zho", "neuclir/1/rus", "neuclir/1/fas"];
const MAX_REPORT_CHARS: usize = 2000;
const MAX_CITATIONS_PER_SENTENCE: usize = 2;

/// Checker for report-generation runs in the JSON-Lines format.
#[derive(Debug, Default)]
pub struct NeuclirReport;

impl Checker for NeuclirReport {
    fn name(&self) -> &'static str {
        "neuclir"
    }

    fn run(&self, opt: &CheckOpt, log: &mut ErrorLog) -> Result<(), Error> {
        let Some(topicfile) = &opt.topicfile else {
            bail!("the neuclir checker requires the request id file (--topicfile)");
        };
        let mut requests = TopicRegistry::from_file(topicfile, &opt.search_roots)?;
        let mut runtag = Runtag::default();

        let outcome = read_jsonl(&opt.runfile, log, |line_no, obj, log| {
            let line = Location::Line(line_no);
            if !require_all(
                obj,
                &["request_id", "run_id", "collection_ids", "sentences"],
                line,
                log,
            )? {
                return Ok(Flow::Continue);
            }
            let request_id = id_string(&obj["request_id"]);
            runtag.check(&id_string(&obj["run_id"]), line, log)?;

            if !requests.contains(&request_id) {
                log.error(line, format!("Unknown request ({request_id})"))?;
                // end checks for this line
                return Ok(Flow::Continue);
            }

            match obj["collection_ids"].as_array() {
                Some(collections) => {
                    for collection in collections {
                        let collection = id_string(collection);
                        if !COLLECTION_IDS.contains(&collection.as_str()) {
                            log.error(line, format!("Bogus collection id {collection}"))?;
                        }
                    }
                }
                None => log.error(line, "\"collection_ids\" must be a list")?,
            }

            let sentences = match obj["sentences"].as_array() {
                Some(sentences) if !sentences.is_empty() => sentences,
                _ => {
                    log.error(
                        line,
                        format!("No report sentences for request {request_id}"),
                    )?;
                    // skip the sentence checks
                    return Ok(Flow::Continue);
                }
            };

            let mut length = 0;
            for sentence in sentences {
                if sentence.get("text").is_none() || sentence.get("citations").is_none() {
                    log.error(line, "Entry sentence is missing a field")?;
                    continue;
                }
                length += nfkc_chars(sentence["text"].as_str().unwrap_or_default());

                let Some(citations) = sentence["citations"].as_array() else {
                    log.error(line, "\"citations\" must be a list")?;
                    continue;
                };
                if citations.len() > MAX_CITATIONS_PER_SENTENCE {
                    log.error(line, "Too many citations (max 2 per sentence)")?;
                }
                let mut seen = HashSet::new();
                for citation in citations {
                    let citation = id_string(citation);
                    if !UUID_RE.is_match(&citation) {
                        log.error(line, "Bogus docid in citation")?;
                    }
                    if !seen.insert(citation) {
                        log.error(line, "Repeated citation")?;
                    }
                }
            }
            if length > MAX_REPORT_CHARS {
                log.error(line, format!("Report is too long ({length} chars)"))?;
            }
            requests.tally(&request_id);
            Ok(Flow::Continue)
        })?;

        let last = Location::Line(outcome.lines);
        for (request, count) in requests.iter() {
            if count == 0 {
                log.error(last, format!("No reports returned for request {request}"))?;
            } else if count > 1 {
                log.error(
                    last,
                    format!("Too many reports ({count}) generated for request {request}"),
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use runcheck_diagnostics::DEFAULT_MAX_ERRORS;
    use serde_json::json;

    use super::*;

    const CITE_A: &str = "6e2300b9-21a1-4fe4-9d95-1e5f7c0f0b66";
    const CITE_B: &str = "9b8f1c2d-3e4f-4a5b-8c6d-7e8f9a0b1c2d";

    fn report(request: &str, run: &str, sentences: serde_json::Value) -> String {
        json!({
            "request_id": request,
            "run_id": run,
            "collection_ids": ["neuclir/1/zho"],
            "sentences": sentences,
        })
        .to_string()
    }

    fn check(lines: &[String]) -> (Vec<String>, usize) {
        let dir = tempfile::TempDir::new().unwrap();
        let topicfile = dir.path().join("requests.txt");
        std::fs::write(&topicfile, "R100\nR101\n").unwrap();
        let runfile = dir.path().join("reports.jsonl");
        std::fs::write(&runfile, lines.join("\n") + "\n").unwrap();
        let mut opt = CheckOpt::new(&runfile);
        opt.topicfile = Some(topicfile);
        let mut log = ErrorLog::new(&runfile, DEFAULT_MAX_ERRORS);
        NeuclirReport.run(&opt, &mut log).unwrap();
        let findings = log.diagnostics().iter().map(|d| d.to_string()).collect();
        (findings, log.error_count())
    }

    #[test]
    fn clean_run_has_no_findings() {
        let lines = vec![
            report("R100", "run1", json!([{"text": "One.", "citations": [CITE_A]}])),
            report("R101", "run1", json!([{"text": "Two.", "citations": [CITE_B]}])),
        ];
        let (findings, errors) = check(&lines);
        assert!(findings.is_empty(), "{findings:?}");
        assert_eq!(errors, 0);
    }

    #[test]
    fn truncated_json_line_reported_and_rest_checked() {
        let lines = vec![
            report("R100", "run1", json!([{"text": "One.", "citations": []}])),
            "{\"request_id\": \"R101\", \"run_id\"".to_owned(),
        ];
        let (findings, _) = check(&lines);
        assert!(findings[0].starts_with("ERROR Line 2: Error parsing JSON"));
        // the valid line was still processed, so only R101 lacks a report
        assert_eq!(
            findings[1],
            "ERROR Line 2: No reports returned for request R101"
        );
        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn missing_field_is_one_combined_error() {
        let lines = vec![
            json!({"request_id": "R100", "run_id": "run1", "sentences": []}).to_string(),
            report("R101", "run1", json!([{"text": "Two.", "citations": []}])),
        ];
        let (findings, _) = check(&lines);
        assert_eq!(findings[0], "ERROR Line 1: Entry is missing a required field.");
    }

    #[test]
    fn repeated_citation_reported_once_per_pair() {
        let lines = vec![
            report(
                "R100",
                "run1",
                json!([{"text": "One.", "citations": [CITE_A, CITE_A]}]),
            ),
            report("R101", "run1", json!([{"text": "Two.", "citations": []}])),
        ];
        let (findings, _) = check(&lines);
        assert_eq!(findings, vec!["ERROR Line 1: Repeated citation"]);
    }

    #[test]
    fn three_citations_in_a_sentence_is_too_many() {
        let third = "0f0e0d0c-0b0a-4f9e-8d7c-6b5a4e3d2c1b";
        let lines = vec![
            report(
                "R100",
                "run1",
                json!([{"text": "One.", "citations": [CITE_A, CITE_B, third]}]),
            ),
            report("R101", "run1", json!([{"text": "Two.", "citations": []}])),
        ];
        let (findings, _) = check(&lines);
        assert_eq!(
            findings,
            vec!["ERROR Line 1: Too many citations (max 2 per sentence)"]
        );
    }

    #[test]
    fn bogus_collection_and_citation_ids() {
        let lines = vec![
            json!({
                "request_id": "R100",
                "run_id": "run1",
                "collection_ids": ["neuclir/1/deu"],
                "sentences": [{"text": "One.", "citations": ["not-a-uuid"]}],
            })
            .to_string(),
            report("R101", "run1", json!([{"text": "Two.", "citations": []}])),
        ];
        let (findings, _) = check(&lines);
        assert_eq!(
            findings,
            vec![
                "ERROR Line 1: Bogus collection id neuclir/1/deu",
                "ERROR Line 1: Bogus docid in citation",
            ]
        );
    }

    #[test]
    fn overlong_report_is_an_error() {
        let long = "x".repeat(2001);
        let lines = vec![
            report("R100", "run1", json!([{"text": long, "citations": []}])),
            report("R101", "run1", json!([{"text": "Two.", "citations": []}])),
        ];
        let (findings, _) = check(&lines);
        assert_eq!(
            findings,
            vec!["ERROR Line 1: Report is too long (2001 chars)"]
        );
    }

    #[test]
    fn second_report_for_a_request() {
        let lines = vec![
            report("R100", "run1", json!([{"text": "One.", "citations": []}])),
            report("R100", "run1", json!([{"text": "Again.", "citations": []}])),
            report("R101", "run1", json!([{"text": "Two.", "citations": []}])),
        ];
        let (findings, _) = check(&lines);
        assert_eq!(
            findings,
            vec!["ERROR Line 3: Too many reports (2) generated for request R100"]
        );
    }

    #[test]
    fn inconsistent_run_id() {
        let lines = vec![
            report("R100", "run1", json!([{"text": "One.", "citations": []}])),
            report("R101", "run2", json!([{"text": "Two.", "citations": []}])),
        ];
        let (findings, _) = check(&lines);
        assert_eq!(
            findings,
            vec!["ERROR Line 2: Run tag inconsistent (\"run2\" instead of \"run1\")"]
        );
    }
}
