//! Checker for video question-answering runs.
//!
//! Four comma-separated fields per row: query id, video id, rank, answer.
//! A malformed row is reported and skipped.

use std::collections::{HashMap, HashSet};

use anyhow::{bail, Error};
use runcheck_diagnostics::{ErrorLog, Location};

use crate::readers::{BadLine, DelimitedFormat, Delimiter, Flow};
use crate::reference::TopicRegistry;
use crate::{CheckOpt, Checker};

/// Checker for video question-answering runs in the four-column CSV format.
#[derive(Debug, Default)]
pub struct VqaAnswers;

impl Checker for VqaAnswers {
    fn name(&self) -> &'static str {
        "vqa"
    }

    fn run(&self, opt: &CheckOpt, log: &mut ErrorLog) -> Result<(), Error> {
        let Some(topicfile) = &opt.topicfile else {
            bail!("the vqa checker requires the testing video id file (--topicfile)");
        };
        let ids = TopicRegistry::from_file(topicfile, &opt.search_roots)?;
        let mut query_ranks: HashMap<i64, HashSet<i64>> = HashMap::new();

        let format = DelimitedFormat {
            delimiter: Delimiter::Comma,
            fields: 4,
            on_bad_line: BadLine::Skip,
        };
        let _outcome = format.for_each_record(&opt.runfile, log, |record, log| {
            let line = Location::Line(record.line);
            let (query_id, video_id, rank, answer) = (
                record.fields[0].as_str(),
                record.fields[1].as_str(),
                record.fields[2].as_str(),
                record.fields[3].as_str(),
            );

            if !ids.contains(video_id.trim()) {
                log.error(
                    line,
                    format!("{video_id} not found in the testing video ids"),
                )?;
            }

            let query = match query_id.parse::<i64>() {
                Ok(q) if q >= 1 => Some(q),
                Ok(q) => {
                    log.error(line, format!("query_ID must be >= 1, got {q}"))?;
                    Some(q)
                }
                Err(_) => {
                    log.error(
                        line,
                        format!("query_ID is not a valid integer: {query_id}"),
                    )?;
                    None
                }
            };
            // nothing else to check against a bogus query id
            let Some(query) = query else {
                return Ok(Flow::Continue);
            };

            let rank = match rank.parse::<i64>() {
                Ok(r) if (1..=10).contains(&r) => Some(r),
                Ok(r) => {
                    log.error(line, format!("rank must be between 1 and 10, got {r}"))?;
                    Some(r)
                }
                Err(_) => {
                    log.error(line, format!("rank is not a valid integer: {rank}"))?;
                    None
                }
            };

            if answer.trim().is_empty() {
                log.error(line, "answer field is empty")?;
            }

            if let Some(rank) = rank {
                if !query_ranks.entry(query).or_default().insert(rank) {
                    log.error(
                        line,
                        format!("Duplicate rank {rank} for query_ID {query}"),
                    )?;
                }
            }
            Ok(Flow::Continue)
        })?;
        Ok(())
    }
}
