//! Checker for lateral-reading question runs.
//!
//! Four tab-separated fields per line: article id, runtag, question number,
//! question text. The question text may itself contain tabs, so the split is
//! bounded. A malformed line is reported and skipped; the rest of the file
//! is still checked.

use anyhow::{bail, Error};
use regex::Regex;
use runcheck_diagnostics::{ErrorLog, Location};

use crate::context::{Observation, Runtag};
use crate::readers::{BadLine, DelimitedFormat, Delimiter, Flow};
use crate::reference::TopicRegistry;
use crate::rules::prefix_match;
use crate::{CheckOpt, Checker};

lazy_static! {
    static ref ARTICLE_RE: Regex = Regex::new(r"clueweb22-en\d{4}-\d{2}-\d{5}").unwrap();
}

/// Expected number of questions per article.
const QUESTIONS_PER_ARTICLE: usize = 10;

/// Checker for lateral-reading question-generation runs.
#[derive(Debug, Default)]
pub struct LateralQuestions;

impl Checker for LateralQuestions {
    fn name(&self) -> &'static str {
        "lateral"
    }

    fn run(&self, opt: &CheckOpt, log: &mut ErrorLog) -> Result<(), Error> {
        let Some(topicfile) = &opt.topicfile else {
            bail!("the lateral checker requires the article id file (--topicfile)");
        };
        let mut articles = TopicRegistry::from_file(topicfile, &opt.search_roots)?;
        let mut runtag = Runtag::default();

        let format = DelimitedFormat {
            delimiter: Delimiter::Tab {
                max_splits: Some(3),
            },
            fields: 4,
            on_bad_line: BadLine::Skip,
        };
        let outcome = format.for_each_record(&opt.runfile, log, |record, log| {
            let line = Location::Line(record.line);
            let (article, tag, qnum) = (
                record.fields[0].as_str(),
                record.fields[1].as_str(),
                record.fields[2].as_str(),
            );

            if !articles.contains(article) || !prefix_match(&ARTICLE_RE, article) {
                log.error(line, format!("{article} is not a valid document ID"))?;
                return Ok(Flow::Continue);
            }

            if let Observation::Mismatch(canonical) = runtag.observe(tag) {
                log.error(line, format!("{tag} does not match runtag {canonical}"))?;
                return Ok(Flow::Continue);
            }

            match qnum.parse::<i64>() {
                Ok(n) if (1..=QUESTIONS_PER_ARTICLE as i64).contains(&n) => {}
                _ => log.error(line, format!("{qnum} must be a number from 1 to 10"))?,
            }

            if articles.count(article) >= QUESTIONS_PER_ARTICLE {
                log.error(line, format!("Too many questions for document {article}"))?;
            }
            articles.tally(article);
            Ok(Flow::Continue)
        })?;

        let last = Location::Line(outcome.lines);
        for (article, count) in articles.iter() {
            if count == 0 {
                log.error(last, format!("Missing questions for document {article}"))?;
            } else if count < QUESTIONS_PER_ARTICLE {
                log.warn(
                    last,
                    format!("Document {article} has only {count} questions"),
                );
            }
        }
        Ok(())
    }
}
