//! Checker for paper submissions: the file must be a PDF.

use std::fs::File;
use std::io::{ErrorKind, Read};

use anyhow::{Context, Error};
use runcheck_diagnostics::{ErrorLog, Location};

use crate::{CheckOpt, Checker};

const PDF_MAGIC: &[u8; 5] = b"%PDF-";

/// Checker for paper submissions.
#[derive(Debug, Default)]
pub struct PaperPdf;

impl Checker for PaperPdf {
    fn name(&self) -> &'static str {
        "paper"
    }

    fn run(&self, opt: &CheckOpt, log: &mut ErrorLog) -> Result<(), Error> {
        let mut file = File::open(&opt.runfile)
            .with_context(|| format!("cannot open {}", opt.runfile.display()))?;
        let mut header = [0u8; 5];
        match file.read_exact(&mut header) {
            Ok(()) if header == *PDF_MAGIC => {}
            Ok(()) => log.error(Location::None, "Paper file type must be PDF.")?,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                log.error(Location::None, "Paper file type must be PDF.")?
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("cannot read {}", opt.runfile.display()))
            }
        }
        Ok(())
    }
}
