//! The per-task checker family.
//!
//! One module per submission format. Every checker follows the same shape:
//! load the reference data, read the submission with one of the
//! [`readers`](crate::readers), apply the per-record rules (continuing past
//! failures so one bad record does not hide the others), then the aggregate
//! rules, leaving the verdict in the log.

pub mod biogen;
pub mod lateral;
pub mod medvidqa;
pub mod neuclir;
pub mod paper;
pub mod plaba;
pub mod rag;
pub mod trec;
pub mod vqa;
