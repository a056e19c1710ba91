//! Submission parsing and validation for run checkers.
//!
//! This crate hosts the pieces every checker is assembled from: the format
//! [`readers`], the [`reference`] data registry, the cross-record validation
//! [`context`], the shared record [`rules`], and the per-task [`checkers`]
//! themselves, looked up by tag through [`find_checker`].
//!
//! A checker run is a single synchronous pass: load the reference data, read
//! the submission, apply the per-record rules, apply the aggregate rules,
//! and leave the verdict in the [`ErrorLog`](runcheck_diagnostics::ErrorLog).

#![deny(missing_docs)]

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

mod checker;
pub mod checkers;
pub mod context;
pub mod readers;
pub mod reference;
pub mod rules;

pub use checker::{checker_names, find_checker, CheckOpt, Checker};
