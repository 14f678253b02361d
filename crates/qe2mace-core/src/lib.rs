//! Quantum ESPRESSO `pw.x` input/output pairs to extended-XYZ training data.
//!
//! The crate is organised leaf to root: unit conversion in [`common`], the
//! per-file scanners in [`parser`], dataset encoding in [`dataset`] and the
//! run-level orchestration (pairing, assembly, reporting, training launch) in
//! [`pipelines`].

pub mod common;
pub mod dataset;
pub mod domain;
pub mod parser;
pub mod pipelines;
