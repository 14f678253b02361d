use super::assembler::{AssemblyOptions, RejectedStructure, assemble_dataset};
use super::pairing::{IdentifierFilter, discover_pairs};
use super::report::{current_unix_timestamp_seconds, normalize_path, write_json_report};
use crate::dataset::{WriteOutcome, write_extxyz};
use crate::domain::{PipelineResult, Qe2MaceError};
use crate::parser::ForceBlockSelection;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ConversionConfig {
    pub input_dir: PathBuf,
    pub output_path: PathBuf,
    pub report_path: Option<PathBuf>,
    /// Identifier glob patterns; empty selects every identifier.
    pub select: Vec<String>,
    pub force_block: ForceBlockSelection,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("collected_inputs_outputs"),
            output_path: PathBuf::from("mace_training_data.xyz"),
            report_path: None,
            select: Vec::new(),
            force_block: ForceBlockSelection::First,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub generated_at_unix_seconds: u64,
    pub input_dir: String,
    pub output_path: String,
    pub force_block: ForceBlockSelection,
    pub candidate_pair_count: usize,
    pub accepted_count: usize,
    pub rejected_count: usize,
    pub accepted: Vec<String>,
    pub rejected: Vec<RejectedStructure>,
    pub input_only: Vec<String>,
    pub output_only: Vec<String>,
    pub written: bool,
}

/// Discovers pairs, assembles the dataset and writes it. Per-structure
/// problems end up in the report; only run-level failures are errors.
pub fn run_conversion(config: &ConversionConfig) -> PipelineResult<ConversionReport> {
    let filter = IdentifierFilter::from_patterns(&config.select).map_err(Qe2MaceError::from)?;
    let discovery = discover_pairs(&config.input_dir, &filter).map_err(Qe2MaceError::from)?;

    let assembly = assemble_dataset(
        &discovery.pairs,
        AssemblyOptions {
            force_block: config.force_block,
        },
    );
    let outcome = write_extxyz(&config.output_path, &assembly.dataset)
        .map_err(Qe2MaceError::from)?;

    let report = ConversionReport {
        generated_at_unix_seconds: current_unix_timestamp_seconds(),
        input_dir: normalize_path(&config.input_dir),
        output_path: normalize_path(&config.output_path),
        force_block: config.force_block,
        candidate_pair_count: discovery.pairs.len(),
        accepted_count: assembly.dataset.len(),
        rejected_count: assembly.rejected.len(),
        accepted: assembly
            .dataset
            .iter()
            .map(|record| record.identifier().to_string())
            .collect(),
        rejected: assembly.rejected,
        input_only: discovery.input_only,
        output_only: discovery.output_only,
        written: matches!(outcome, WriteOutcome::Written { .. }),
    };
    info!(
        pairs = report.candidate_pair_count,
        accepted = report.accepted_count,
        rejected = report.rejected_count,
        written = report.written,
        "conversion finished"
    );

    if let Some(report_path) = &config.report_path {
        write_json_report(report_path, &report).map_err(Qe2MaceError::from)?;
    }
    Ok(report)
}

pub fn render_human_summary(report: &ConversionReport) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "Candidate pairs: {} ({} input-only, {} output-only)",
        report.candidate_pair_count,
        report.input_only.len(),
        report.output_only.len()
    ));
    lines.push(format!(
        "Structures accepted: {} ({} rejected)",
        report.accepted_count, report.rejected_count
    ));

    for rejected in &report.rejected {
        lines.push(format!("  rejected {}: {}", rejected.identifier, rejected.reason));
    }
    for identifier in &report.input_only {
        lines.push(format!("  incomplete {identifier}: no matching .out file"));
    }
    for identifier in &report.output_only {
        lines.push(format!("  incomplete {identifier}: no matching .in file"));
    }

    if report.written {
        lines.push(format!(
            "Wrote {} structures to {}",
            report.accepted_count, report.output_path
        ));
    } else {
        lines.push("No structures parsed; no dataset written".to_string());
    }

    lines.join("\n")
}
