use super::report::{current_unix_timestamp_seconds, normalize_path, write_json_report};
use crate::dataset::{ExtxyzReadError, read_extxyz};
use crate::domain::{Dataset, PipelineResult, Qe2MaceError};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::info;

pub const DEFAULT_BIN_COUNT: usize = 20;
const PROGRESS_INTERVAL: usize = 100;

#[derive(Debug, Clone)]
pub struct DistributionConfig {
    pub dataset_path: PathBuf,
    pub bins: usize,
    pub report_path: Option<PathBuf>,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("mace_training_data.xyz"),
            bins: DEFAULT_BIN_COUNT,
            report_path: None,
        }
    }
}

/// Half-open `[lower, upper)` bin; the last bin also includes `upper`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtomCountSummary {
    pub structure_count: usize,
    pub min_atoms: Option<usize>,
    pub max_atoms: Option<usize>,
    pub mean_atoms: Option<f64>,
    pub histogram: Vec<HistogramBin>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DistributionReport {
    pub generated_at_unix_seconds: u64,
    pub dataset_path: String,
    #[serde(flatten)]
    pub summary: AtomCountSummary,
}

#[derive(Debug, thiserror::Error)]
pub enum DistributionError {
    #[error("histogram needs at least one bin")]
    ZeroBins,
    #[error("failed to read dataset '{}': {source}", path.display())]
    ReadDataset {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("dataset '{}' is not valid extended XYZ: {source}", path.display())]
    Format {
        path: PathBuf,
        source: ExtxyzReadError,
    },
}

impl From<DistributionError> for Qe2MaceError {
    fn from(error: DistributionError) -> Self {
        let message = error.to_string();
        match error {
            DistributionError::ZeroBins => {
                Qe2MaceError::input_validation("INPUT.HISTOGRAM_BINS", message)
            }
            DistributionError::ReadDataset { .. } => {
                Qe2MaceError::io_system("IO.DATASET_READ", message)
            }
            DistributionError::Format { .. } => {
                Qe2MaceError::input_validation("INPUT.DATASET_FORMAT", message)
            }
        }
    }
}

pub fn run_distribution(config: &DistributionConfig) -> PipelineResult<DistributionReport> {
    let path = &config.dataset_path;
    let source = fs::read_to_string(path).map_err(|source| {
        Qe2MaceError::from(DistributionError::ReadDataset {
            path: path.clone(),
            source,
        })
    })?;
    let dataset = read_extxyz(&source).map_err(|source| {
        Qe2MaceError::from(DistributionError::Format {
            path: path.clone(),
            source,
        })
    })?;
    let summary = summarize_atom_counts(&dataset, config.bins).map_err(Qe2MaceError::from)?;

    let report = DistributionReport {
        generated_at_unix_seconds: current_unix_timestamp_seconds(),
        dataset_path: normalize_path(path),
        summary,
    };
    if let Some(report_path) = &config.report_path {
        write_json_report(report_path, &report).map_err(Qe2MaceError::from)?;
    }
    Ok(report)
}

pub fn summarize_atom_counts(
    dataset: &Dataset,
    bins: usize,
) -> Result<AtomCountSummary, DistributionError> {
    if bins == 0 {
        return Err(DistributionError::ZeroBins);
    }

    let mut counts = Vec::with_capacity(dataset.len());
    for (index, record) in dataset.iter().enumerate() {
        counts.push(record.atom_count());
        if (index + 1) % PROGRESS_INTERVAL == 0 {
            info!(processed = index + 1, total = dataset.len(), "counting atoms");
        }
    }

    let mean_atoms = (!counts.is_empty())
        .then(|| counts.iter().sum::<usize>() as f64 / counts.len() as f64);
    Ok(AtomCountSummary {
        structure_count: counts.len(),
        min_atoms: counts.iter().copied().min(),
        max_atoms: counts.iter().copied().max(),
        mean_atoms,
        histogram: atom_count_histogram(&counts, bins),
    })
}

/// Equal-width histogram over `[min, max]`. A single distinct value gets the
/// range `[value - 0.5, value + 0.5]`.
pub fn atom_count_histogram(counts: &[usize], bins: usize) -> Vec<HistogramBin> {
    let (Some(min), Some(max)) = (counts.iter().min(), counts.iter().max()) else {
        return Vec::new();
    };
    if bins == 0 {
        return Vec::new();
    }

    let (lower, upper) = if min == max {
        (*min as f64 - 0.5, *max as f64 + 0.5)
    } else {
        (*min as f64, *max as f64)
    };
    let span = upper - lower;
    let edges = (0..=bins)
        .map(|index| lower + span * index as f64 / bins as f64)
        .collect::<Vec<_>>();

    let mut tallies = vec![0usize; bins];
    for &count in counts {
        let value = count as f64;
        let mut index = (((value - lower) / span) * bins as f64) as usize;
        index = index.min(bins - 1);
        if index > 0 && value < edges[index] {
            index -= 1;
        } else if index + 1 < bins && value >= edges[index + 1] {
            index += 1;
        }
        tallies[index] += 1;
    }

    tallies
        .into_iter()
        .enumerate()
        .map(|(index, count)| HistogramBin {
            lower: edges[index],
            upper: edges[index + 1],
            count,
        })
        .collect()
}

pub fn render_distribution_summary(report: &DistributionReport) -> String {
    let summary = &report.summary;
    let mut lines = vec![format!(
        "Dataset {}: {} structures",
        report.dataset_path, summary.structure_count
    )];

    if let (Some(min), Some(max), Some(mean)) =
        (summary.min_atoms, summary.max_atoms, summary.mean_atoms)
    {
        lines.push(format!(
            "Atoms per structure: min {min}, max {max}, mean {mean:.2}"
        ));
    }
    for bin in &summary.histogram {
        lines.push(format!(
            "  {:>10.2} - {:<10.2} {}",
            bin.lower, bin.upper, bin.count
        ));
    }

    lines.join("\n")
}
