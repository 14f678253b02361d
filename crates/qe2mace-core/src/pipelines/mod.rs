//! Run-level orchestration on top of the parsers and the dataset codec.

pub mod assembler;
pub mod conversion;
pub mod distribution;
pub mod pairing;
pub mod report;
pub mod training;

pub use assembler::{
    Assembly, AssemblyOptions, RejectedStructure, assemble_dataset, assemble_pair,
    assemble_structure,
};
pub use conversion::{ConversionConfig, ConversionReport, render_human_summary, run_conversion};
pub use distribution::{
    AtomCountSummary, DEFAULT_BIN_COUNT, DistributionConfig, DistributionReport, HistogramBin,
    atom_count_histogram, render_distribution_summary, run_distribution, summarize_atom_counts,
};
pub use pairing::{FilePair, IdentifierFilter, PairDiscovery, discover_pairs};
pub use training::{TrainingConfig, TrainingError, launch_training, load_training_config};
