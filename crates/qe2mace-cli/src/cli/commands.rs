use super::CliError;
use anyhow::Context;
use qe2mace_core::parser::ForceBlockSelection;
use qe2mace_core::pipelines::{
    ConversionConfig, DEFAULT_BIN_COUNT, DistributionConfig, TrainingConfig, launch_training,
    load_training_config, render_distribution_summary, render_human_summary, run_conversion,
    run_distribution,
};
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

#[derive(clap::Args)]
pub(super) struct ConvertArgs {
    /// Directory holding <id>.in and <id>.out files
    #[arg(long, default_value = "collected_inputs_outputs")]
    input_dir: PathBuf,

    /// Extended-XYZ dataset output path
    #[arg(long, default_value = "mace_training_data.xyz")]
    output: PathBuf,

    /// Optional JSON report output path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Only convert identifiers matching these glob patterns
    #[arg(long, value_name = "GLOB")]
    select: Vec<String>,

    /// Forces section to keep when an output file has several
    #[arg(long, value_enum, default_value_t = ForceBlockArg::First)]
    force_block: ForceBlockArg,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ForceBlockArg {
    First,
    Last,
}

impl From<ForceBlockArg> for ForceBlockSelection {
    fn from(value: ForceBlockArg) -> Self {
        match value {
            ForceBlockArg::First => Self::First,
            ForceBlockArg::Last => Self::Last,
        }
    }
}

#[derive(clap::Args)]
pub(super) struct InspectArgs {
    /// Extended-XYZ dataset to summarize
    #[arg(long, default_value = "mace_training_data.xyz")]
    dataset: PathBuf,

    /// Number of equal-width histogram bins
    #[arg(long, default_value_t = DEFAULT_BIN_COUNT)]
    bins: usize,

    /// Optional JSON report output path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct TrainArgs {
    /// JSON file with training hyper-parameters
    #[arg(long)]
    config: Option<PathBuf>,

    /// Training dataset (overrides the config file)
    #[arg(long)]
    train_file: Option<PathBuf>,

    /// Validation dataset (overrides the config file)
    #[arg(long)]
    valid_file: Option<PathBuf>,

    /// Model and log directory (overrides the config file)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Training device, e.g. cuda or cpu (overrides the config file)
    #[arg(long)]
    device: Option<String>,

    /// Print the training command without running it
    #[arg(long)]
    dry_run: bool,
}

pub(super) fn run_convert_command(args: ConvertArgs) -> Result<i32, CliError> {
    let config = ConversionConfig {
        input_dir: args.input_dir,
        output_path: args.output,
        report_path: args.report,
        select: args.select,
        force_block: args.force_block.into(),
    };
    debug!(
        input_dir = %config.input_dir.display(),
        output = %config.output_path.display(),
        "starting conversion"
    );

    let report = run_conversion(&config).map_err(CliError::Compute)?;
    print_summary(&render_human_summary(&report))?;
    Ok(0)
}

pub(super) fn run_inspect_command(args: InspectArgs) -> Result<i32, CliError> {
    let config = DistributionConfig {
        dataset_path: args.dataset,
        bins: args.bins,
        report_path: args.report,
    };

    let report = run_distribution(&config).map_err(CliError::Compute)?;
    print_summary(&render_distribution_summary(&report))?;
    Ok(0)
}

pub(super) fn run_train_command(args: TrainArgs) -> Result<i32, CliError> {
    let mut config = match &args.config {
        Some(path) => {
            load_training_config(path).map_err(|error| CliError::Compute(error.into()))?
        }
        None => TrainingConfig::default(),
    };
    if let Some(train_file) = args.train_file {
        config.train_file = train_file;
    }
    if let Some(valid_file) = args.valid_file {
        config.valid_file = Some(valid_file);
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(device) = args.device {
        config.device = device;
    }

    debug!(?config, "resolved training configuration");

    if args.dry_run {
        print_summary(&format!("Command: {}", config.command_line()))?;
        return Ok(0);
    }

    print_summary(&format!("Running training: {}", config.command_line()))?;
    launch_training(&config).map_err(CliError::Compute)?;
    print_summary(&format!(
        "Training complete. Model and logs are in {}",
        config.output_dir.display()
    ))?;
    Ok(0)
}

fn print_summary(text: &str) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}").context("failed to write summary to stdout")?;
    Ok(())
}
