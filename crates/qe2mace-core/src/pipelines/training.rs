use crate::dataset::format_real;
use crate::domain::{PipelineResult, Qe2MaceError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// Hyper-parameters handed to the external `mace-train` command. Every field
/// has a default, so a JSON file only needs the values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    pub executable: String,
    pub config_type: String,
    pub train_file: PathBuf,
    /// Falls back to `train_file` when absent.
    pub valid_file: Option<PathBuf>,
    pub model_type: String,
    pub energy_weight: f64,
    pub force_weight: f64,
    pub num_epochs: u32,
    pub batch_size: u32,
    pub device: String,
    pub output_dir: PathBuf,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            executable: "mace-train".to_string(),
            config_type: "default".to_string(),
            train_file: PathBuf::from("mace_training_data.xyz"),
            valid_file: None,
            model_type: "MACE".to_string(),
            energy_weight: 1.0,
            force_weight: 100.0,
            num_epochs: 50,
            batch_size: 4,
            device: "cuda".to_string(),
            output_dir: PathBuf::from("mace_model_output"),
            seed: 42,
        }
    }
}

impl TrainingConfig {
    pub fn valid_file(&self) -> &Path {
        self.valid_file.as_deref().unwrap_or(&self.train_file)
    }

    /// `mace-train` arguments in a fixed order.
    pub fn arguments(&self) -> Vec<String> {
        vec![
            "--config-type".to_string(),
            self.config_type.clone(),
            "--train-file".to_string(),
            argument_path(&self.train_file),
            "--valid-file".to_string(),
            argument_path(self.valid_file()),
            "--model-type".to_string(),
            self.model_type.clone(),
            "--energy-weight".to_string(),
            format_real(self.energy_weight),
            "--force-weight".to_string(),
            format_real(self.force_weight),
            "--num-epochs".to_string(),
            self.num_epochs.to_string(),
            "--batch-size".to_string(),
            self.batch_size.to_string(),
            "--device".to_string(),
            self.device.clone(),
            "--output-dir".to_string(),
            argument_path(&self.output_dir),
            "--seed".to_string(),
            self.seed.to_string(),
        ]
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.executable.clone())
            .chain(self.arguments())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn argument_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("failed to read training config '{}': {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse training config '{}': {source}", path.display())]
    ParseConfig {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to create output directory '{}': {source}", path.display())]
    OutputDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to start '{executable}': {source}")]
    Spawn {
        executable: String,
        source: std::io::Error,
    },
    #[error("'{executable}' exited with {}", exit_status_label(*code))]
    Exit {
        executable: String,
        code: Option<i32>,
    },
}

fn exit_status_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl From<TrainingError> for Qe2MaceError {
    fn from(error: TrainingError) -> Self {
        let message = error.to_string();
        match error {
            TrainingError::ReadConfig { .. } => {
                Qe2MaceError::io_system("IO.TRAINING_CONFIG", message)
            }
            TrainingError::ParseConfig { .. } => {
                Qe2MaceError::input_validation("INPUT.TRAINING_CONFIG", message)
            }
            TrainingError::OutputDirectory { .. } => {
                Qe2MaceError::io_system("IO.TRAINING_OUTPUT", message)
            }
            TrainingError::Spawn { .. } => Qe2MaceError::io_system("IO.TRAINING_SPAWN", message),
            TrainingError::Exit { .. } => Qe2MaceError::computation("RUN.TRAINING_EXIT", message),
        }
    }
}

pub fn load_training_config(path: &Path) -> Result<TrainingConfig, TrainingError> {
    let source = fs::read_to_string(path).map_err(|source| TrainingError::ReadConfig {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&source).map_err(|source| TrainingError::ParseConfig {
        path: path.to_path_buf(),
        source,
    })
}

/// Creates the output directory and runs the training command to completion.
pub fn launch_training(config: &TrainingConfig) -> PipelineResult<()> {
    run_training_command(config).map_err(Qe2MaceError::from)
}

fn run_training_command(config: &TrainingConfig) -> Result<(), TrainingError> {
    fs::create_dir_all(&config.output_dir).map_err(|source| TrainingError::OutputDirectory {
        path: config.output_dir.clone(),
        source,
    })?;

    info!(command = %config.command_line(), "starting training");
    let status = Command::new(&config.executable)
        .args(config.arguments())
        .status()
        .map_err(|source| TrainingError::Spawn {
            executable: config.executable.clone(),
            source,
        })?;

    if !status.success() {
        return Err(TrainingError::Exit {
            executable: config.executable.clone(),
            code: status.code(),
        });
    }
    info!(output_dir = %config.output_dir.display(), "training complete");
    Ok(())
}
