use crate::domain::Qe2MaceError;
use globset::{Glob, GlobMatcher};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const INPUT_EXTENSION: &str = "in";
pub const OUTPUT_EXTENSION: &str = "out";

/// `<id>.in` and `<id>.out` sharing one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    pub identifier: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PairDiscovery {
    /// Complete pairs, sorted by identifier.
    pub pairs: Vec<FilePair>,
    pub input_only: Vec<String>,
    pub output_only: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    #[error("failed to read input directory '{}': {source}", path.display())]
    ReadDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid identifier pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: globset::Error,
    },
}

impl From<PairingError> for Qe2MaceError {
    fn from(error: PairingError) -> Self {
        let message = error.to_string();
        match error {
            PairingError::ReadDirectory { .. } => {
                Qe2MaceError::io_system("IO.INPUT_DIRECTORY", message)
            }
            PairingError::InvalidPattern { .. } => {
                Qe2MaceError::input_validation("INPUT.IDENTIFIER_PATTERN", message)
            }
        }
    }
}

/// Restricts the identifiers considered; an empty filter accepts everything.
#[derive(Debug, Clone, Default)]
pub struct IdentifierFilter {
    matchers: Vec<GlobMatcher>,
}

impl IdentifierFilter {
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PairingError> {
        let matchers = patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Glob::new(pattern)
                    .map(|glob| glob.compile_matcher())
                    .map_err(|source| PairingError::InvalidPattern {
                        pattern: pattern.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { matchers })
    }

    pub fn matches(&self, identifier: &str) -> bool {
        self.matchers.is_empty() || self.matchers.iter().any(|matcher| matcher.is_match(identifier))
    }
}

/// Scans a flat directory for `.in`/`.out` files and pairs them by base name.
pub fn discover_pairs(
    input_dir: &Path,
    filter: &IdentifierFilter,
) -> Result<PairDiscovery, PairingError> {
    let read_error = |source| PairingError::ReadDirectory {
        path: input_dir.to_path_buf(),
        source,
    };

    let mut inputs = BTreeMap::new();
    let mut outputs = BTreeMap::new();
    for entry in fs::read_dir(input_dir).map_err(read_error)? {
        let entry = entry.map_err(read_error)?;
        let path = entry.path();
        if !entry.file_type().map_err(read_error)?.is_file() {
            continue;
        }

        let (Some(identifier), Some(extension)) = (
            path.file_stem().and_then(|stem| stem.to_str()),
            path.extension().and_then(|extension| extension.to_str()),
        ) else {
            continue;
        };
        if !filter.matches(identifier) {
            continue;
        }

        let identifier = identifier.to_string();
        match extension {
            INPUT_EXTENSION => {
                inputs.insert(identifier, path);
            }
            OUTPUT_EXTENSION => {
                outputs.insert(identifier, path);
            }
            _ => {}
        }
    }

    let discovery = pair_identifiers(inputs, outputs);
    debug!(
        directory = %input_dir.display(),
        pairs = discovery.pairs.len(),
        input_only = discovery.input_only.len(),
        output_only = discovery.output_only.len(),
        "discovered input/output pairs"
    );
    Ok(discovery)
}

/// Joins identifier-keyed input and output paths.
pub fn pair_identifiers(
    inputs: BTreeMap<String, PathBuf>,
    mut outputs: BTreeMap<String, PathBuf>,
) -> PairDiscovery {
    let mut discovery = PairDiscovery::default();
    for (identifier, input_path) in inputs {
        match outputs.remove(&identifier) {
            Some(output_path) => discovery.pairs.push(FilePair {
                identifier,
                input_path,
                output_path,
            }),
            None => discovery.input_only.push(identifier),
        }
    }
    discovery.output_only = outputs.into_keys().collect();
    discovery
}
