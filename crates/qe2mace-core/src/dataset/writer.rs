use super::PROPERTIES;
use super::serialization::{format_fixed_f64, format_real, write_text_artifact};
use crate::domain::{Dataset, Qe2MaceError, StructureRecord};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Right-aligned width of a numeric column, after its separating space.
const COLUMN_WIDTH: usize = 15;
const COLUMN_PRECISION: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written {
        path: PathBuf,
        structure_count: usize,
    },
    /// Nothing to write; no file was created.
    Empty,
}

impl WriteOutcome {
    pub fn was_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetWriteError {
    #[error("failed to create output directory '{}': {source}", path.display())]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write dataset '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<DatasetWriteError> for Qe2MaceError {
    fn from(error: DatasetWriteError) -> Self {
        Qe2MaceError::io_system("IO.DATASET_WRITE", error.to_string())
    }
}

pub fn encode_extxyz(dataset: &Dataset) -> String {
    let mut encoded = String::new();
    for record in dataset {
        encode_frame(&mut encoded, record);
    }
    encoded
}

/// Writes the dataset, or reports [`WriteOutcome::Empty`] without touching
/// the filesystem when there is nothing to write.
pub fn write_extxyz(path: &Path, dataset: &Dataset) -> Result<WriteOutcome, DatasetWriteError> {
    if dataset.is_empty() {
        debug!(path = %path.display(), "dataset is empty; skipping write");
        return Ok(WriteOutcome::Empty);
    }

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| DatasetWriteError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    write_text_artifact(path, &encode_extxyz(dataset)).map_err(|source| {
        DatasetWriteError::Write {
            path: path.to_path_buf(),
            source,
        }
    })?;

    info!(
        path = %path.display(),
        structures = dataset.len(),
        "wrote extended XYZ dataset"
    );
    Ok(WriteOutcome::Written {
        path: path.to_path_buf(),
        structure_count: dataset.len(),
    })
}

fn encode_frame(out: &mut String, record: &StructureRecord) {
    let lattice = record
        .cell()
        .flattened()
        .iter()
        .map(|value| format_real(*value))
        .collect::<Vec<_>>()
        .join(" ");

    out.push_str(&format!("{}\n", record.atom_count()));
    out.push_str(&format!(
        "Lattice=\"{}\" Properties={} energy={} pbc=\"T T T\"\n",
        lattice,
        PROPERTIES,
        format_real(record.energy())
    ));

    for (atom, force) in record.atoms().iter().zip(record.forces()) {
        out.push_str(&format!("{:<8}", atom.species));
        for value in atom.position.iter().chain(force.iter()) {
            out.push(' ');
            out.push_str(&format_fixed_f64(*value, COLUMN_WIDTH, COLUMN_PRECISION));
        }
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::{WriteOutcome, encode_extxyz, write_extxyz};
    use crate::dataset::read_extxyz;
    use crate::domain::{AtomSite, CellMatrix, Dataset, StructureRecord};
    use std::fs;
    use tempfile::TempDir;

    fn sample_dataset() -> Dataset {
        let record = StructureRecord::new(
            "A001",
            CellMatrix::new([[5.43, 0.0, 0.0], [0.0, 5.43, 0.0], [0.0, 0.0, 5.43]]),
            vec![
                AtomSite::new("Si", [0.0, 0.0, 0.0]),
                AtomSite::new("O", [1.0, 1.0, 1.0]),
            ],
            -136.05698,
            vec![[2.5711043, 0.0, 0.0], [0.0, 2.5711043, 0.0]],
        )
        .expect("record should build");
        Dataset::from(vec![record])
    }

    #[test]
    fn frames_carry_count_header_and_atom_columns() {
        let encoded = encode_extxyz(&sample_dataset());
        let lines = encoded.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "2");
        assert_eq!(
            lines[1],
            "Lattice=\"5.43 0.0 0.0 0.0 5.43 0.0 0.0 0.0 5.43\" \
             Properties=species:S:1:pos:R:3:forces:R:3 energy=-136.05698 pbc=\"T T T\""
        );
        assert_eq!(
            lines[2],
            "Si            0.00000000      0.00000000      0.00000000      2.57110430      0.00000000      0.00000000"
        );
        assert!(lines[3].starts_with("O       "));
    }

    #[test]
    fn wide_values_and_long_species_stay_separated() {
        let record = StructureRecord::new(
            "wide",
            CellMatrix::new([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]),
            vec![AtomSite::new("Xlongspecies", [12345678.5, -2345678.25, 0.0])],
            -1.0,
            vec![[-99999999.0, 0.0, 1e9]],
        )
        .expect("record should build");

        let encoded = encode_extxyz(&Dataset::from(vec![record]));
        let reread = read_extxyz(&encoded).expect("wide columns should read back");
        let frame = &reread.records()[0];
        assert_eq!(frame.atoms()[0].species, "Xlongspecies");
        assert_eq!(frame.atoms()[0].position, [12345678.5, -2345678.25, 0.0]);
        assert_eq!(frame.forces()[0], [-99999999.0, 0.0, 1e9]);
    }

    #[test]
    fn empty_dataset_writes_nothing() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("out/dataset.xyz");

        let outcome = write_extxyz(&path, &Dataset::new()).expect("empty write should succeed");
        assert_eq!(outcome, WriteOutcome::Empty);
        assert!(!outcome.was_written());
        assert!(!path.exists());
    }

    #[test]
    fn dataset_is_written_with_parent_directories() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("nested/dir/dataset.xyz");

        let outcome = write_extxyz(&path, &sample_dataset()).expect("write should succeed");
        assert_eq!(
            outcome,
            WriteOutcome::Written {
                path: path.clone(),
                structure_count: 1,
            }
        );
        let written = fs::read_to_string(&path).expect("dataset should be readable");
        assert_eq!(written, encode_extxyz(&sample_dataset()));
    }
}
