pub mod errors;

pub use errors::{ErrorCategory, PipelineResult, Qe2MaceError, Qe2MaceResult};

use serde::Serialize;
use std::fmt::{Display, Formatter};

pub type Vector3 = [f64; 3];

/// Periodic simulation box in Å, one lattice vector per row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CellMatrix {
    rows: [Vector3; 3],
}

impl CellMatrix {
    pub const fn new(rows: [Vector3; 3]) -> Self {
        Self { rows }
    }

    /// Builds a cell only from exactly three rows.
    pub fn from_rows(rows: &[Vector3]) -> Option<Self> {
        match rows {
            [a, b, c] => Some(Self::new([*a, *b, *c])),
            _ => None,
        }
    }

    pub const fn rows(&self) -> &[Vector3; 3] {
        &self.rows
    }

    pub fn flattened(&self) -> [f64; 9] {
        let [a, b, c] = self.rows;
        [a[0], a[1], a[2], b[0], b[1], b[2], c[0], c[1], c[2]]
    }

    pub fn map(&self, convert: impl Fn(f64) -> f64) -> Self {
        Self::new(self.rows.map(|row| row.map(&convert)))
    }

    /// Cartesian position of fractional coordinates in this cell.
    pub fn fractional_to_cartesian(&self, fractional: Vector3) -> Vector3 {
        let mut cartesian = [0.0; 3];
        for (weight, row) in fractional.iter().zip(self.rows.iter()) {
            for axis in 0..3 {
                cartesian[axis] += weight * row[axis];
            }
        }
        cartesian
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtomSite {
    pub species: String,
    pub position: Vector3,
}

impl AtomSite {
    pub fn new(species: impl Into<String>, position: Vector3) -> Self {
        Self {
            species: species.into(),
            position,
        }
    }
}

/// Unit option attached to a `CELL_PARAMETERS` or `ATOMIC_POSITIONS` card.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardUnits {
    #[default]
    Unspecified,
    Angstrom,
    Bohr,
    Crystal,
    Alat,
    Other(String),
}

impl CardUnits {
    /// Parses the option that follows a card keyword, e.g. `{angstrom}`,
    /// `(bohr)` or a bare `crystal`.
    pub fn from_option(option: &str) -> Self {
        let normalized = option
            .trim()
            .trim_matches(|c| matches!(c, '{' | '}' | '(' | ')'))
            .trim()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "" => Self::Unspecified,
            "angstrom" => Self::Angstrom,
            "bohr" => Self::Bohr,
            "crystal" => Self::Crystal,
            "alat" => Self::Alat,
            _ => Self::Other(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Angstrom => "angstrom",
            Self::Bohr => "bohr",
            Self::Crystal => "crystal",
            Self::Alat => "alat",
            Self::Other(option) => option,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InputBlock {
    #[serde(rename = "CELL_PARAMETERS")]
    CellParameters,
    #[serde(rename = "ATOMIC_POSITIONS")]
    AtomicPositions,
}

impl InputBlock {
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::CellParameters => "CELL_PARAMETERS",
            Self::AtomicPositions => "ATOMIC_POSITIONS",
        }
    }
}

impl Display for InputBlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A line inside a recognised block that did not have the block's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MalformedLine {
    pub block: InputBlock,
    pub source_line: usize,
}

/// Best-effort result of scanning one `pw.x` input file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedInput {
    pub cell_rows: Vec<Vector3>,
    pub cell_units: CardUnits,
    /// Line of the last `CELL_PARAMETERS` header seen.
    pub cell_source_line: Option<usize>,
    /// Labels from `ATOMIC_SPECIES`; informational only.
    pub declared_species: Vec<String>,
    pub atoms: Vec<AtomSite>,
    pub position_units: CardUnits,
    pub malformed: Vec<MalformedLine>,
}

impl ParsedInput {
    pub fn cell(&self) -> Option<CellMatrix> {
        CellMatrix::from_rows(&self.cell_rows)
    }
}

/// Energy (eV) and forces (eV/Å) extracted from one `pw.x` output file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedOutput {
    pub total_energy: Option<f64>,
    pub forces: Vec<Vector3>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    CellParameters,
    AtomicPositions,
    TotalEnergy,
    Forces,
}

impl RequiredField {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CellParameters => "cell parameters",
            Self::AtomicPositions => "atomic positions",
            Self::TotalEnergy => "total energy",
            Self::Forces => "forces",
        }
    }
}

/// Why an identifier was left out of the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    #[error("malformed {block} block (line {source_line})")]
    MalformedBlock {
        block: InputBlock,
        source_line: usize,
    },
    #[error("missing {}", field.as_str())]
    MissingField { field: RequiredField },
    #[error("{atoms} atoms but {forces} force vectors")]
    ForceCountMismatch { atoms: usize, forces: usize },
    #[error("unsupported {block} units '{units}'")]
    UnsupportedUnits { block: InputBlock, units: String },
    #[error("failed to read '{path}': {message}")]
    Unreadable { path: String, message: String },
}

/// One validated training structure. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureRecord {
    identifier: String,
    cell: CellMatrix,
    atoms: Vec<AtomSite>,
    energy: f64,
    forces: Vec<Vector3>,
}

impl StructureRecord {
    pub fn new(
        identifier: impl Into<String>,
        cell: CellMatrix,
        atoms: Vec<AtomSite>,
        energy: f64,
        forces: Vec<Vector3>,
    ) -> Result<Self, RejectionReason> {
        if atoms.is_empty() {
            return Err(RejectionReason::MissingField {
                field: RequiredField::AtomicPositions,
            });
        }
        if forces.is_empty() {
            return Err(RejectionReason::MissingField {
                field: RequiredField::Forces,
            });
        }
        if atoms.len() != forces.len() {
            return Err(RejectionReason::ForceCountMismatch {
                atoms: atoms.len(),
                forces: forces.len(),
            });
        }

        Ok(Self {
            identifier: identifier.into(),
            cell,
            atoms,
            energy,
            forces,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub const fn cell(&self) -> &CellMatrix {
        &self.cell
    }

    pub fn atoms(&self) -> &[AtomSite] {
        &self.atoms
    }

    pub const fn energy(&self) -> f64 {
        self.energy
    }

    pub fn forces(&self) -> &[Vector3] {
        &self.forces
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }
}

/// Accepted records in sorted-identifier order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    records: Vec<StructureRecord>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: StructureRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[StructureRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StructureRecord> {
        self.records.iter()
    }
}

impl From<Vec<StructureRecord>> for Dataset {
    fn from(records: Vec<StructureRecord>) -> Self {
        Self { records }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a StructureRecord;
    type IntoIter = std::slice::Iter<'a, StructureRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AtomSite, CardUnits, CellMatrix, InputBlock, RejectionReason, RequiredField,
        StructureRecord,
    };

    #[test]
    fn cell_requires_exactly_three_rows() {
        assert!(CellMatrix::from_rows(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]).is_none());
        let cell = CellMatrix::from_rows(&[[2.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 4.0]])
            .expect("three rows should build a cell");
        assert_eq!(cell.flattened(), [2.0, 0.0, 0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 4.0]);
    }

    #[test]
    fn fractional_coordinates_follow_lattice_rows() {
        let cell = CellMatrix::new([[2.0, 0.0, 0.0], [1.0, 2.0, 0.0], [0.0, 0.0, 4.0]]);
        assert_eq!(cell.fractional_to_cartesian([0.5, 0.5, 0.25]), [1.5, 1.0, 1.0]);
    }

    #[test]
    fn card_units_accept_braces_parentheses_and_bare_options() {
        assert_eq!(CardUnits::from_option("{angstrom}"), CardUnits::Angstrom);
        assert_eq!(CardUnits::from_option("(Bohr)"), CardUnits::Bohr);
        assert_eq!(CardUnits::from_option("crystal"), CardUnits::Crystal);
        assert_eq!(CardUnits::from_option(""), CardUnits::Unspecified);
        assert_eq!(
            CardUnits::from_option("{crystal_sg}"),
            CardUnits::Other("crystal_sg".to_string())
        );
    }

    #[test]
    fn record_construction_enforces_force_alignment() {
        let cell = CellMatrix::new([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        let atoms = vec![
            AtomSite::new("Si", [0.0, 0.0, 0.0]),
            AtomSite::new("O", [1.0, 1.0, 1.0]),
        ];

        let error = StructureRecord::new("A001", cell, atoms.clone(), -1.0, vec![[0.0; 3]])
            .expect_err("mismatched forces should be rejected");
        assert_eq!(
            error,
            RejectionReason::ForceCountMismatch {
                atoms: 2,
                forces: 1
            }
        );

        let error = StructureRecord::new("A001", cell, Vec::new(), -1.0, Vec::new())
            .expect_err("empty atoms should be rejected");
        assert_eq!(
            error,
            RejectionReason::MissingField {
                field: RequiredField::AtomicPositions,
            }
        );

        let record = StructureRecord::new("A001", cell, atoms, -1.0, vec![[0.0; 3]; 2])
            .expect("aligned record should build");
        assert_eq!(record.atom_count(), 2);
        assert_eq!(record.identifier(), "A001");
    }

    #[test]
    fn rejection_reasons_render_for_reports() {
        let reason = RejectionReason::MalformedBlock {
            block: InputBlock::CellParameters,
            source_line: 7,
        };
        assert_eq!(reason.to_string(), "malformed CELL_PARAMETERS block (line 7)");
        assert_eq!(
            RejectionReason::MissingField {
                field: RequiredField::TotalEnergy
            }
            .to_string(),
            "missing total energy"
        );
    }
}
