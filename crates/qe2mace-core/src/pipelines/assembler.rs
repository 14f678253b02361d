use super::pairing::FilePair;
use crate::common::bohr_to_angstrom;
use crate::common::units::scale_vector;
use crate::domain::{
    AtomSite, CardUnits, CellMatrix, Dataset, InputBlock, ParsedInput, ParsedOutput,
    RejectionReason, RequiredField, StructureRecord, Vector3,
};
use crate::parser::{ForceBlockSelection, parse_pw_input, parse_pw_output_with};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssemblyOptions {
    pub force_block: ForceBlockSelection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedStructure {
    pub identifier: String,
    pub reason: RejectionReason,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Assembly {
    pub dataset: Dataset,
    pub rejected: Vec<RejectedStructure>,
}

/// Parses and validates every pair. Records keep the order of `pairs`, which
/// discovery already sorts by identifier.
pub fn assemble_dataset(pairs: &[FilePair], options: AssemblyOptions) -> Assembly {
    let mut assembly = Assembly::default();

    for pair in pairs {
        match assemble_pair(pair, options) {
            Ok(record) => {
                debug!(
                    identifier = %pair.identifier,
                    atoms = record.atom_count(),
                    energy_ev = record.energy(),
                    "accepted structure"
                );
                assembly.dataset.push(record);
            }
            Err(reason) => {
                warn!(identifier = %pair.identifier, %reason, "skipping structure");
                assembly.rejected.push(RejectedStructure {
                    identifier: pair.identifier.clone(),
                    reason,
                });
            }
        }
    }

    assembly
}

/// Reads both files of one pair and assembles them. Unreadable files reject
/// only this identifier.
pub fn assemble_pair(
    pair: &FilePair,
    options: AssemblyOptions,
) -> Result<StructureRecord, RejectionReason> {
    let input = parse_pw_input(&read_source(&pair.input_path)?);
    let output = parse_pw_output_with(&read_source(&pair.output_path)?, options.force_block);
    assemble_structure(&pair.identifier, &input, &output)
}

/// Validates one parsed pair and normalizes its lengths to Å.
///
/// Checks run in a fixed order: malformed lines, cell, atoms, energy,
/// forces, units, then force alignment.
pub fn assemble_structure(
    identifier: &str,
    input: &ParsedInput,
    output: &ParsedOutput,
) -> Result<StructureRecord, RejectionReason> {
    if let Some(line) = input.malformed.first() {
        return Err(RejectionReason::MalformedBlock {
            block: line.block,
            source_line: line.source_line,
        });
    }

    let Some(header_line) = input.cell_source_line else {
        return Err(missing(RequiredField::CellParameters));
    };
    let cell = input.cell().ok_or(RejectionReason::MalformedBlock {
        block: InputBlock::CellParameters,
        source_line: header_line,
    })?;

    if input.atoms.is_empty() {
        return Err(missing(RequiredField::AtomicPositions));
    }
    let energy = output
        .total_energy
        .ok_or(missing(RequiredField::TotalEnergy))?;
    if output.forces.is_empty() {
        return Err(missing(RequiredField::Forces));
    }

    let cell = normalize_cell(cell, &input.cell_units)?;
    let atoms = normalize_positions(&input.atoms, &input.position_units, &cell)?;

    StructureRecord::new(identifier, cell, atoms, energy, output.forces.clone())
}

fn missing(field: RequiredField) -> RejectionReason {
    RejectionReason::MissingField { field }
}

fn read_source(path: &Path) -> Result<String, RejectionReason> {
    fs::read_to_string(path).map_err(|source| RejectionReason::Unreadable {
        path: path.to_string_lossy().replace('\\', "/"),
        message: source.to_string(),
    })
}

fn normalize_cell(cell: CellMatrix, units: &CardUnits) -> Result<CellMatrix, RejectionReason> {
    match units {
        CardUnits::Unspecified | CardUnits::Angstrom => Ok(cell),
        CardUnits::Bohr => Ok(cell.map(bohr_to_angstrom)),
        other => Err(unsupported(InputBlock::CellParameters, other)),
    }
}

fn normalize_positions(
    atoms: &[AtomSite],
    units: &CardUnits,
    cell: &CellMatrix,
) -> Result<Vec<AtomSite>, RejectionReason> {
    atoms
        .iter()
        .map(|atom| {
            let position = normalize_position(atom.position, units, cell)?;
            Ok(AtomSite::new(atom.species.clone(), position))
        })
        .collect()
}

fn normalize_position(
    position: Vector3,
    units: &CardUnits,
    cell: &CellMatrix,
) -> Result<Vector3, RejectionReason> {
    match units {
        CardUnits::Unspecified | CardUnits::Angstrom => Ok(position),
        CardUnits::Bohr => Ok(scale_vector(position, bohr_to_angstrom)),
        CardUnits::Crystal => Ok(cell.fractional_to_cartesian(position)),
        other => Err(unsupported(InputBlock::AtomicPositions, other)),
    }
}

fn unsupported(block: InputBlock, units: &CardUnits) -> RejectionReason {
    RejectionReason::UnsupportedUnits {
        block,
        units: units.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{AssemblyOptions, assemble_dataset, assemble_structure};
    use crate::common::constants::BOHR;
    use crate::domain::{
        AtomSite, CardUnits, InputBlock, MalformedLine, ParsedInput, ParsedOutput,
        RejectionReason, RequiredField,
    };
    use crate::pipelines::pairing::FilePair;
    use std::fs;
    use tempfile::TempDir;

    fn cubic_input(edge: f64) -> ParsedInput {
        ParsedInput {
            cell_rows: vec![[edge, 0.0, 0.0], [0.0, edge, 0.0], [0.0, 0.0, edge]],
            cell_source_line: Some(1),
            atoms: vec![
                AtomSite::new("Si", [0.0, 0.0, 0.0]),
                AtomSite::new("O", [1.0, 1.0, 1.0]),
            ],
            ..ParsedInput::default()
        }
    }

    fn two_force_output() -> ParsedOutput {
        ParsedOutput {
            total_energy: Some(-136.05698),
            forces: vec![[2.5711043, 0.0, 0.0], [0.0, 2.5711043, 0.0]],
        }
    }

    #[test]
    fn complete_pair_builds_a_record() {
        let record = assemble_structure("A001", &cubic_input(5.43), &two_force_output())
            .expect("complete pair should assemble");

        assert_eq!(record.identifier(), "A001");
        assert_eq!(record.atom_count(), 2);
        assert_eq!(record.energy(), -136.05698);
        assert_eq!(record.cell().rows()[0], [5.43, 0.0, 0.0]);
    }

    #[test]
    fn short_cell_is_reported_at_its_header() {
        let mut input = cubic_input(5.43);
        input.cell_rows.truncate(2);
        input.cell_source_line = Some(9);

        let reason = assemble_structure("A001", &input, &two_force_output())
            .expect_err("two rows should be rejected");
        assert_eq!(
            reason,
            RejectionReason::MalformedBlock {
                block: InputBlock::CellParameters,
                source_line: 9,
            }
        );
    }

    #[test]
    fn missing_fields_are_reported_in_check_order() {
        let mut input = cubic_input(1.0);
        input.cell_rows.clear();
        input.cell_source_line = None;
        let reason = assemble_structure("X", &input, &ParsedOutput::default())
            .expect_err("missing cell should be rejected");
        assert_eq!(
            reason,
            RejectionReason::MissingField {
                field: RequiredField::CellParameters
            }
        );

        let output = ParsedOutput {
            total_energy: Some(-1.0),
            forces: Vec::new(),
        };
        let reason = assemble_structure("X", &cubic_input(1.0), &output)
            .expect_err("missing forces should be rejected");
        assert_eq!(
            reason,
            RejectionReason::MissingField {
                field: RequiredField::Forces
            }
        );

        let reason = assemble_structure("X", &cubic_input(1.0), &ParsedOutput::default())
            .expect_err("missing energy should be rejected");
        assert_eq!(
            reason,
            RejectionReason::MissingField {
                field: RequiredField::TotalEnergy
            }
        );
    }

    #[test]
    fn malformed_lines_take_precedence() {
        let mut input = cubic_input(1.0);
        input.malformed.push(MalformedLine {
            block: InputBlock::AtomicPositions,
            source_line: 14,
        });

        let reason = assemble_structure("X", &input, &two_force_output())
            .expect_err("malformed input should be rejected");
        assert_eq!(
            reason,
            RejectionReason::MalformedBlock {
                block: InputBlock::AtomicPositions,
                source_line: 14,
            }
        );
    }

    #[test]
    fn force_count_must_match_atoms() {
        let output = ParsedOutput {
            total_energy: Some(-1.0),
            forces: vec![[0.0; 3]],
        };
        let reason = assemble_structure("X", &cubic_input(1.0), &output)
            .expect_err("mismatch should be rejected");
        assert_eq!(
            reason,
            RejectionReason::ForceCountMismatch {
                atoms: 2,
                forces: 1
            }
        );
    }

    #[test]
    fn bohr_and_crystal_units_are_normalized_to_angstrom() {
        let mut input = cubic_input(10.0);
        input.cell_units = CardUnits::Bohr;
        input.position_units = CardUnits::Crystal;
        input.atoms = vec![
            AtomSite::new("Si", [0.0, 0.0, 0.0]),
            AtomSite::new("O", [0.5, 0.5, 0.5]),
        ];

        let record = assemble_structure("X", &input, &two_force_output())
            .expect("convertible units should assemble");
        let edge = 10.0 * BOHR;
        assert_eq!(record.cell().rows()[1], [0.0, edge, 0.0]);
        assert_eq!(record.atoms()[1].position, [0.5 * edge, 0.5 * edge, 0.5 * edge]);

        let mut input = cubic_input(1.0);
        input.position_units = CardUnits::Bohr;
        let record = assemble_structure("X", &input, &two_force_output())
            .expect("bohr positions should assemble");
        assert_eq!(record.atoms()[1].position, [BOHR, BOHR, BOHR]);
    }

    #[test]
    fn alat_positions_are_unsupported() {
        let mut input = cubic_input(1.0);
        input.position_units = CardUnits::Alat;

        let reason = assemble_structure("X", &input, &two_force_output())
            .expect_err("alat should be rejected");
        assert_eq!(
            reason,
            RejectionReason::UnsupportedUnits {
                block: InputBlock::AtomicPositions,
                units: "alat".to_string(),
            }
        );
    }

    #[test]
    fn unreadable_output_rejects_only_that_identifier() {
        let temp = TempDir::new().expect("tempdir should be created");
        let input_path = temp.path().join("A001.in");
        fs::write(
            &input_path,
            "CELL_PARAMETERS\n1 0 0\n0 1 0\n0 0 1\nATOMIC_POSITIONS\nH 0 0 0\n",
        )
        .expect("input should be written");
        let output_path = temp.path().join("A001.out");
        fs::write(
            &output_path,
            "!    total energy = -1.0 Ry\nForces acting on atoms\n  atom 1 type 1 force = 0.0 0.0 0.1\n",
        )
        .expect("output should be written");

        let pairs = vec![
            FilePair {
                identifier: "A001".to_string(),
                input_path: input_path.clone(),
                output_path,
            },
            FilePair {
                identifier: "A002".to_string(),
                input_path,
                output_path: temp.path().join("A002.out"),
            },
        ];

        let assembly = assemble_dataset(&pairs, AssemblyOptions::default());
        assert_eq!(assembly.dataset.len(), 1);
        assert_eq!(assembly.rejected.len(), 1);
        assert_eq!(assembly.rejected[0].identifier, "A002");
        assert!(matches!(
            assembly.rejected[0].reason,
            RejectionReason::Unreadable { .. }
        ));
    }
}
