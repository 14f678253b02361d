use super::{parse_real, parse_vector3};
use crate::common::{ry_per_bohr_to_ev_per_angstrom, ry_to_ev, units::scale_vector};
use crate::domain::{ParsedOutput, Vector3};
use serde::{Deserialize, Serialize};

const FORCES_HEADER: &str = "Forces acting on atoms";
const FORCE_MARKER: &str = "force =";

/// Which `Forces acting on atoms` section to keep when a log has several
/// (one per ionic step in relaxations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceBlockSelection {
    #[default]
    First,
    Last,
}

pub fn parse_pw_output(source: &str) -> ParsedOutput {
    parse_pw_output_with(source, ForceBlockSelection::First)
}

pub fn parse_pw_output_with(source: &str, selection: ForceBlockSelection) -> ParsedOutput {
    let lines = source.lines().collect::<Vec<_>>();

    // Last occurrence wins: the final `!` line of an SCF log is the converged value.
    let total_energy = lines
        .iter()
        .filter(|line| is_total_energy_line(line))
        .filter_map(|line| parse_total_energy_ry(line))
        .last()
        .map(ry_to_ev);

    let mut headers = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.contains(FORCES_HEADER))
        .map(|(index, _)| index);
    let header = match selection {
        ForceBlockSelection::First => headers.next(),
        ForceBlockSelection::Last => headers.last(),
    };

    let forces = header
        .map(|index| read_force_block(&lines[index + 1..]))
        .unwrap_or_default()
        .into_iter()
        .map(|raw| scale_vector(raw, ry_per_bohr_to_ev_per_angstrom))
        .collect();

    ParsedOutput {
        total_energy,
        forces,
    }
}

fn is_total_energy_line(line: &str) -> bool {
    line.trim_start()
        .strip_prefix('!')
        .is_some_and(|rest| rest.trim_start().starts_with("total energy"))
}

fn parse_total_energy_ry(line: &str) -> Option<f64> {
    let (_, value) = line.split_once('=')?;
    parse_real(value.split_whitespace().next()?)
}

/// Raw Ry/Bohr vectors following a forces header. Blank lines are skipped,
/// malformed `force =` lines are dropped, and any other line ends the block.
fn read_force_block(lines: &[&str]) -> Vec<Vector3> {
    let mut forces = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let Some((_, fields)) = line.split_once(FORCE_MARKER) else {
            break;
        };
        if let Some(force) = parse_force_fields(fields) {
            forces.push(force);
        }
    }
    forces
}

fn parse_force_fields(fields: &str) -> Option<Vector3> {
    parse_vector3(fields.split_whitespace())
}

#[cfg(test)]
mod tests {
    use super::{ForceBlockSelection, parse_pw_output, parse_pw_output_with};

    const SCF_OUTPUT: &str = "\
     Program PWSCF v.7.2 starts on 29May2025 at 10:00:00

     total energy              =     -10.50000000 Ry
     estimated scf accuracy    <       0.00100000 Ry

     total energy              =     -10.00100000 Ry
     estimated scf accuracy    <       0.00000100 Ry

     End of self-consistent calculation

!    total energy              =     -10.00000000 Ry
     estimated scf accuracy    <          6.7E-09 Ry

     Forces acting on atoms (cartesian axes, Ry/au):

     atom    1 type  1   force =     0.10000000    0.00000000    0.00000000
     atom    2 type  2   force =     0.00000000    0.10000000    0.00000000

     Total force =     0.141421     Total SCF correction =     0.000000

     Computing stress (Cartesian axis) and pressure
";

    #[test]
    fn energy_and_forces_are_converted_to_ev_units() {
        let parsed = parse_pw_output(SCF_OUTPUT);

        assert_eq!(parsed.total_energy, Some(-10.0 * 13.605698));
        assert_eq!(
            parsed.forces,
            vec![[0.1 * 25.711043, 0.0, 0.0], [0.0, 0.1 * 25.711043, 0.0]]
        );
    }

    #[test]
    fn last_total_energy_marker_wins() {
        let source = "\
!    total energy              =     -20.00000000 Ry
!    total energy              =     -21.50000000 Ry
     total energy              =     -99.00000000 Ry
";
        let parsed = parse_pw_output(source);
        assert_eq!(parsed.total_energy, Some(-21.5 * 13.605698));
    }

    #[test]
    fn unmarked_total_energy_lines_are_ignored() {
        let parsed = parse_pw_output("     total energy              =     -10.5 Ry\n");
        assert_eq!(parsed.total_energy, None);
        assert!(parsed.forces.is_empty());
    }

    #[test]
    fn compact_energy_marker_spacing_is_accepted() {
        let parsed = parse_pw_output("! total energy = -1.0 Ry\n");
        assert_eq!(parsed.total_energy, Some(-13.605698));
    }

    #[test]
    fn malformed_force_lines_are_skipped_without_ending_the_block() {
        let source = "\
     Forces acting on atoms (cartesian axes, Ry/au):
     atom    1 type  1   force =     0.1 0.2 0.3
     atom    2 type  1   force =     0.1 bad 0.3
     atom    3 type  1   force =     0.4
     atom    4 type  1   force =     0.4 0.5 0.6
     Writing output data file
     atom    5 type  1   force =     0.7 0.8 0.9
";
        let parsed = parse_pw_output(source);
        assert_eq!(parsed.forces.len(), 2);
        assert_eq!(parsed.forces[1][2], 0.6 * 25.711043);
    }

    #[test]
    fn missing_forces_section_yields_empty_forces() {
        let parsed = parse_pw_output("!    total energy = -3.0 Ry\n");
        assert_eq!(parsed.total_energy, Some(-3.0 * 13.605698));
        assert!(parsed.forces.is_empty());
    }

    #[test]
    fn force_block_selection_picks_first_or_last_section() {
        let source = "\
     Forces acting on atoms (cartesian axes, Ry/au):
     atom    1 type  1   force =     1.0 0.0 0.0

     Total force = 1.0
     Forces acting on atoms (cartesian axes, Ry/au):
     atom    1 type  1   force =     2.0 0.0 0.0
";
        let first = parse_pw_output_with(source, ForceBlockSelection::First);
        let last = parse_pw_output_with(source, ForceBlockSelection::Last);

        assert_eq!(first.forces, vec![[25.711043, 0.0, 0.0]]);
        assert_eq!(last.forces, vec![[2.0 * 25.711043, 0.0, 0.0]]);
    }

    #[test]
    fn parsing_is_idempotent() {
        assert_eq!(parse_pw_output(SCF_OUTPUT), parse_pw_output(SCF_OUTPUT));
    }
}
