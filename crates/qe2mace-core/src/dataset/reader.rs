use crate::domain::{
    AtomSite, CellMatrix, Dataset, Qe2MaceError, RejectionReason, StructureRecord, Vector3,
};
use crate::parser::parse_real;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtxyzReadError {
    #[error("line {line}: expected an atom count, found '{found}'")]
    AtomCount { line: usize, found: String },
    #[error("line {line}: frame header is missing")]
    MissingHeader { line: usize },
    #[error("line {line}: missing or malformed '{key}'")]
    HeaderField { line: usize, key: &'static str },
    #[error("line {line}: Properties '{properties}' lack species, pos or forces columns")]
    Properties { line: usize, properties: String },
    #[error("line {line}: frame ended after {found} of {expected} atom lines")]
    Truncated {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: malformed atom line")]
    AtomLine { line: usize },
    #[error("line {line}: {reason}")]
    Frame {
        line: usize,
        reason: RejectionReason,
    },
}

impl From<ExtxyzReadError> for Qe2MaceError {
    fn from(error: ExtxyzReadError) -> Self {
        Qe2MaceError::input_validation("INPUT.DATASET_FORMAT", error.to_string())
    }
}

/// Column offsets of the properties this crate writes.
#[derive(Debug, Clone, Copy)]
struct ColumnLayout {
    width: usize,
    species: usize,
    position: usize,
    forces: usize,
}

/// Reads every frame of an extended-XYZ text. Frames are named
/// `frame-<index>` since the format carries no identifiers.
pub fn read_extxyz(source: &str) -> Result<Dataset, ExtxyzReadError> {
    let lines = source.lines().collect::<Vec<_>>();
    let mut dataset = Dataset::new();
    let mut cursor = 0;

    while cursor < lines.len() {
        if lines[cursor].trim().is_empty() {
            cursor += 1;
            continue;
        }
        let record = read_frame(&lines, cursor, dataset.len())?;
        cursor += record.atom_count() + 2;
        dataset.push(record);
    }

    Ok(dataset)
}

fn read_frame(
    lines: &[&str],
    start: usize,
    frame_index: usize,
) -> Result<StructureRecord, ExtxyzReadError> {
    let count_line = start + 1;
    let atom_count = lines[start].trim().parse::<usize>().map_err(|_| {
        ExtxyzReadError::AtomCount {
            line: count_line,
            found: lines[start].trim().to_string(),
        }
    })?;

    let header_line = count_line + 1;
    let header = lines
        .get(start + 1)
        .ok_or(ExtxyzReadError::MissingHeader { line: header_line })?;
    let fields = parse_header_fields(header);

    let cell = header_value(&fields, "Lattice")
        .and_then(parse_lattice)
        .ok_or(ExtxyzReadError::HeaderField {
            line: header_line,
            key: "Lattice",
        })?;
    let energy = header_value(&fields, "energy")
        .and_then(parse_real)
        .ok_or(ExtxyzReadError::HeaderField {
            line: header_line,
            key: "energy",
        })?;
    let properties = header_value(&fields, "Properties").ok_or(ExtxyzReadError::HeaderField {
        line: header_line,
        key: "Properties",
    })?;
    let layout = parse_properties(properties).ok_or_else(|| ExtxyzReadError::Properties {
        line: header_line,
        properties: properties.to_string(),
    })?;

    // The count line is untrusted; check it against the remaining lines
    // before allocating.
    let first_atom = start + 2;
    let available = lines.len().saturating_sub(first_atom);
    if atom_count > available {
        return Err(ExtxyzReadError::Truncated {
            line: lines.len() + 1,
            expected: atom_count,
            found: available,
        });
    }

    let mut atoms = Vec::with_capacity(atom_count);
    let mut forces = Vec::with_capacity(atom_count);
    for (offset, line) in lines[first_atom..first_atom + atom_count].iter().enumerate() {
        let index = first_atom + offset;
        let (site, force) = parse_atom_columns(line, layout)
            .ok_or(ExtxyzReadError::AtomLine { line: index + 1 })?;
        atoms.push(site);
        forces.push(force);
    }

    StructureRecord::new(format!("frame-{frame_index}"), cell, atoms, energy, forces)
        .map_err(|reason| ExtxyzReadError::Frame {
            line: count_line,
            reason,
        })
}

/// Splits `key=value key="quoted value"` pairs from a frame header.
fn parse_header_fields(header: &str) -> Vec<(&str, &str)> {
    let mut fields = Vec::new();
    let mut rest = header.trim();

    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else {
            break;
        };
        let key = rest[..eq].trim();
        let after = &rest[eq + 1..];

        let (value, remainder) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after.find(char::is_whitespace) {
                Some(end) => (&after[..end], &after[end..]),
                None => (after, ""),
            }
        };

        fields.push((key, value));
        rest = remainder.trim_start();
    }

    fields
}

fn header_value<'a>(fields: &[(&str, &'a str)], key: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(key))
        .map(|(_, value)| *value)
}

fn parse_lattice(value: &str) -> Option<CellMatrix> {
    let values = value
        .split_whitespace()
        .map(parse_real)
        .collect::<Option<Vec<_>>>()?;
    if values.len() != 9 {
        return None;
    }
    Some(CellMatrix::new([
        [values[0], values[1], values[2]],
        [values[3], values[4], values[5]],
        [values[6], values[7], values[8]],
    ]))
}

fn parse_properties(value: &str) -> Option<ColumnLayout> {
    let parts = value.split(':').collect::<Vec<_>>();
    if parts.len() % 3 != 0 {
        return None;
    }

    let mut column = 0;
    let mut species = None;
    let mut position = None;
    let mut forces = None;
    for triple in parts.chunks(3) {
        let count = triple[2].parse::<usize>().ok()?;
        match (triple[0], triple[1], count) {
            ("species", "S", 1) => species = Some(column),
            ("pos", "R", 3) => position = Some(column),
            ("forces", "R", 3) => forces = Some(column),
            _ => {}
        }
        column += count;
    }

    Some(ColumnLayout {
        width: column,
        species: species?,
        position: position?,
        forces: forces?,
    })
}

fn parse_atom_columns(line: &str, layout: ColumnLayout) -> Option<(AtomSite, Vector3)> {
    let tokens = line.split_whitespace().collect::<Vec<_>>();
    if tokens.len() < layout.width {
        return None;
    }
    let vector_at = |start: usize| -> Option<Vector3> {
        Some([
            parse_real(tokens[start])?,
            parse_real(tokens[start + 1])?,
            parse_real(tokens[start + 2])?,
        ])
    };

    let site = AtomSite::new(tokens[layout.species], vector_at(layout.position)?);
    Some((site, vector_at(layout.forces)?))
}
