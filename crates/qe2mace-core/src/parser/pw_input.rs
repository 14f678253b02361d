use super::{is_comment, is_namelist_boundary, parse_vector3, split_card_header};
use crate::domain::{AtomSite, CardUnits, InputBlock, MalformedLine, ParsedInput, Vector3};

/// Block the scanner is currently consuming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ScanMode {
    #[default]
    Idle,
    Cell,
    Species,
    Positions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineAction {
    Consumed,
    /// The current block ended on this line; the line is re-read in `Idle`.
    Reprocess,
}

#[derive(Debug, Default)]
struct InputScanner {
    mode: ScanMode,
    cell_rows: Vec<Vector3>,
    cell_units: CardUnits,
    cell_header_line: Option<usize>,
    declared_species: Vec<String>,
    atoms: Vec<AtomSite>,
    position_units: CardUnits,
    positions_closed: bool,
    malformed: Vec<MalformedLine>,
}

pub fn parse_pw_input(source: &str) -> ParsedInput {
    let mut scanner = InputScanner::default();
    for (index, line) in source.lines().enumerate() {
        scanner.feed(index + 1, line);
    }
    scanner.finish()
}

impl InputScanner {
    fn feed(&mut self, source_line: usize, line: &str) {
        let trimmed = line.trim();
        if is_comment(trimmed) {
            return;
        }

        let action = match self.mode {
            ScanMode::Idle => LineAction::Reprocess,
            ScanMode::Cell => self.feed_cell(source_line, trimmed),
            ScanMode::Species => self.feed_species(trimmed),
            ScanMode::Positions => self.feed_positions(source_line, trimmed),
        };

        if action == LineAction::Reprocess {
            self.mode = ScanMode::Idle;
            self.feed_idle(source_line, trimmed);
        }
    }

    fn feed_idle(&mut self, source_line: usize, trimmed: &str) {
        let Some((keyword, option)) = split_card_header(trimmed) else {
            return;
        };

        match keyword {
            "CELL_PARAMETERS" => {
                self.cell_rows.clear();
                self.cell_units = CardUnits::from_option(option);
                self.cell_header_line = Some(source_line);
                self.mode = ScanMode::Cell;
            }
            "ATOMIC_SPECIES" => self.mode = ScanMode::Species,
            "ATOMIC_POSITIONS" if !self.positions_closed => {
                self.position_units = CardUnits::from_option(option);
                self.mode = ScanMode::Positions;
            }
            _ => {}
        }
    }

    fn feed_cell(&mut self, source_line: usize, trimmed: &str) -> LineAction {
        if trimmed.is_empty() {
            return LineAction::Consumed;
        }
        if ends_block(trimmed) {
            self.reject_line(InputBlock::CellParameters, source_line);
            return LineAction::Reprocess;
        }

        match parse_vector3(trimmed.split_whitespace()) {
            Some(row) => {
                self.cell_rows.push(row);
                if self.cell_rows.len() == 3 {
                    self.mode = ScanMode::Idle;
                }
            }
            None => {
                self.reject_line(InputBlock::CellParameters, source_line);
                self.mode = ScanMode::Idle;
            }
        }
        LineAction::Consumed
    }

    fn feed_species(&mut self, trimmed: &str) -> LineAction {
        if trimmed.is_empty() {
            self.mode = ScanMode::Idle;
            return LineAction::Consumed;
        }
        if ends_block(trimmed) {
            return LineAction::Reprocess;
        }

        if let Some(label) = trimmed.split_whitespace().next() {
            self.declared_species.push(label.to_string());
        }
        LineAction::Consumed
    }

    fn feed_positions(&mut self, source_line: usize, trimmed: &str) -> LineAction {
        if trimmed.is_empty() {
            self.close_positions();
            return LineAction::Consumed;
        }
        if ends_block(trimmed) {
            self.close_positions();
            return LineAction::Reprocess;
        }

        let tokens = trimmed.split_whitespace().collect::<Vec<_>>();
        if tokens.len() < 4 {
            return LineAction::Consumed;
        }

        match parse_atom_line(&tokens) {
            Some(site) => self.atoms.push(site),
            None => self.reject_line(InputBlock::AtomicPositions, source_line),
        }
        LineAction::Consumed
    }

    fn close_positions(&mut self) {
        self.positions_closed = true;
        self.mode = ScanMode::Idle;
    }

    fn reject_line(&mut self, block: InputBlock, source_line: usize) {
        self.malformed.push(MalformedLine { block, source_line });
    }

    fn finish(self) -> ParsedInput {
        ParsedInput {
            cell_rows: self.cell_rows,
            cell_units: self.cell_units,
            cell_source_line: self.cell_header_line,
            declared_species: self.declared_species,
            atoms: self.atoms,
            position_units: self.position_units,
            malformed: self.malformed,
        }
    }
}

fn ends_block(trimmed: &str) -> bool {
    split_card_header(trimmed).is_some() || is_namelist_boundary(trimmed)
}

fn parse_atom_line(tokens: &[&str]) -> Option<AtomSite> {
    let species = tokens.first()?;
    let position = parse_vector3(tokens[1..].iter().copied())?;
    Some(AtomSite::new(*species, position))
}
