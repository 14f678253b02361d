//! Line scanners for `pw.x` input and output files.
//!
//! Both scanners are infallible: they return whatever they could recognise
//! and leave the accept/reject decision to the assembler.

mod pw_input;
mod pw_output;

pub use pw_input::parse_pw_input;
pub use pw_output::{ForceBlockSelection, parse_pw_output, parse_pw_output_with};

use crate::domain::Vector3;

/// Card keywords that open a new block in a `pw.x` input file.
pub const CARD_KEYWORDS: [&str; 11] = [
    "ATOMIC_SPECIES",
    "ATOMIC_POSITIONS",
    "K_POINTS",
    "ADDITIONAL_K_POINTS",
    "CELL_PARAMETERS",
    "OCCUPATIONS",
    "CONSTRAINTS",
    "ATOMIC_VELOCITIES",
    "ATOMIC_FORCES",
    "SOLVENTS",
    "HUBBARD",
];

/// Parses a real number, accepting Fortran `d`/`D` exponents.
pub fn parse_real(token: &str) -> Option<f64> {
    if let Ok(value) = token.parse::<f64>() {
        return Some(value);
    }
    if token.contains(['d', 'D']) {
        return token.replace(['d', 'D'], "e").parse::<f64>().ok();
    }
    None
}

/// First three tokens as a vector; `None` if fewer than three or any fails.
pub fn parse_vector3<'a>(mut tokens: impl Iterator<Item = &'a str>) -> Option<Vector3> {
    let x = parse_real(tokens.next()?)?;
    let y = parse_real(tokens.next()?)?;
    let z = parse_real(tokens.next()?)?;
    Some([x, y, z])
}

/// Splits a card header such as `ATOMIC_POSITIONS {angstrom}` into its
/// keyword and option text. Returns `None` for lines that are not cards.
pub fn split_card_header(trimmed: &str) -> Option<(&'static str, &str)> {
    let keyword_end = trimmed
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(trimmed.len());
    let keyword = &trimmed[..keyword_end];
    CARD_KEYWORDS
        .iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(keyword))
        .map(|candidate| (*candidate, trimmed[keyword_end..].trim()))
}

pub(crate) fn is_namelist_boundary(trimmed: &str) -> bool {
    trimmed.starts_with('&')
}

pub(crate) fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with('!') || trimmed.starts_with('#')
}

#[cfg(test)]
mod tests {
    use super::{parse_real, parse_vector3, split_card_header};

    #[test]
    fn reals_accept_fortran_exponents() {
        assert_eq!(parse_real("1.5"), Some(1.5));
        assert_eq!(parse_real("-2.0d-1"), Some(-0.2));
        assert_eq!(parse_real("3.0D+2"), Some(300.0));
        assert_eq!(parse_real("abc"), None);
        assert_eq!(parse_real("Total"), None);
    }

    #[test]
    fn vectors_need_three_numeric_tokens() {
        assert_eq!(
            parse_vector3("1.0 2.0 3.0 0 0 1".split_whitespace()),
            Some([1.0, 2.0, 3.0])
        );
        assert_eq!(parse_vector3("1.0 2.0".split_whitespace()), None);
        assert_eq!(parse_vector3("1.0 x 3.0".split_whitespace()), None);
    }

    #[test]
    fn card_headers_split_keyword_and_option() {
        assert_eq!(
            split_card_header("ATOMIC_POSITIONS {angstrom}"),
            Some(("ATOMIC_POSITIONS", "{angstrom}"))
        );
        assert_eq!(
            split_card_header("CELL_PARAMETERS(bohr)"),
            Some(("CELL_PARAMETERS", "(bohr)"))
        );
        assert_eq!(
            split_card_header("k_points automatic"),
            Some(("K_POINTS", "automatic"))
        );
        assert_eq!(split_card_header("Si 28.086 Si.pbe.UPF"), None);
        assert_eq!(split_card_header(""), None);
    }
}
