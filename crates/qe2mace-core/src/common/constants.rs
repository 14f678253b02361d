//! Physical constants used to normalise `pw.x` quantities.
//!
//! The energy and force factors are the exact literals the reference datasets
//! were produced with; changing them changes every written energy and force.

/// Rydberg in eV.
pub const RYD: f64 = 13.605_698_f64;
/// Ry/Bohr in eV/Å.
pub const RY_PER_BOHR: f64 = 25.711_043_f64;
/// Bohr radius in Å.
pub const BOHR: f64 = 0.529_177_249_f64;
