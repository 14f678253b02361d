pub mod constants;
pub mod units;

pub use units::{bohr_to_angstrom, ry_per_bohr_to_ev_per_angstrom, ry_to_ev};
