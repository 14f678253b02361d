use super::constants::{BOHR, RY_PER_BOHR, RYD};

pub fn ry_to_ev(value: f64) -> f64 {
    value * RYD
}

pub fn ry_per_bohr_to_ev_per_angstrom(value: f64) -> f64 {
    value * RY_PER_BOHR
}

pub fn bohr_to_angstrom(value: f64) -> f64 {
    value * BOHR
}

pub(crate) fn scale_vector(vector: [f64; 3], convert: fn(f64) -> f64) -> [f64; 3] {
    [convert(vector[0]), convert(vector[1]), convert(vector[2])]
}
