//! Extended-XYZ encoding of a [`Dataset`](crate::domain::Dataset).

mod reader;
mod serialization;
mod writer;

pub use reader::{ExtxyzReadError, read_extxyz};
pub use serialization::{format_fixed_f64, format_real, normalize_text_artifact, write_text_artifact};
pub use writer::{DatasetWriteError, WriteOutcome, encode_extxyz, write_extxyz};

/// Per-atom column layout written into every frame header.
pub const PROPERTIES: &str = "species:S:1:pos:R:3:forces:R:3";
