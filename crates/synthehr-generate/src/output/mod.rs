pub mod json;

pub use json::{variant_file_name, write_variant};
