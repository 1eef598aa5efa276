//! Enology calculation module
//!
//! Pure formulation math and numeric input parsing.

pub mod formulation;
pub mod numeric;

pub use formulation::{concentration, Formulation, PULP_VOLUME_FACTOR_L_PER_KG};
pub use numeric::{normalize_numeric_input, parse_decimal, parse_or_zero};
