//! Batch formulation metrics
//!
//! Pure derivations over a batch's must composition and ingredient list:
//! estimated volume, pulp mass fraction, and per-ingredient concentration.
//! Everything here is deterministic, total, and storage-free; degenerate
//! inputs produce 0 or "N/A", never an error.

use serde::Serialize;

use super::numeric::parse_or_zero;
use crate::models::{Batch, IngredientUsage};

/// Volume contributed by one kilogram of fruit pulp, in liters.
///
/// A design approximation, not a measured conversion: crushed pulp is
/// mostly juice, and 0.7 L/kg is close enough for hobby-scale estimates.
/// Callers that want a different factor use [`Formulation::from_must_with_factor`].
pub const PULP_VOLUME_FACTOR_L_PER_KG: f64 = 0.7;

/// Derived formulation metrics for a batch.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Formulation {
    /// Water volume plus the pulp's estimated volume contribution.
    pub estimated_volume_l: f64,
    /// Pulp + water + sugar, treating 1 L of water as 1 kg.
    pub total_mass_kg: f64,
    /// Pulp share of the total mass, 0 when the total is 0.
    pub pulp_mass_fraction_percent: f64,
}

impl Formulation {
    /// Compute the formulation metrics for a batch snapshot.
    pub fn compute(batch: &Batch) -> Self {
        Self::from_must(
            &batch.must.pulp_mass_kg,
            &batch.must.water_volume_l,
            &batch.adjustments.added_sugar_kg,
        )
    }

    /// Compute from the raw must fields with the default pulp factor.
    pub fn from_must(pulp_mass_kg: &str, water_volume_l: &str, added_sugar_kg: &str) -> Self {
        Self::from_must_with_factor(
            pulp_mass_kg,
            water_volume_l,
            added_sugar_kg,
            PULP_VOLUME_FACTOR_L_PER_KG,
        )
    }

    /// Compute from the raw must fields with an explicit pulp factor.
    ///
    /// Unparseable or empty fields contribute 0.
    pub fn from_must_with_factor(
        pulp_mass_kg: &str,
        water_volume_l: &str,
        added_sugar_kg: &str,
        pulp_volume_factor: f64,
    ) -> Self {
        let pulp_kg = parse_or_zero(pulp_mass_kg);
        let water_l = parse_or_zero(water_volume_l);
        let sugar_kg = parse_or_zero(added_sugar_kg);

        let estimated_volume_l = water_l + pulp_kg * pulp_volume_factor;
        let total_mass_kg = pulp_kg + water_l + sugar_kg;
        let pulp_mass_fraction_percent = if total_mass_kg > 0.0 {
            pulp_kg / total_mass_kg * 100.0
        } else {
            0.0
        };

        Self {
            estimated_volume_l,
            total_mass_kg,
            pulp_mass_fraction_percent,
        }
    }

    /// Concentration label for one ingredient usage at this volume.
    pub fn concentration_of(&self, ingredient: &IngredientUsage) -> String {
        concentration(self.estimated_volume_l, &ingredient.quantity, &ingredient.unit)
    }
}

/// Grams-per-liter label for an amount dissolved in the estimated volume.
///
/// "N/A" when the volume is 0. Quantities in kg are converted to grams;
/// every other unit (g, mL, L, count) is passed through unconverted, so
/// the label is only physically meaningful for mass units.
pub fn concentration(estimated_volume_l: f64, quantity: &str, unit: &str) -> String {
    if estimated_volume_l == 0.0 {
        return "N/A".to_string();
    }

    let amount = parse_or_zero(quantity);
    let amount_in_grams = if unit.trim().eq_ignore_ascii_case("kg") {
        amount * 1000.0
    } else {
        amount
    };

    format!("{:.2} g/L", amount_in_grams / estimated_volume_l)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_volume_adds_pulp_contribution() {
        let f = Formulation::from_must("20", "5", "");
        assert_eq!(f.estimated_volume_l, 19.0);
    }

    #[test]
    fn test_estimated_volume_never_below_water_volume() {
        for (pulp, water) in [("0", "10"), ("3", "10"), ("12.5", "0"), ("20", "5")] {
            let f = Formulation::from_must(pulp, water, "1");
            assert!(f.estimated_volume_l >= parse_or_zero(water));
        }
    }

    #[test]
    fn test_pulp_fraction_guards_divide_by_zero() {
        let f = Formulation::from_must("0", "0", "0");
        assert_eq!(f.pulp_mass_fraction_percent, 0.0);

        let f = Formulation::from_must("", "", "");
        assert_eq!(f.pulp_mass_fraction_percent, 0.0);
    }

    #[test]
    fn test_pulp_fraction_for_reference_batch() {
        // 20 kg pulp + 5 L water + 1 kg sugar = 26 kg total
        let f = Formulation::from_must("20", "5", "1");
        assert_eq!(f.total_mass_kg, 26.0);
        assert!((f.pulp_mass_fraction_percent - 76.923).abs() < 0.001);
    }

    #[test]
    fn test_unparseable_fields_contribute_zero() {
        let f = Formulation::from_must("abc", "5", "x");
        assert_eq!(f.estimated_volume_l, 5.0);
        assert_eq!(f.total_mass_kg, 5.0);
    }

    #[test]
    fn test_comma_decimals_are_accepted() {
        let f = Formulation::from_must("2,5", "1", "");
        assert_eq!(f.estimated_volume_l, 1.0 + 2.5 * 0.7);
    }

    #[test]
    fn test_custom_pulp_factor() {
        let f = Formulation::from_must_with_factor("10", "0", "", 0.5);
        assert_eq!(f.estimated_volume_l, 5.0);
    }

    #[test]
    fn test_concentration_converts_kilograms() {
        // 5 kg in 19 L: 5000 / 19 = 263.157..., rounded to 2 decimals
        assert_eq!(concentration(19.0, "5", "kg"), "263.16 g/L");
    }

    #[test]
    fn test_concentration_passes_other_units_through() {
        assert_eq!(concentration(19.0, "5", "g"), "0.26 g/L");
        assert_eq!(concentration(10.0, "30", "mL"), "3.00 g/L");
    }

    #[test]
    fn test_concentration_na_at_zero_volume() {
        assert_eq!(concentration(0.0, "5", "kg"), "N/A");
    }

    #[test]
    fn test_concentration_unit_match_is_case_insensitive() {
        assert_eq!(concentration(19.0, "5", "KG"), "263.16 g/L");
        assert_eq!(concentration(19.0, "5", " kg "), "263.16 g/L");
    }

    #[test]
    fn test_compute_is_deterministic() {
        let a = Formulation::from_must("20", "5", "1");
        let b = Formulation::from_must("20", "5", "1");
        assert_eq!(a.estimated_volume_l, b.estimated_volume_l);
        assert_eq!(a.total_mass_kg, b.total_mass_kg);
        assert_eq!(a.pulp_mass_fraction_percent, b.pulp_mass_fraction_percent);
        assert_eq!(concentration(19.0, "5", "kg"), concentration(19.0, "5", "kg"));
    }
}
