//! Thermal storage attached to a sampled share of the generated buildings.

use fdr_core::{ObjectTree, Record};
use rand::Rng;

use crate::sampling::sample_without_replacement;
use crate::tech::TechParameters;

/// Attach a `thermal_storage` to `penetration` percent of `houses`.
///
/// Returns the houses that received one, in draw order.
pub fn attach_thermal_storage(
    tree: &mut ObjectTree,
    houses: &[String],
    penetration: f64,
    tech: &TechParameters,
    rng: &mut impl Rng,
) -> Vec<String> {
    let count = (houses.len() as f64 * penetration.clamp(0.0, 100.0) / 100.0).round() as usize;
    let chosen = sample_without_replacement(rng, houses, count);
    for house in &chosen {
        tree.push(
            Record::object("thermal_storage")
                .with("name", format!("thermal_storage_{house}"))
                .with("parent", house.clone())
                .with("SOC", format!("{:.2}", tech.ts_soc))
                .with("k", format!("{:.2}", tech.ts_k)),
        );
    }
    tracing::debug!(candidates = houses.len(), attached = chosen.len(), "thermal storage");
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tech::TechnologyCase;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn attaches_requested_share_once_per_house() {
        let tech = TechParameters::for_case(TechnologyCase::ThermalStorage);
        let houses: Vec<String> = (0..40).map(|i| format!("house{i}_a")).collect();
        let mut tree = ObjectTree::new();
        let chosen = attach_thermal_storage(&mut tree, &houses, 25.0, &tech, &mut StdRng::seed_from_u64(4));
        assert_eq!(chosen.len(), 10);
        assert_eq!(tree.count_kind("thermal_storage"), 10);
        let first = tree.by_name(&format!("thermal_storage_{}", chosen[0])).unwrap();
        assert_eq!(first.parent(), Some(chosen[0].as_str()));
    }

    #[test]
    fn zero_penetration_is_a_no_op() {
        let tech = TechParameters::for_case(TechnologyCase::ThermalStorage);
        let mut tree = ObjectTree::new();
        let chosen = attach_thermal_storage(&mut tree, &["h".to_string()], 0.0, &tech, &mut StdRng::seed_from_u64(4));
        assert!(chosen.is_empty());
        assert_eq!(tree.count_kind("thermal_storage"), 0);
    }
}
