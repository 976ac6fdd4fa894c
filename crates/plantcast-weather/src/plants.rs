//! The fixed plant table.

use crate::types::PlantRainRule;

/// Plant name and the rain chance (percent) that counts as "watered by the sky".
const PLANT_TABLE: [(&str, f64); 4] = [
    ("Rocky Mountain Maple", 60.0),
    ("Ponderosa Pine", 20.0),
    ("Blue Grama", 20.0),
    ("Western Wild Rose", 40.0),
];

/// The plants every outlook is computed against, in display order
pub fn default_plants() -> Vec<PlantRainRule> {
    PLANT_TABLE
        .iter()
        .map(|(name, threshold)| PlantRainRule::new(*name, *threshold))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_order() {
        let names: Vec<String> = default_plants().into_iter().map(|p| p.name).collect();
        assert_eq!(
            names,
            vec![
                "Rocky Mountain Maple",
                "Ponderosa Pine",
                "Blue Grama",
                "Western Wild Rose"
            ]
        );
    }

    #[test]
    fn test_thresholds_are_percentages() {
        for plant in default_plants() {
            assert!((0.0..=100.0).contains(&plant.rain_threshold_percent));
        }
    }
}
