//! HMM definitions: distributions imported from text files and the
//! probability map drawn for each model

mod distribution;
mod parser;

pub use distribution::{Distribution, Kernel, KernelDensity};
pub use parser::{build_distribution, call, parse_definitions, Arg, Call};

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use tracing::info;

use crate::DataError;

/// Current range covered by the probability map, in pA
pub const MAP_RANGE_PA: (f64, f64) = (0.0, 120.0);
pub const DEFAULT_MAP_STEP: f64 = 0.05;
pub const DEFAULT_MAP_THRESHOLD: f64 = 0.01;
/// Upper bound on sample points per state
pub const MAX_MAP_SAMPLES: usize = 10_000_000;

/// One drawn cell of a probability map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapCell {
    /// State index along the model
    pub index: usize,
    pub current: f64,
    pub density: f64,
}

/// A named profile model built from imported distributions
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileModel {
    pub name: String,
    pub distributions: Vec<Distribution>,
    /// Emission for insert states
    pub insert: Distribution,
}

impl ProfileModel {
    pub fn new(name: impl Into<String>, distributions: Vec<Distribution>) -> Result<Self, DataError> {
        let insert = Distribution::uniform(0.0, 100.0).map_err(DataError::Validation)?;
        Ok(Self { name: name.into(), distributions, insert })
    }

    /// Read a definition file and build a model from it
    pub fn import(name: impl Into<String>, path: &Path) -> Result<Self, DataError> {
        let name = name.into();
        let text = fs::read_to_string(path)?;
        let distributions = parse_definitions(&text)?;
        info!(model = %name, states = distributions.len(), path = %path.display(), "Imported HMM");
        Self::new(name, distributions)
    }

    pub fn len(&self) -> usize {
        self.distributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distributions.is_empty()
    }

    /// Density of every state over [`MAP_RANGE_PA`] sampled every `step` pA,
    /// keeping cells whose density exceeds `threshold`
    pub fn probability_map(&self, step: f64, threshold: f64) -> Result<Vec<MapCell>, DataError> {
        if !(step.is_finite() && step > 0.0) {
            return Err(DataError::Validation(format!("map step must be positive, got {}", step)));
        }
        let (low, high) = MAP_RANGE_PA;
        let samples = ((high - low) / step).ceil();
        if samples > MAX_MAP_SAMPLES as f64 {
            return Err(DataError::Validation(format!(
                "map step {} gives more than {} samples per state",
                step, MAX_MAP_SAMPLES
            )));
        }
        let samples = samples as usize;

        let mut cells = Vec::new();
        for (index, distribution) in self.distributions.iter().enumerate() {
            for i in 0..samples {
                let current = low + i as f64 * step;
                let density = distribution.density(current);
                if density > threshold {
                    cells.push(MapCell { index, current, density });
                }
            }
        }
        Ok(cells)
    }
}

/// Imported models by name; re-importing a name replaces the model
#[derive(Debug, Clone, Default)]
pub struct HmmRegistry {
    models: IndexMap<String, ProfileModel>,
}

impl HmmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the model previously registered under the same name
    pub fn insert(&mut self, model: ProfileModel) -> Option<ProfileModel> {
        self.models.insert(model.name.clone(), model)
    }

    pub fn get(&self, name: &str) -> Option<&ProfileModel> {
        self.models.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_probability_map_thresholds() {
        let model = ProfileModel::new(
            "test",
            vec![Distribution::normal(30.0, 1.0).unwrap(), Distribution::uniform(0.0, 200.0).unwrap()],
        )
        .unwrap();
        let cells = model.probability_map(DEFAULT_MAP_STEP, DEFAULT_MAP_THRESHOLD).unwrap();

        assert!(cells.iter().all(|c| c.index == 0));
        assert!(cells.iter().all(|c| (c.current - 30.0).abs() < 4.0));
        assert!(cells.iter().all(|c| c.current < MAP_RANGE_PA.1));
        assert!(model.probability_map(0.0, 0.01).is_err());
    }

    #[test]
    fn test_tiny_map_step_is_rejected() {
        let model = ProfileModel::new("test", vec![Distribution::normal(30.0, 1.0).unwrap()]).unwrap();
        for step in [1e-12, f64::MIN_POSITIVE] {
            let err = model.probability_map(step, DEFAULT_MAP_THRESHOLD).unwrap_err();
            assert!(matches!(err, DataError::Validation(_)), "step {}", step);
        }
        assert!(model.probability_map(MAP_RANGE_PA.1 / MAX_MAP_SAMPLES as f64 * 10.0, 0.5).is_ok());
    }

    #[test]
    fn test_import_and_register() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hmm.txt");
        fs::write(&path, "# two states\nNormalDistribution(30, 2)\nNormalDistribution(45, 3)\n").unwrap();

        let mut registry = HmmRegistry::new();
        assert!(registry.insert(ProfileModel::import("Test HMM", &path).unwrap()).is_none());
        assert_eq!(registry.get("Test HMM").unwrap().len(), 2);

        fs::write(&path, "NormalDistribution(30, 2)\n").unwrap();
        let previous = registry.insert(ProfileModel::import("Test HMM", &path).unwrap());
        assert_eq!(previous.unwrap().len(), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("Test HMM").unwrap().len(), 1);
    }
}
