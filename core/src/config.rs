use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::frontier::StrategyKind;

/// Parameters for building the coarse-to-fine level stack.
///
/// Coarse results only become per-node lower bounds for the finer level
/// (reported as `proven_final`). They never seed tentative distances, so a
/// hierarchical run does at least as much relaxation work as a flat one.
/// Use it to inspect bounds, not to go faster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Upper bound on contraction steps (L).
    pub max_levels: usize,
    /// Target shrink factor (b). Also caps supernode size per step.
    pub branching_factor: usize,
    /// Tie-breaking seed for the clustering heuristic.
    pub seed: u64,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_levels: 3,
            branching_factor: 4,
            seed: 0,
        }
    }
}

impl HierarchyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_levels == 0 {
            return Err(Error::config("hierarchy max_levels must be at least 1"));
        }
        if self.branching_factor < 2 {
            return Err(Error::config(format!(
                "hierarchy branching_factor must be at least 2, got {}",
                self.branching_factor
            )));
        }
        Ok(())
    }
}

/// Run parameters for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 0.0 selects exact mode. Larger values are accepted but run exactly
    /// as 0.0 and carry no approximation guarantee.
    pub epsilon: f64,
    /// Maximum entries per batch (B).
    pub batch_size: usize,
    /// Batch ceiling across all levels. `None` runs until the frontier empties.
    pub max_iterations: Option<u64>,
    /// Check the result against a plain Dijkstra run.
    pub validate: bool,
    /// Batches at least this long relax on the rayon pool.
    pub parallel_threshold: usize,
    /// Frontier policy that picks each batch.
    pub strategy: StrategyKind,
    /// `Some` enables the multi-level hierarchy.
    pub hierarchy: Option<HierarchyConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.0,
            batch_size: 64,
            max_iterations: None,
            validate: false,
            parallel_threshold: 256,
            strategy: StrategyKind::Bucket,
            hierarchy: None,
        }
    }
}

impl EngineConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_hierarchy(mut self, hierarchy: HierarchyConfig) -> Self {
        self.hierarchy = Some(hierarchy);
        self
    }

    pub fn is_exact(&self) -> bool {
        self.epsilon == 0.0
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be at least 1"));
        }
        if self.max_iterations == Some(0) {
            return Err(Error::config("max_iterations must be at least 1"));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(Error::config(format!(
                "epsilon must be finite and non-negative, got {}",
                self.epsilon
            )));
        }
        if let Some(h) = &self.hierarchy {
            h.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
        assert!(EngineConfig::default()
            .with_hierarchy(HierarchyConfig::default())
            .validate()
            .is_ok());
    }

    #[test]
    fn test_zero_batch_rejected() {
        let err = EngineConfig::default().with_batch_size(0).validate();
        assert!(matches!(err, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let err = EngineConfig::default().with_max_iterations(0).validate();
        assert!(matches!(err, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_bad_epsilon_rejected() {
        for eps in [-0.5, f64::NAN, f64::INFINITY] {
            let err = EngineConfig::default().with_epsilon(eps).validate();
            assert!(matches!(err, Err(Error::InvalidConfig(_))), "epsilon {eps}");
        }
        assert!(EngineConfig::default().with_epsilon(0.1).validate().is_ok());
    }

    #[test]
    fn test_bad_hierarchy_rejected() {
        let h = HierarchyConfig {
            branching_factor: 1,
            ..HierarchyConfig::default()
        };
        assert!(EngineConfig::default().with_hierarchy(h).validate().is_err());

        let h = HierarchyConfig {
            max_levels: 0,
            ..HierarchyConfig::default()
        };
        assert!(EngineConfig::default().with_hierarchy(h).validate().is_err());
    }

    #[test]
    fn test_exact_mode() {
        assert!(EngineConfig::default().is_exact());
        assert!(!EngineConfig::default().with_epsilon(0.25).is_exact());
    }
}
