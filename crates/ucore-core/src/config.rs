//! Numeric policy for decomposition and maintenance.
//!
//! Every epsilon comparison in the crate reads its constant from
//! [`CoreConfig`] so that "round ended" and "bound moved" decisions are
//! made against one value per concern.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Thresholds at or below this are not recorded by the index builder, and a
/// round recording nothing above it ends the order progression.
pub const PEEL_EPSILON: f64 = 1e-3;

/// Significance level for thresholds confirmed during maintenance and for
/// revising the maintenance upper bound.
pub const MAINTENANCE_EPSILON: f64 = 1e-4;

/// Slack added to the lower endpoint's stored threshold to seed the
/// maintenance upper bound.
pub const BOUND_INCREMENT: f64 = 0.01;

/// Largest tolerated `|p[u][v] - p[v][u]|` when validating an input matrix.
pub const SYMMETRY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    pub peel_epsilon: f64,
    pub maintenance_epsilon: f64,
    pub bound_increment: f64,
    /// Read by [`UncertainGraph::from_matrix_with_config`].
    ///
    /// [`UncertainGraph::from_matrix_with_config`]: crate::graph::UncertainGraph::from_matrix_with_config
    pub symmetry_tolerance: f64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            peel_epsilon: PEEL_EPSILON,
            maintenance_epsilon: MAINTENANCE_EPSILON,
            bound_increment: BOUND_INCREMENT,
            symmetry_tolerance: SYMMETRY_TOLERANCE,
        }
    }
}

impl CoreConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        let fields = [
            ("peel_epsilon", self.peel_epsilon),
            ("maintenance_epsilon", self.maintenance_epsilon),
            ("bound_increment", self.bound_increment),
            ("symmetry_tolerance", self.symmetry_tolerance),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(CoreError::validation(format!(
                    "{name} must be finite and >= 0"
                )));
            }
        }
        if self.peel_epsilon >= 1.0 {
            return Err(CoreError::validation("peel_epsilon must be < 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.peel_epsilon, 1e-3);
        assert_eq!(config.maintenance_epsilon, 1e-4);
    }

    #[test]
    fn rejects_negative_and_non_finite_values() {
        let config = CoreConfig {
            peel_epsilon: -1.0,
            ..CoreConfig::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Validation { .. })));

        let config = CoreConfig {
            bound_increment: f64::NAN,
            ..CoreConfig::default()
        };
        assert!(config.validate().is_err());

        let config = CoreConfig {
            peel_epsilon: 1.0,
            ..CoreConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
