//! Tuning knobs for salience decay, history bounds, and extraction.

/// Salience decay and entity collection bounds.
///
/// Decay is linear in turn distance with a floor:
/// `max(floor, salience * (1 - distance * decay_per_turn))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SalienceConfig {
    /// Salience lost per turn of distance from the last mention.
    pub decay_per_turn: f32,
    /// Lowest salience decay can reach.
    pub floor: f32,
    /// Salience assigned to a fresh mention that does not state one.
    pub default_salience: f32,
    /// Maximum members of each ranked entity collection.
    pub max_entities: usize,
    /// Maximum measurements retained (most recent).
    pub max_measurements: usize,
}

impl Default for SalienceConfig {
    fn default() -> Self {
        Self {
            decay_per_turn: 0.1,
            floor: 0.3,
            default_salience: 1.0,
            max_entities: 10,
            max_measurements: 10,
        }
    }
}

impl SalienceConfig {
    /// Checks that the knobs describe a usable decay model.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] when a value is out of range.
    pub fn validate(&self) -> crate::Result<()> {
        if !(0.0..=1.0).contains(&self.decay_per_turn) {
            return Err(crate::Error::InvalidInput(format!(
                "salience.decay_per_turn must be within [0, 1], got {}",
                self.decay_per_turn
            )));
        }
        if !(0.0..=1.0).contains(&self.floor) {
            return Err(crate::Error::InvalidInput(format!(
                "salience.floor must be within [0, 1], got {}",
                self.floor
            )));
        }
        if !(0.0..=1.0).contains(&self.default_salience) {
            return Err(crate::Error::InvalidInput(format!(
                "salience.default must be within [0, 1], got {}",
                self.default_salience
            )));
        }
        if self.max_entities == 0 || self.max_measurements == 0 {
            return Err(crate::Error::InvalidInput(
                "entity and measurement caps must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Caps for the bounded assistant-output histories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryLimits {
    /// Lists presented.
    pub lists: usize,
    /// Recommendations made.
    pub recommendations: usize,
    /// Examples given.
    pub examples: usize,
    /// Procedures explained.
    pub procedures: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            lists: 5,
            recommendations: 5,
            examples: 5,
            procedures: 3,
        }
    }
}

/// State extraction behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionConfig {
    /// Whether to try the LLM before the pattern fallback.
    pub use_llm: bool,
    /// Deadline for the LLM call in milliseconds.
    pub llm_timeout_ms: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            use_llm: true,
            llm_timeout_ms: 15_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_constants() {
        let salience = SalienceConfig::default();
        assert!((salience.decay_per_turn - 0.1).abs() < f32::EPSILON);
        assert!((salience.floor - 0.3).abs() < f32::EPSILON);
        assert_eq!(salience.max_entities, 10);

        let limits = HistoryLimits::default();
        assert_eq!(limits.lists, 5);
        assert_eq!(limits.procedures, 3);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = SalienceConfig {
            floor: 1.5,
            ..SalienceConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SalienceConfig {
            max_entities: 0,
            ..SalienceConfig::default()
        };
        assert!(config.validate().is_err());

        assert!(SalienceConfig::default().validate().is_ok());
    }
}
