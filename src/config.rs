//! Analysis configuration.

/// How repeated observations of one subject in one cell are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DuplicatePolicy {
    /// Average the replicates into a single score.
    #[default]
    Average,
    /// Fail with [`Error::DuplicateObservation`](crate::Error::DuplicateObservation).
    Reject,
}

/// Large-sample approximation used to test Wilks' Lambda for mixed sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MultivariateTest {
    /// Rao's F approximation; p from the F distribution.
    #[default]
    Rao,
    /// Bartlett's chi-square approximation; p from the chi-square
    /// distribution. Rao's F is still reported.
    Bartlett,
}

/// Configuration for an ANOVA run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnovaConfig {
    /// Factor labels, one per factor column (default: A, B, C, ...).
    pub factor_names: Option<Vec<String>>,
    /// Handling of replicate observations (default: average).
    pub duplicate_policy: DuplicatePolicy,
    /// Test used for sources mixing within- and between-subjects factors
    /// (default: Rao).
    pub multivariate_test: MultivariateTest,
    /// Evaluate independent sources on the rayon pool (default: true).
    /// Only effective with the `parallel` feature.
    pub parallel: bool,
    /// Compute per-source cell means, standard errors and Ns (default: true).
    pub cell_summaries: bool,
}

impl Default for AnovaConfig {
    fn default() -> Self {
        Self {
            factor_names: None,
            duplicate_policy: DuplicatePolicy::Average,
            multivariate_test: MultivariateTest::Rao,
            parallel: true,
            cell_summaries: true,
        }
    }
}

impl AnovaConfig {
    /// Resolve the label of every factor.
    ///
    /// Without configured names, factors are lettered `A`, `B`, ... and
    /// continue as `F27`, `F28`, ... past the alphabet.
    #[must_use]
    pub fn resolved_factor_names(&self, factors: usize) -> Vec<String> {
        match &self.factor_names {
            Some(names) => names.clone(),
            None => (0..factors).map(default_factor_name).collect(),
        }
    }
}

fn default_factor_name(index: usize) -> String {
    match u8::try_from(index) {
        Ok(i) if i < 26 => char::from(b'A' + i).to_string(),
        _ => format!("F{}", index + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnovaConfig::default();
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Average);
        assert_eq!(config.multivariate_test, MultivariateTest::Rao);
        assert!(config.parallel);
        assert!(config.cell_summaries);
        assert!(config.factor_names.is_none());
    }

    #[test]
    fn test_default_factor_names() {
        let names = AnovaConfig::default().resolved_factor_names(3);
        assert_eq!(names, vec!["A", "B", "C"]);

        assert_eq!(default_factor_name(25), "Z");
        assert_eq!(default_factor_name(26), "F27");
    }

    #[test]
    fn test_configured_factor_names() {
        let config = AnovaConfig {
            factor_names: Some(vec!["group".into(), "time".into()]),
            ..Default::default()
        };
        assert_eq!(config.resolved_factor_names(2), vec!["group", "time"]);
    }
}
