//! Builder pattern for configuring an analysis.
//!
//! The builder is a fluent front end to [`AnovaConfig`]: set only what
//! differs from the defaults, then analyse a table.
//!
//! # Example
//!
//! ```
//! use mixed_anova::{AnovaBuilder, MultivariateTest, Observation, ObservationTable};
//!
//! let mut table = ObservationTable::new();
//! for subject in 1..=4 {
//!     let group = if subject <= 2 { "control" } else { "treated" };
//!     for (time, bump) in [("pre", 0.0), ("post", 2.0)] {
//!         let score = f64::from(subject) + bump;
//!         table.push(Observation::new(subject, [group, time], score)).unwrap();
//!     }
//! }
//!
//! let results = AnovaBuilder::new()
//!     .factor_names(["group", "time"])
//!     .multivariate_test(MultivariateTest::Rao)
//!     .analyze(&table)
//!     .unwrap();
//!
//! assert_eq!(results.len(), 3);
//! assert!(results.get("group×time").is_some());
//! ```

use crate::config::{AnovaConfig, DuplicatePolicy, MultivariateTest};
use crate::context::{anova, AnovaContext};
use crate::design::ObservationTable;
use crate::error::Result;
use crate::result::AnovaTable;

/// Builder for an ANOVA run.
///
/// # Example
///
/// ```
/// use mixed_anova::{AnovaBuilder, DuplicatePolicy};
///
/// let config = AnovaBuilder::new()
///     .duplicate_policy(DuplicatePolicy::Reject)
///     .cell_summaries(false)
///     .build();
///
/// assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
/// assert!(!config.cell_summaries);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AnovaBuilder {
    config: AnovaConfig,
}

impl AnovaBuilder {
    /// Create a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Label the factors, in factor column order.
    ///
    /// The count is checked against the table when analysing.
    #[must_use]
    pub fn factor_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.factor_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Set how replicate observations are handled.
    #[must_use]
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.config.duplicate_policy = policy;
        self
    }

    /// Set the test used for mixed sources.
    #[must_use]
    pub fn multivariate_test(mut self, test: MultivariateTest) -> Self {
        self.config.multivariate_test = test;
        self
    }

    /// Enable or disable parallel evaluation of independent sources.
    ///
    /// Has no effect without the `parallel` feature.
    #[must_use]
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.config.parallel = enabled;
        self
    }

    /// Enable or disable per-source cell summaries.
    #[must_use]
    pub fn cell_summaries(mut self, enabled: bool) -> Self {
        self.config.cell_summaries = enabled;
        self
    }

    /// Finish and return the configuration.
    #[must_use]
    pub fn build(self) -> AnovaConfig {
        self.config
    }

    /// Classify `table` and precompute its D-variables without running
    /// the decomposition.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is not an analysable design.
    pub fn context(self, table: &ObservationTable) -> Result<AnovaContext> {
        AnovaContext::new(table, self.config)
    }

    /// Run the analysis.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is not an analysable design.
    pub fn analyze(&self, table: &ObservationTable) -> Result<AnovaTable> {
        anova(table, &self.config)
    }
}
