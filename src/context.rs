//! The analysis context: design, shared statistics, memo and driver.

use std::collections::BTreeMap;

use ndarray::Array2;
use tracing::{debug, info};

use crate::cells::{subject_means, summarize_source, CellStatistics};
use crate::config::AnovaConfig;
use crate::contrast::{build_d_variables, DVariables};
use crate::design::{Design, ObservationTable};
use crate::effects::{
    between_source, mixed_source, within_source, EffectMemo, SourceOutcome, SumOfSquares,
};
use crate::error::Result;
use crate::result::{AnovaTable, SourceResult};
use crate::schedule::evaluate_wave;
use crate::significance::{
    between_denominator_df, multivariate, numerator_df, univariate, within_denominator_df,
    within_subjects, Significance,
};
use crate::source::{dependency_waves, enumerate, Source, SourceKind};

/// Owns everything one analysis needs.
///
/// Cell statistics of the subject means and the D-variables of every
/// within-subjects-only source are computed up front; the effect memo grows
/// as [`run`](Self::run) works through the dependency waves.
#[derive(Debug, Clone)]
pub struct AnovaContext {
    design: Design,
    config: AnovaConfig,
    subject_means: Array2<f64>,
    mean_cells: CellStatistics,
    d_variables: BTreeMap<Source, DVariables>,
    memo: EffectMemo,
}

impl AnovaContext {
    /// Classify the table and precompute shared statistics.
    ///
    /// # Errors
    ///
    /// Returns an invalid-design [`Error`](crate::Error) if the table does
    /// not describe an analysable design.
    pub fn new(table: &ObservationTable, config: AnovaConfig) -> Result<Self> {
        let design = Design::from_table(table, &config)?;

        let subject_means = subject_means(design.scores());
        let mean_cells = CellStatistics::compute(
            subject_means.view(),
            design.subject_cells(),
            &design.between_shape(),
        );

        let within = design.within_mask();
        let mut d_variables = BTreeMap::new();
        for source in enumerate(design.factor_count()) {
            if SourceKind::classify(source, within) == SourceKind::Within {
                d_variables.insert(source, build_d_variables(&design, source)?);
            }
        }

        Ok(Self {
            design,
            config,
            subject_means,
            mean_cells,
            d_variables,
            memo: EffectMemo::new(),
        })
    }

    /// The classified design.
    #[must_use]
    pub fn design(&self) -> &Design {
        &self.design
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &AnovaConfig {
        &self.config
    }

    /// Effects memoized so far.
    #[must_use]
    pub fn memo(&self) -> &EffectMemo {
        &self.memo
    }

    /// Cell statistics of the subject means.
    #[must_use]
    pub fn mean_cells(&self) -> &CellStatistics {
        &self.mean_cells
    }

    /// D-variables of a within-subjects-only source.
    #[must_use]
    pub fn d_variables(&self, source: Source) -> Option<&DVariables> {
        self.d_variables.get(&source)
    }

    fn d_variables_for(&self, source: Source) -> &DVariables {
        let key = source.intersection(self.design.within_mask());
        self.d_variables
            .get(&key)
            .unwrap_or_else(|| panic!("no D-variables for within-subjects source {key}"))
    }

    /// Compute the sums of squares and pure effect of one source.
    ///
    /// # Panics
    ///
    /// Panics if an effect this source depends on has not been memoized.
    #[must_use]
    pub fn evaluate(&self, source: Source) -> SourceOutcome {
        match SourceKind::classify(source, self.design.within_mask()) {
            SourceKind::Between => between_source(
                &self.design,
                &self.subject_means,
                &self.mean_cells,
                source,
                &self.memo,
            ),
            SourceKind::Within => within_source(&self.design, self.d_variables_for(source), source),
            SourceKind::Mixed => mixed_source(
                &self.design,
                self.d_variables_for(source),
                source,
                &self.memo,
            ),
        }
    }

    /// Degrees of freedom, F and p for an evaluated source.
    #[must_use]
    pub fn significance(&self, outcome: &SourceOutcome) -> Significance {
        let subjects = self.design.subject_count();
        let between_cells = self.design.between_cell_count();
        let factors = self.design.factors();
        let df_num = numerator_df(outcome.source.factors().map(|f| factors[f].level_count()));

        match (&outcome.sums, outcome.kind) {
            (SumOfSquares::Scalar { ss, error_ss }, _) => univariate(
                *ss,
                *error_ss,
                df_num,
                between_denominator_df(subjects, between_cells),
            ),
            (SumOfSquares::Matrix(matrices), SourceKind::Within) => within_subjects(
                matrices,
                df_num,
                within_denominator_df(subjects, between_cells, df_num),
            ),
            (SumOfSquares::Matrix(matrices), _) => multivariate(
                matrices,
                between_cells,
                subjects,
                df_num,
                self.config.multivariate_test,
            ),
        }
    }

    fn assemble(&self, outcome: &SourceOutcome) -> SourceResult {
        let sig = self.significance(outcome);
        let error_matrices = match &outcome.sums {
            SumOfSquares::Matrix(m) => Some(m.clone()),
            SumOfSquares::Scalar { .. } => None,
        };
        let cells = if self.config.cell_summaries {
            summarize_source(&self.design, outcome.source)
        } else {
            Vec::new()
        };

        SourceResult::new(
            outcome.source.label(&self.design.factor_names()),
            outcome.kind,
            sig,
            error_matrices,
            outcome.effect.clone(),
            cells,
        )
    }

    /// Evaluate every source in dependency order.
    ///
    /// # Panics
    ///
    /// Panics only on an internal ordering violation (an effect requested
    /// before it was memoized).
    #[must_use]
    pub fn run(mut self) -> AnovaTable {
        let mut results = Vec::new();
        for wave in dependency_waves(self.design.factor_count()) {
            let outcomes = evaluate_wave(&self, &wave);
            for outcome in outcomes {
                let result = self.assemble(&outcome);
                debug!(
                    source = %result.label,
                    kind = %result.kind,
                    f = result.f,
                    p = result.p,
                    "source complete"
                );
                results.push(result);
                self.memo.insert(outcome.effect);
            }
        }
        results.sort_by_key(|r| r.source);

        info!(
            sources = results.len(),
            subjects = self.design.subject_count(),
            "analysis complete"
        );
        AnovaTable::new(
            self.design.factors().to_vec(),
            self.design.subject_count(),
            results,
        )
    }
}

/// Run a full analysis of `table`.
///
/// # Errors
///
/// Returns an invalid-design [`Error`](crate::Error) if the table does not
/// describe an analysable design. Degenerate statistics are reported on the
/// results instead.
///
/// # Examples
///
/// ```
/// use mixed_anova::{anova, AnovaConfig, Observation, ObservationTable};
///
/// let mut table = ObservationTable::new();
/// for (subject, group, score) in [(1, "a", 3.0), (2, "a", 4.0), (3, "b", 6.0), (4, "b", 8.0)] {
///     table.push(Observation::new(subject, [group], score)).unwrap();
/// }
///
/// let results = anova(&table, &AnovaConfig::default()).unwrap();
/// let group = results.get("A").unwrap();
/// assert_eq!(group.df_num, 1.0);
/// assert_eq!(group.df_den, 2.0);
/// ```
pub fn anova(table: &ObservationTable, config: &AnovaConfig) -> Result<AnovaTable> {
    Ok(AnovaContext::new(table, config.clone())?.run())
}
