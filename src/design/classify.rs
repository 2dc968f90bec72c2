//! Design classification: level discovery and within/between detection.

use std::collections::BTreeSet;

use ndarray::{ArrayD, IxDyn};
use tracing::debug;

use crate::config::AnovaConfig;
use crate::contrast::MAX_WITHIN_LEVELS;
use crate::error::{Error, Result};
use crate::source::Source;
use crate::utils::{cell_count, flat_index, multi_indices};

use super::level::{render_levels, Level, SubjectId};
use super::table::{Observation, ObservationTable};

/// A factor of the design with its sorted level set.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Factor {
    /// Factor label.
    pub name: String,
    /// Unique levels in ascending order.
    pub levels: Vec<Level>,
    /// Whether every subject is measured at several levels of this factor.
    pub within_subjects: bool,
}

impl Factor {
    /// Number of levels.
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    fn level_index(&self, level: &Level) -> usize {
        // Levels were collected from the same rows being coded
        self.levels
            .binary_search(level)
            .unwrap_or_else(|_| unreachable!("level {level} missing from factor {}", self.name))
    }
}

/// A deduplicated observation with levels coded as indices.
#[derive(Debug, Clone, PartialEq)]
pub struct CodedObservation {
    /// Index into [`Design::subjects`].
    pub subject: usize,
    /// Level index per factor.
    pub levels: Vec<usize>,
    /// Measured (replicate-averaged) value.
    pub value: f64,
}

/// A classified, validated factorial design.
///
/// Holds each subject's between-subjects cell and a complete score array of
/// shape `[subjects, within levels...]`.
#[derive(Debug, Clone)]
pub struct Design {
    factors: Vec<Factor>,
    subjects: Vec<SubjectId>,
    between: Vec<usize>,
    within: Vec<usize>,
    subject_cells: Vec<usize>,
    scores: ArrayD<f64>,
    observations: Vec<CodedObservation>,
}

impl Design {
    /// Classify and validate an observation table.
    ///
    /// # Errors
    ///
    /// Returns an invalid-design [`Error`] when the table is empty, has no
    /// or too many factors, a within-subjects factor has more than
    /// [`MAX_WITHIN_LEVELS`] levels, a subject spans several
    /// between-subjects cells or misses a within-subjects cell, or a
    /// between-subjects cell has no subjects.
    pub fn from_table(table: &ObservationTable, config: &AnovaConfig) -> Result<Self> {
        if table.is_empty() {
            return Err(Error::EmptyTable);
        }
        let k = table.factor_count();
        if k == 0 {
            return Err(Error::NoFactors);
        }
        if k > Source::MAX_FACTORS {
            return Err(Error::TooManyFactors {
                factors: k,
                max: Source::MAX_FACTORS,
            });
        }

        let names = config.resolved_factor_names(k);
        if names.len() != k {
            return Err(Error::FactorNameCount {
                expected: k,
                actual: names.len(),
            });
        }

        let rows = table.deduplicate(config.duplicate_policy)?;

        let subjects: Vec<SubjectId> = rows
            .iter()
            .map(|r| r.subject.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut factors = Vec::with_capacity(k);
        for (f, name) in names.into_iter().enumerate() {
            let levels: Vec<Level> = rows
                .iter()
                .map(|r| r.levels[f].clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            if levels.is_empty() {
                return Err(Error::EmptyFactor { factor: name });
            }
            factors.push(Factor {
                name,
                levels,
                within_subjects: false,
            });
        }

        for f in 0..k {
            let within = is_within_subjects(&rows, &factors, f);
            factors[f].within_subjects = within;
            debug!(
                factor = %factors[f].name,
                levels = factors[f].level_count(),
                within,
                "classified factor"
            );
            if within && factors[f].level_count() > MAX_WITHIN_LEVELS {
                return Err(Error::TooManyWithinLevels {
                    factor: factors[f].name.clone(),
                    levels: factors[f].level_count(),
                    max: MAX_WITHIN_LEVELS,
                });
            }
        }

        let between: Vec<usize> = (0..k).filter(|&f| !factors[f].within_subjects).collect();
        let within: Vec<usize> = (0..k).filter(|&f| factors[f].within_subjects).collect();

        let observations: Vec<CodedObservation> = rows
            .iter()
            .map(|r| CodedObservation {
                subject: subjects
                    .binary_search(&r.subject)
                    .unwrap_or_else(|_| unreachable!("subject {} not collected", r.subject)),
                levels: r
                    .levels
                    .iter()
                    .zip(&factors)
                    .map(|(level, factor)| factor.level_index(level))
                    .collect(),
                value: r.value,
            })
            .collect();

        let mut design = Self {
            factors,
            subjects,
            between,
            within,
            subject_cells: Vec::new(),
            scores: ArrayD::zeros(IxDyn(&[0])),
            observations,
        };
        design.subject_cells = design.assign_between_cells()?;
        design.scores = design.fill_scores()?;

        debug!(
            subjects = design.subject_count(),
            between = design.between.len(),
            within = design.within.len(),
            "design validated"
        );
        Ok(design)
    }

    /// All factors in column order.
    #[must_use]
    pub fn factors(&self) -> &[Factor] {
        &self.factors
    }

    /// Factor labels in column order.
    #[must_use]
    pub fn factor_names(&self) -> Vec<String> {
        self.factors.iter().map(|f| f.name.clone()).collect()
    }

    /// Number of factors.
    #[must_use]
    pub fn factor_count(&self) -> usize {
        self.factors.len()
    }

    /// Sorted subject identifiers.
    #[must_use]
    pub fn subjects(&self) -> &[SubjectId] {
        &self.subjects
    }

    /// Number of subjects.
    #[must_use]
    pub fn subject_count(&self) -> usize {
        self.subjects.len()
    }

    /// Indices of the between-subjects factors.
    #[must_use]
    pub fn between_factors(&self) -> &[usize] {
        &self.between
    }

    /// Indices of the within-subjects factors.
    #[must_use]
    pub fn within_factors(&self) -> &[usize] {
        &self.within
    }

    /// The source containing every between-subjects factor.
    #[must_use]
    pub fn between_mask(&self) -> Source {
        Source::from_factors(self.between.iter().copied())
    }

    /// The source containing every within-subjects factor.
    #[must_use]
    pub fn within_mask(&self) -> Source {
        Source::from_factors(self.within.iter().copied())
    }

    /// The source spanning every factor.
    #[must_use]
    pub fn full_source(&self) -> Source {
        Source::from_factors(0..self.factor_count())
    }

    /// Positions within [`between_factors`](Self::between_factors) of the
    /// between-subjects factors in `source`; these index the cell-table axes.
    #[must_use]
    pub fn between_axes(&self, source: Source) -> Vec<usize> {
        axes_of(&self.between, source)
    }

    /// Positions within [`within_factors`](Self::within_factors) of the
    /// within-subjects factors in `source`.
    #[must_use]
    pub fn within_axes(&self, source: Source) -> Vec<usize> {
        axes_of(&self.within, source)
    }

    /// Level counts of the between-subjects factors.
    #[must_use]
    pub fn between_shape(&self) -> Vec<usize> {
        self.between
            .iter()
            .map(|&f| self.factors[f].level_count())
            .collect()
    }

    /// Level counts of the within-subjects factors.
    #[must_use]
    pub fn within_shape(&self) -> Vec<usize> {
        self.within
            .iter()
            .map(|&f| self.factors[f].level_count())
            .collect()
    }

    /// Number of between-subjects cells (1 without between factors).
    #[must_use]
    pub fn between_cell_count(&self) -> usize {
        cell_count(&self.between_shape())
    }

    /// Flat between-subjects cell index of every subject.
    #[must_use]
    pub fn subject_cells(&self) -> &[usize] {
        &self.subject_cells
    }

    /// Scores of shape `[subjects, within levels...]`.
    #[must_use]
    pub fn scores(&self) -> &ArrayD<f64> {
        &self.scores
    }

    /// Deduplicated, coded observations sorted by (subject, levels).
    #[must_use]
    pub fn observations(&self) -> &[CodedObservation] {
        &self.observations
    }

    fn assign_between_cells(&self) -> Result<Vec<usize>> {
        let shape = self.between_shape();
        let mut cells: Vec<Option<Vec<usize>>> = vec![None; self.subject_count()];

        for obs in &self.observations {
            let key: Vec<usize> = self.between.iter().map(|&f| obs.levels[f]).collect();
            match &cells[obs.subject] {
                None => cells[obs.subject] = Some(key),
                Some(existing) => {
                    if let Some(pos) = existing.iter().zip(&key).position(|(a, b)| a != b) {
                        return Err(Error::SubjectInMultipleGroups {
                            subject: self.subjects[obs.subject].to_string(),
                            factor: self.factors[self.between[pos]].name.clone(),
                        });
                    }
                }
            }
        }

        let subject_cells: Vec<usize> = cells
            .into_iter()
            .map(|key| flat_index(&key.unwrap_or_default(), &shape))
            .collect();

        let mut populated = vec![false; cell_count(&shape)];
        for &cell in &subject_cells {
            populated[cell] = true;
        }
        if let Some(index) = multi_indices(&shape).find(|idx| !populated[flat_index(idx, &shape)]) {
            let levels = index
                .iter()
                .zip(&self.between)
                .map(|(&i, &f)| &self.factors[f].levels[i]);
            return Err(Error::EmptyBetweenCell {
                cell: render_levels(levels),
            });
        }

        Ok(subject_cells)
    }

    fn fill_scores(&self) -> Result<ArrayD<f64>> {
        let within_shape = self.within_shape();
        let mut dims = Vec::with_capacity(within_shape.len() + 1);
        dims.push(self.subject_count());
        dims.extend_from_slice(&within_shape);

        let mut scores = ArrayD::zeros(IxDyn(&dims));
        let mut seen = vec![0usize; self.subject_count()];
        for obs in &self.observations {
            let mut index = Vec::with_capacity(dims.len());
            index.push(obs.subject);
            index.extend(self.within.iter().map(|&f| obs.levels[f]));
            scores[IxDyn(&index)] = obs.value;
            seen[obs.subject] += 1;
        }

        // Each (subject, within cell) pair holds at most one deduplicated row,
        // so a short count means missing cells
        let expected = cell_count(&within_shape);
        if let Some((subject, &count)) = seen.iter().enumerate().find(|(_, &c)| c < expected) {
            return Err(Error::IncompleteRepeatedMeasures {
                subject: self.subjects[subject].to_string(),
                missing: expected - count,
            });
        }

        Ok(scores)
    }
}

fn axes_of(factors: &[usize], source: Source) -> Vec<usize> {
    factors
        .iter()
        .enumerate()
        .filter(|(_, &f)| source.contains(f))
        .map(|(axis, _)| axis)
        .collect()
}

/// Whether factor `f` is measured repeatedly on the same subjects.
///
/// Holds every other factor at its reference (first) level and slices the
/// rows to that combination; within the slice only factor `f` and the
/// subject vary, so fewer distinct subjects than rows means some subject
/// recurs across levels of `f`.
fn is_within_subjects(rows: &[Observation], factors: &[Factor], f: usize) -> bool {
    let slice: Vec<&Observation> = rows
        .iter()
        .filter(|r| {
            r.levels
                .iter()
                .zip(factors)
                .enumerate()
                .all(|(g, (level, factor))| g == f || *level == factor.levels[0])
        })
        .collect();

    let distinct_subjects = slice
        .iter()
        .map(|r| &r.subject)
        .collect::<BTreeSet<_>>()
        .len();
    distinct_subjects < slice.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed_table() -> ObservationTable {
        // group is between-subjects, time is within-subjects
        let data = [
            (1, "g1", 3.0, 5.0),
            (2, "g1", 4.0, 8.0),
            (3, "g2", 6.0, 7.0),
            (4, "g2", 8.0, 12.0),
        ];
        let mut table = ObservationTable::new();
        for (s, g, pre, post) in data {
            table.push(Observation::new(s, [g, "pre"], pre)).unwrap();
            table.push(Observation::new(s, [g, "post"], post)).unwrap();
        }
        table
    }

    #[test]
    fn test_classifies_mixed_design() {
        let design = Design::from_table(&mixed_table(), &AnovaConfig::default()).unwrap();

        assert_eq!(design.factor_count(), 2);
        assert!(!design.factors()[0].within_subjects);
        assert!(design.factors()[1].within_subjects);
        assert_eq!(design.between_factors(), &[0]);
        assert_eq!(design.within_factors(), &[1]);
        assert_eq!(design.subject_count(), 4);
        assert_eq!(design.subject_cells(), &[0, 0, 1, 1]);

        // Levels are sorted: "post" < "pre"
        assert_eq!(design.factors()[1].levels[0], Level::from("post"));
        assert_eq!(design.scores().shape(), &[4, 2]);
        assert!((design.scores()[IxDyn(&[0, 0])] - 5.0).abs() < 1e-12);
        assert!((design.scores()[IxDyn(&[0, 1])] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_classifies_two_between_factors() {
        let mut table = ObservationTable::new();
        let mut subject = 0;
        for a in ["a1", "a2"] {
            for b in ["b1", "b2", "b3"] {
                for rep in 0..2 {
                    subject += 1;
                    table
                        .push(Observation::new(subject, [a, b], f64::from(rep)))
                        .unwrap();
                }
            }
        }
        let design = Design::from_table(&table, &AnovaConfig::default()).unwrap();
        assert_eq!(design.between_factors(), &[0, 1]);
        assert!(design.within_factors().is_empty());
        assert_eq!(design.between_cell_count(), 6);
        assert_eq!(design.scores().shape(), &[12]);
    }

    #[test]
    fn test_empty_table() {
        let err = Design::from_table(&ObservationTable::new(), &AnovaConfig::default()).unwrap_err();
        assert_eq!(err, Error::EmptyTable);
    }

    #[test]
    fn test_no_factors() {
        let table =
            ObservationTable::from_rows([Observation::new(1, Vec::<Level>::new(), 1.0)]).unwrap();
        let err = Design::from_table(&table, &AnovaConfig::default()).unwrap_err();
        assert_eq!(err, Error::NoFactors);
    }

    #[test]
    fn test_factor_name_count() {
        let config = AnovaConfig {
            factor_names: Some(vec!["only".into()]),
            ..Default::default()
        };
        let err = Design::from_table(&mixed_table(), &config).unwrap_err();
        assert_eq!(
            err,
            Error::FactorNameCount {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_incomplete_repeated_measures() {
        let mut table = mixed_table();
        table.push(Observation::new(5, ["g2", "pre"], 1.0)).unwrap();
        let err = Design::from_table(&table, &AnovaConfig::default()).unwrap_err();
        assert_eq!(
            err,
            Error::IncompleteRepeatedMeasures {
                subject: "5".into(),
                missing: 1
            }
        );
    }

    #[test]
    fn test_subject_in_multiple_groups() {
        let mut table = mixed_table();
        // Subject 4 also shows up in g1 at a new time point
        table.push(Observation::new(4, ["g1", "follow"], 1.0)).unwrap();
        let err = Design::from_table(&table, &AnovaConfig::default()).unwrap_err();
        assert!(err.is_invalid_design());
    }

    #[test]
    fn test_empty_between_cell() {
        let mut table = ObservationTable::new();
        let cells = [("a1", "b1"), ("a1", "b2"), ("a2", "b1")];
        for (s, (a, b)) in cells.iter().enumerate() {
            table
                .push(Observation::new(s as i64, [*a, *b], 1.0))
                .unwrap();
        }
        let err = Design::from_table(&table, &AnovaConfig::default()).unwrap_err();
        assert_eq!(
            err,
            Error::EmptyBetweenCell {
                cell: "(a2, b2)".into()
            }
        );
    }

    #[test]
    fn test_within_level_limit() {
        let mut table = ObservationTable::new();
        for s in 0..3 {
            for t in 0..11 {
                table
                    .push(Observation::new(s, [t], f64::from(s * t)))
                    .unwrap();
            }
        }
        let err = Design::from_table(&table, &AnovaConfig::default()).unwrap_err();
        assert_eq!(
            err,
            Error::TooManyWithinLevels {
                factor: "A".into(),
                levels: 11,
                max: 10
            }
        );
    }
}
