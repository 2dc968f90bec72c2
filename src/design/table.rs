//! Long-format observation table.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::config::DuplicatePolicy;
use crate::error::{Error, Result};

use super::level::{Level, SubjectId};

/// One measured value: a subject observed under one level of every factor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Observation {
    /// Subject identifier (the random factor).
    pub subject: SubjectId,
    /// One level per factor, in factor order.
    pub levels: Vec<Level>,
    /// Measured value.
    pub value: f64,
}

impl Observation {
    /// Create an observation.
    ///
    /// ```
    /// use mixed_anova::Observation;
    ///
    /// let obs = Observation::new(1, ["drugY", "short"], 14.7);
    /// assert_eq!(obs.levels.len(), 2);
    /// ```
    pub fn new<S, I, L>(subject: S, levels: I, value: f64) -> Self
    where
        S: Into<SubjectId>,
        I: IntoIterator<Item = L>,
        L: Into<Level>,
    {
        Self {
            subject: subject.into(),
            levels: levels.into_iter().map(Into::into).collect(),
            value,
        }
    }
}

/// An in-memory observation table, one row per observation.
///
/// Rows are shape-checked on insertion: every row must carry the same
/// number of factor levels and a finite value.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObservationTable {
    factors: Option<usize>,
    rows: Vec<Observation>,
}

impl ObservationTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from rows.
    ///
    /// # Errors
    ///
    /// Returns the first shape error, as [`push`](Self::push) would.
    pub fn from_rows<I>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = Observation>,
    {
        let mut table = Self::new();
        for row in rows {
            table.push(row)?;
        }
        Ok(table)
    }

    /// Append a row.
    ///
    /// # Errors
    ///
    /// * [`Error::RowWidthMismatch`] if the row's level count differs from
    ///   the first row's
    /// * [`Error::NonFiniteValue`] if the value is NaN or infinite
    pub fn push(&mut self, row: Observation) -> Result<()> {
        let index = self.rows.len();
        let expected = *self.factors.get_or_insert(row.levels.len());
        if row.levels.len() != expected {
            return Err(Error::RowWidthMismatch {
                row: index,
                expected,
                actual: row.levels.len(),
            });
        }
        if !row.value.is_finite() {
            return Err(Error::NonFiniteValue { row: index });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of factor columns (0 for an empty table).
    #[must_use]
    pub fn factor_count(&self) -> usize {
        self.factors.unwrap_or(0)
    }

    /// The rows in insertion order.
    #[must_use]
    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    /// Collapse rows to one per (subject, level tuple), sorted by that key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateObservation`] under [`DuplicatePolicy::Reject`]
    /// when a key repeats.
    pub(crate) fn deduplicate(&self, policy: DuplicatePolicy) -> Result<Vec<Observation>> {
        let mut cells: BTreeMap<(&SubjectId, &[Level]), (f64, usize)> = BTreeMap::new();

        for (index, row) in self.rows.iter().enumerate() {
            match cells.entry((&row.subject, row.levels.as_slice())) {
                Entry::Vacant(slot) => {
                    slot.insert((row.value, 1));
                }
                Entry::Occupied(mut slot) => {
                    if policy == DuplicatePolicy::Reject {
                        return Err(Error::DuplicateObservation {
                            row: index,
                            subject: row.subject.to_string(),
                        });
                    }
                    let (sum, count) = slot.get_mut();
                    *sum += row.value;
                    *count += 1;
                }
            }
        }

        Ok(cells
            .into_iter()
            .map(|((subject, levels), (sum, count))| Observation {
                subject: subject.clone(),
                levels: levels.to_vec(),
                value: sum / count as f64,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_checks_width() {
        let mut table = ObservationTable::new();
        table.push(Observation::new(1, ["a", "x"], 1.0)).unwrap();
        let err = table.push(Observation::new(2, ["a"], 2.0)).unwrap_err();
        assert_eq!(
            err,
            Error::RowWidthMismatch {
                row: 1,
                expected: 2,
                actual: 1
            }
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.factor_count(), 2);
    }

    #[test]
    fn test_push_rejects_non_finite() {
        let mut table = ObservationTable::new();
        let err = table
            .push(Observation::new(1, ["a"], f64::NAN))
            .unwrap_err();
        assert_eq!(err, Error::NonFiniteValue { row: 0 });
    }

    #[test]
    fn test_deduplicate_averages() {
        let table = ObservationTable::from_rows([
            Observation::new(2, ["a"], 4.0),
            Observation::new(1, ["a"], 1.0),
            Observation::new(1, ["a"], 3.0),
        ])
        .unwrap();

        let rows = table.deduplicate(DuplicatePolicy::Average).unwrap();
        assert_eq!(rows.len(), 2);
        // Sorted by subject
        assert_eq!(rows[0].subject, Level::Int(1));
        assert!((rows[0].value - 2.0).abs() < 1e-12);
        assert!((rows[1].value - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_deduplicate_rejects() {
        let table = ObservationTable::from_rows([
            Observation::new(1, ["a"], 1.0),
            Observation::new(1, ["b"], 2.0),
            Observation::new(1, ["a"], 3.0),
        ])
        .unwrap();

        let err = table.deduplicate(DuplicatePolicy::Reject).unwrap_err();
        assert_eq!(
            err,
            Error::DuplicateObservation {
                row: 2,
                subject: "1".into()
            }
        );
    }
}
