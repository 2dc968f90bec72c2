//! Error types for the mixed-anova library.
//!
//! Every variant describes a malformed design: the input table cannot be
//! analysed as a factorial between-/within-subjects experiment. Numeric
//! degeneracy (zero error variance, singular determinants) is deliberately
//! absent here; it is reported on each [`SourceResult`](crate::SourceResult)
//! as a [`Degeneracy`](crate::Degeneracy) instead.

use thiserror::Error;

/// The main error type for the mixed-anova library.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ============ Table Shape Errors ============
    /// The observation table holds no rows.
    #[error("observation table is empty")]
    EmptyTable,

    /// The rows carry no factor columns besides subject and value.
    #[error("design has no factors (at least 1 is required)")]
    NoFactors,

    /// More factors than the source bitmask can encode.
    #[error("design has {factors} factors, at most {max} are supported")]
    TooManyFactors {
        /// Number of factors in the table.
        factors: usize,
        /// Maximum supported factor count.
        max: usize,
    },

    /// A row has a different number of factor levels than the first row.
    #[error("row {row} has {actual} factor levels, expected {expected}")]
    RowWidthMismatch {
        /// Zero-based row index.
        row: usize,
        /// Factor count established by the first row.
        expected: usize,
        /// Factor count of this row.
        actual: usize,
    },

    /// A measured value is NaN or infinite.
    #[error("row {row} has a non-finite measured value")]
    NonFiniteValue {
        /// Zero-based row index.
        row: usize,
    },

    /// The configured factor names do not match the table's factor count.
    #[error("{actual} factor names given for a design with {expected} factors")]
    FactorNameCount {
        /// Factor count of the table.
        expected: usize,
        /// Number of names supplied.
        actual: usize,
    },

    // ============ Design Errors ============
    /// A factor has no levels.
    #[error("factor {factor} has zero levels")]
    EmptyFactor {
        /// Factor name.
        factor: String,
    },

    /// A within-subjects factor exceeds the contrast table.
    #[error("within-subjects factor {factor} has {levels} levels, at most {max} are supported")]
    TooManyWithinLevels {
        /// Factor name.
        factor: String,
        /// Observed level count.
        levels: usize,
        /// Largest level count the contrast table covers.
        max: usize,
    },

    /// The same subject was observed twice in the same cell.
    #[error("row {row} repeats an observation of subject {subject} in the same cell")]
    DuplicateObservation {
        /// Zero-based row index of the repeat.
        row: usize,
        /// Subject identifier.
        subject: String,
    },

    /// A subject appears at more than one level of a between-subjects factor.
    #[error("subject {subject} appears at several levels of between-subjects factor {factor}")]
    SubjectInMultipleGroups {
        /// Subject identifier.
        subject: String,
        /// Factor name.
        factor: String,
    },

    /// A subject lacks observations for some within-subjects cells.
    #[error("subject {subject} is missing {missing} within-subjects cell(s)")]
    IncompleteRepeatedMeasures {
        /// Subject identifier.
        subject: String,
        /// Number of within-subjects cells without an observation.
        missing: usize,
    },

    /// A combination of between-subjects levels has no subjects.
    #[error("between-subjects cell {cell} has no subjects")]
    EmptyBetweenCell {
        /// The cell's level combination, rendered.
        cell: String,
    },
}

/// A specialized `Result` type for mixed-anova operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Whether the error describes malformed design input.
    ///
    /// This holds for every variant; the method exists so callers can
    /// match the documented error class without enumerating variants.
    #[must_use]
    pub fn is_invalid_design(&self) -> bool {
        matches!(
            self,
            Self::EmptyTable
                | Self::NoFactors
                | Self::TooManyFactors { .. }
                | Self::RowWidthMismatch { .. }
                | Self::NonFiniteValue { .. }
                | Self::FactorNameCount { .. }
                | Self::EmptyFactor { .. }
                | Self::TooManyWithinLevels { .. }
                | Self::DuplicateObservation { .. }
                | Self::SubjectInMultipleGroups { .. }
                | Self::IncompleteRepeatedMeasures { .. }
                | Self::EmptyBetweenCell { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::TooManyWithinLevels {
            factor: "time".into(),
            levels: 11,
            max: 10,
        };
        assert!(err.to_string().contains("time"));
        assert!(err.to_string().contains("11"));
        assert!(err.to_string().contains("10"));

        let err = Error::RowWidthMismatch {
            row: 4,
            expected: 2,
            actual: 3,
        };
        assert!(err.to_string().contains("row 4"));

        let err = Error::IncompleteRepeatedMeasures {
            subject: "s7".into(),
            missing: 2,
        };
        assert!(err.to_string().contains("s7"));
    }

    #[test]
    fn test_error_equality() {
        let err1 = Error::EmptyFactor { factor: "A".into() };
        let err2 = Error::EmptyFactor { factor: "A".into() };
        let err3 = Error::EmptyFactor { factor: "B".into() };

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }

    #[test]
    fn test_all_variants_are_design_errors() {
        assert!(Error::EmptyTable.is_invalid_design());
        assert!(Error::NoFactors.is_invalid_design());
        assert!(Error::EmptyBetweenCell { cell: "(a1)".into() }.is_invalid_design());
    }
}
