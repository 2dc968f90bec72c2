//! # Mixed ANOVA
//!
//! Generalized factorial analysis of variance for designs that mix
//! between-subjects and within-subjects (repeated measures) factors.
//!
//! ## Overview
//!
//! Given a long-format table (subject, one level per factor, value) the
//! library works out which factors vary within subjects, enumerates every
//! main effect and interaction, and tests each one:
//!
//! - **Between sources** use classical F tests on subject means
//! - **Within sources** are tested on orthogonal-contrast D-variables
//! - **Mixed sources** are tested with Wilks' Lambda and Rao's F
//!   (or Bartlett's chi-square)
//!
//! Unequal group sizes are handled by harmonic-mean weighting. Numerically
//! degenerate sources are flagged rather than failing the run.
//!
//! ## Quick Start
//!
//! ```rust
//! use mixed_anova::{anova, AnovaConfig, Observation, ObservationTable};
//!
//! // Two groups of two subjects, each measured twice
//! let rows = [
//!     (1, "ctl", "pre", 4.0), (1, "ctl", "post", 5.0),
//!     (2, "ctl", "pre", 6.0), (2, "ctl", "post", 6.5),
//!     (3, "trt", "pre", 5.0), (3, "trt", "post", 9.0),
//!     (4, "trt", "pre", 4.5), (4, "trt", "post", 8.0),
//! ];
//! let table = ObservationTable::from_rows(
//!     rows.iter().map(|&(s, g, t, v)| Observation::new(s, [g, t], v)),
//! )
//! .unwrap();
//!
//! let results = anova(&table, &AnovaConfig::default()).unwrap();
//! for r in &results {
//!     println!("{:<6} F({}, {}) = {:.3}, p = {:.4}", r.label, r.df_num, r.df_den, r.f, r.p);
//! }
//! assert_eq!(results.len(), 3);
//! ```
//!
//! Or configure the run with the builder:
//!
//! ```rust
//! use mixed_anova::{AnovaBuilder, MultivariateTest};
//!
//! let config = AnovaBuilder::new()
//!     .factor_names(["group", "time"])
//!     .multivariate_test(MultivariateTest::Bartlett)
//!     .build();
//! assert_eq!(config.multivariate_test, MultivariateTest::Bartlett);
//! ```
//!
//! ## Notation
//!
//! A source is a set of factors, encoded as a bitmask in [`Source`]:
//! bit 0 stands for the subject factor and factor `i` occupies bit `i + 1`.
//!
//! ## Features
//!
//! - `serde`: Enable serialization/deserialization of tables and results
//! - `parallel`: Evaluate independent sources concurrently using rayon
//! - `python`: Enable Python bindings via PyO3

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod builder;
pub mod cells;
pub mod config;
pub mod context;
pub mod contrast;
pub mod design;
pub mod effects;
pub mod error;
pub mod linalg;
#[cfg(feature = "python")]
pub mod python;
pub mod result;
pub mod schedule;
pub mod significance;
pub mod source;
pub mod stats;
pub mod utils;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::builder::AnovaBuilder;
    pub use crate::cells::{CellStatistics, CellSummary};
    pub use crate::config::{AnovaConfig, DuplicatePolicy, MultivariateTest};
    pub use crate::context::{anova, AnovaContext};
    pub use crate::contrast::{build_d_variables, DVariables};
    pub use crate::design::{Design, Factor, Level, Observation, ObservationTable, SubjectId};
    pub use crate::effects::{EffectMatrix, EffectMemo};
    pub use crate::error::{Error, Result};
    pub use crate::result::{AnovaTable, SourceResult};
    pub use crate::significance::{Degeneracy, ErrorMatrices, Significance};
    pub use crate::source::{enumerate, Source, SourceKind};
}

// Re-export commonly used items at crate root
pub use builder::AnovaBuilder;
pub use cells::CellSummary;
pub use config::{AnovaConfig, DuplicatePolicy, MultivariateTest};
pub use context::{anova, AnovaContext};
pub use design::{Level, Observation, ObservationTable, SubjectId};
pub use error::{Error, Result};
pub use result::{AnovaTable, SourceResult};
pub use significance::Degeneracy;
pub use source::{Source, SourceKind};
