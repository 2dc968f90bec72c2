//! Observation input and design classification.
//!
//! An [`ObservationTable`] holds long-format rows (subject, one level per
//! factor, value). [`Design::from_table`] collapses replicates, decides for
//! each factor whether it varies within subjects, and validates that the
//! design is complete enough to analyse.

mod classify;
mod level;
mod table;

pub use classify::{CodedObservation, Design, Factor};
pub use level::{Level, SubjectId};
pub use table::{Observation, ObservationTable};
