//! Factor level and subject identifier values.

use std::fmt;

/// A factor level or subject identifier.
///
/// Levels are totally ordered: integers compare numerically and sort before
/// text, text compares lexicographically. Level sets are kept sorted, so the
/// analysis never depends on the order rows arrive in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(untagged)
)]
pub enum Level {
    /// An integer-coded level.
    Int(i64),
    /// A named level.
    Text(String),
}

/// Subjects are identified the same way levels are.
pub type SubjectId = Level;

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Level {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Level {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for Level {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<&str> for Level {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Level {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Render a level tuple as `(a1, b2)`.
pub(crate) fn render_levels<'a, I>(levels: I) -> String
where
    I: IntoIterator<Item = &'a Level>,
{
    let parts: Vec<String> = levels.into_iter().map(ToString::to_string).collect();
    format!("({})", parts.join(", "))
}
