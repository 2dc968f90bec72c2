//! Sources: main effects and interactions as factor bitmasks.
//!
//! Bit 0 is the subject dimension and is set on every valid source; factor
//! `i` occupies bit `i + 1`. With `k` factors the valid sources are the odd
//! masks `3..2^(k+1)`. A source depends on every proper subset that still
//! carries the subject bit and at least one factor.

use std::fmt;

/// A main effect or interaction, encoded as a bitmask over factors.
///
/// # Examples
///
/// ```
/// use mixed_anova::Source;
///
/// let a = Source::from_factors([0]);
/// let ab = Source::from_factors([0, 1]);
/// assert_eq!(a.bits(), 0b011);
/// assert_eq!(ab.bits(), 0b111);
/// assert!(a.is_proper_subset_of(ab));
/// assert_eq!(ab.factor_count(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Source(u32);

impl Source {
    /// The subject bit, present in every valid source.
    pub const SUBJECT_BIT: u32 = 1;

    /// Largest supported factor count (bit 0 is reserved for subjects).
    pub const MAX_FACTORS: usize = 16;

    /// Wrap a raw mask, setting the subject bit.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits | Self::SUBJECT_BIT)
    }

    /// The source spanning the given factor indices.
    ///
    /// # Panics
    ///
    /// Panics if an index is not below [`MAX_FACTORS`](Self::MAX_FACTORS).
    #[must_use]
    pub fn from_factors<I>(factors: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let bits = factors.into_iter().fold(Self::SUBJECT_BIT, |bits, f| {
            assert!(f < Self::MAX_FACTORS, "factor index {f} out of range");
            bits | (1 << (f + 1))
        });
        Self(bits)
    }

    /// The raw mask, subject bit included.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether factor `factor` is part of this source.
    #[must_use]
    pub const fn contains(self, factor: usize) -> bool {
        factor < Self::MAX_FACTORS && self.0 & (1 << (factor + 1)) != 0
    }

    /// Factors in either source.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Factors in both sources (the subject bit is always kept).
    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self((self.0 & other.0) | Self::SUBJECT_BIT)
    }

    /// Factors of `self` not in `other`.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self((self.0 & !other.0) | Self::SUBJECT_BIT)
    }

    /// Number of set bits, subject bit included.
    #[must_use]
    pub const fn bit_count(self) -> u32 {
        self.0.count_ones()
    }

    /// Number of factors in the source.
    #[must_use]
    pub const fn factor_count(self) -> usize {
        (self.0 & !Self::SUBJECT_BIT).count_ones() as usize
    }

    /// Whether the source names no factor.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 & !Self::SUBJECT_BIT == 0
    }

    /// Whether every factor of `self` is in `other`.
    #[must_use]
    pub const fn is_subset_of(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    /// Subset test excluding equality.
    #[must_use]
    pub const fn is_proper_subset_of(self, other: Self) -> bool {
        self.is_subset_of(other) && self.0 != other.0
    }

    /// Factor indices in ascending order.
    pub fn factors(self) -> impl Iterator<Item = usize> {
        let bits = self.0 >> 1;
        (0..Self::MAX_FACTORS).filter(move |f| bits & (1 << f) != 0)
    }

    /// Non-empty proper subsets in ascending numeric order.
    ///
    /// These are exactly the sources whose pure effects must be known before
    /// this source's effect can be computed.
    pub fn proper_subsets(self) -> impl Iterator<Item = Self> {
        let factor_bits = self.0 & !Self::SUBJECT_BIT;
        // Walk the submasks of factor_bits downward, then reverse
        let mut subsets = Vec::new();
        let mut sub = factor_bits;
        while sub != 0 {
            sub = (sub - 1) & factor_bits;
            if sub != 0 {
                subsets.push(Self(sub | Self::SUBJECT_BIT));
            }
        }
        subsets.into_iter().rev()
    }

    /// Human-readable label: factor names joined with `×`.
    ///
    /// ```
    /// use mixed_anova::Source;
    ///
    /// let names = ["group".to_string(), "time".to_string()];
    /// assert_eq!(Source::from_factors([0, 1]).label(&names), "group×time");
    /// ```
    #[must_use]
    pub fn label(self, names: &[String]) -> String {
        self.factors()
            .map(|f| names.get(f).map_or_else(|| format!("F{}", f + 1), Clone::clone))
            .collect::<Vec<_>>()
            .join("×")
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#b}", self.0)
    }
}

/// How a source's factors split between the two factor kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SourceKind {
    /// Only between-subjects factors.
    Between,
    /// Only within-subjects factors.
    Within,
    /// At least one factor of each kind.
    Mixed,
}

impl SourceKind {
    /// Classify `source` given the mask of within-subjects factors.
    #[must_use]
    pub fn classify(source: Source, within: Source) -> Self {
        let has_within = !source.intersection(within).is_empty();
        let has_between = !source.difference(within).is_empty();
        match (has_between, has_within) {
            (_, false) => Self::Between,
            (false, true) => Self::Within,
            (true, true) => Self::Mixed,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Between => f.write_str("between"),
            Self::Within => f.write_str("within"),
            Self::Mixed => f.write_str("mixed"),
        }
    }
}

/// Every source of a `factors`-factor design in ascending numeric order.
///
/// # Panics
///
/// Panics if `factors` exceeds [`Source::MAX_FACTORS`].
///
/// # Examples
///
/// ```
/// use mixed_anova::source::enumerate;
///
/// let bits: Vec<u32> = enumerate(2).map(|s| s.bits()).collect();
/// assert_eq!(bits, vec![3, 5, 7]);
/// ```
pub fn enumerate(factors: usize) -> impl Iterator<Item = Source> {
    assert!(
        factors <= Source::MAX_FACTORS,
        "at most {} factors are supported",
        Source::MAX_FACTORS
    );
    let end: u32 = 1 << (factors + 1);
    (3..end).step_by(2).map(Source)
}

/// Sources grouped into waves by factor count.
///
/// Every proper subset of a source has fewer factors, so each wave depends
/// only on earlier waves and its members are mutually independent.
#[must_use]
pub fn dependency_waves(factors: usize) -> Vec<Vec<Source>> {
    let mut waves: Vec<Vec<Source>> = vec![Vec::new(); factors];
    for source in enumerate(factors) {
        waves[source.factor_count() - 1].push(source);
    }
    waves
}
