//! Acceptable status code ranges.

/// An inclusive range of HTTP status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCodeRange {
    /// Lowest accepted code.
    pub from: i64,
    /// Highest accepted code.
    pub to: i64,
}

impl StatusCodeRange {
    /// Creates a range covering `from..=to`.
    #[must_use]
    pub const fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    /// Creates a range covering exactly `code`.
    #[must_use]
    pub const fn single(code: i64) -> Self {
        Self::new(code, code)
    }

    /// Returns true if `code` lies inside the range.
    #[must_use]
    pub const fn contains(&self, code: i64) -> bool {
        code >= self.from && code <= self.to
    }
}

/// An ordered set of acceptable status code ranges.
///
/// An empty policy accepts every status code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptancePolicy {
    ranges: Vec<StatusCodeRange>,
}

impl AcceptancePolicy {
    /// Creates a policy that accepts everything.
    #[must_use]
    pub const fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Appends a range.
    pub fn push(&mut self, range: StatusCodeRange) {
        self.ranges.push(range);
    }

    /// Appends a range unless an identical one is already present.
    pub fn insert(&mut self, range: StatusCodeRange) {
        if !self.ranges.contains(&range) {
            self.ranges.push(range);
        }
    }

    /// Returns true if `code` is acceptable.
    #[must_use]
    pub fn accepts(&self, code: i64) -> bool {
        self.ranges.is_empty() || self.ranges.iter().any(|r| r.contains(code))
    }

    /// Returns true if no range has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Returns the ranges in insertion order.
    #[must_use]
    pub fn ranges(&self) -> &[StatusCodeRange] {
        &self.ranges
    }
}

impl FromIterator<StatusCodeRange> for AcceptancePolicy {
    fn from_iter<I: IntoIterator<Item = StatusCodeRange>>(iter: I) -> Self {
        Self {
            ranges: iter.into_iter().collect(),
        }
    }
}
