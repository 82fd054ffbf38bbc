//! TimeSpan represents an arc of time within the pattern system.
//!
//! A TimeSpan has a start and end, both exact rationals. Patterns are
//! logically infinite, so spans may sit anywhere on the timeline including
//! negative time.

use crate::fraction::Fraction;

/// A span of time with a start and end point, in cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeSpan {
    pub start: Fraction,
    pub end: Fraction,
}

impl TimeSpan {
    /// Create a new TimeSpan.
    pub fn new(start: Fraction, end: Fraction) -> Self {
        TimeSpan { start, end }
    }

    /// Create a TimeSpan from integer cycle bounds.
    pub fn from_integers(start: i64, end: i64) -> Self {
        TimeSpan {
            start: Fraction::from_integer(start),
            end: Fraction::from_integer(end),
        }
    }

    /// Returns the duration of this timespan.
    pub fn duration(&self) -> Fraction {
        self.end - self.start
    }

    /// Check if a time point lies within this span (inclusive start,
    /// exclusive end).
    pub fn contains(&self, t: Fraction) -> bool {
        self.start <= t && t < self.end
    }

    /// Return a new span shifted by offset.
    pub fn shift(&self, offset: Fraction) -> TimeSpan {
        TimeSpan::new(self.start + offset, self.end + offset)
    }

    /// Return a new span with both endpoints multiplied by factor.
    pub fn scale(&self, factor: Fraction) -> TimeSpan {
        TimeSpan::new(self.start * factor, self.end * factor)
    }

    /// Apply a function to both endpoints.
    pub fn with_time<F>(&self, f: F) -> TimeSpan
    where
        F: Fn(Fraction) -> Fraction,
    {
        TimeSpan::new(f(self.start), f(self.end))
    }

    /// Compute the overlapping portion of two spans, or None if they do not
    /// overlap. Haps carry non-empty parts, so a zero-width touch does not
    /// count as an overlap.
    pub fn intersection(&self, other: &TimeSpan) -> Option<TimeSpan> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);

        if start < end {
            Some(TimeSpan::new(start, end))
        } else {
            None
        }
    }

    /// Split this timespan into a list of per-cycle pieces. Essential for
    /// combinators that operate cycle by cycle (cat, rev, shuffle).
    pub fn span_cycles(&self) -> Vec<TimeSpan> {
        let mut spans = Vec::new();
        let mut start = self.start;
        let end_sam = self.end.sam();

        if self.start >= self.end {
            return spans;
        }

        while start < self.end {
            if start.sam() == end_sam {
                spans.push(TimeSpan::new(start, self.end));
                break;
            }
            let next = start.next_sam();
            spans.push(TimeSpan::new(start, next));
            start = next;
        }
        spans
    }
}

impl std::fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.start, self.end)
    }
}
