//! Hap: a single pattern event ("happening").

use crate::fraction::Fraction;
use crate::timespan::TimeSpan;
use crate::value::LightValue;

/// An event returned by a pattern query.
///
/// `whole` is the event's full logical extent; `part` is the fragment of it
/// that falls inside the queried span. A hap whose `whole` is None is a
/// fragment of a continuous signal and has no onset.
#[derive(Debug, Clone, PartialEq)]
pub struct Hap {
    pub whole: Option<TimeSpan>,
    pub part: TimeSpan,
    pub value: LightValue,
}

impl Hap {
    pub fn new(whole: Option<TimeSpan>, part: TimeSpan, value: LightValue) -> Self {
        Hap { whole, part, value }
    }

    /// The whole if present, otherwise the part.
    pub fn whole_or_part(&self) -> TimeSpan {
        self.whole.unwrap_or(self.part)
    }

    /// True when the queried fragment includes the event's onset. Only haps
    /// with an onset register in the scheduler's active table.
    pub fn has_onset(&self) -> bool {
        match self.whole {
            Some(whole) => whole.start == self.part.start,
            None => false,
        }
    }

    /// Shift both whole and part by an offset.
    pub fn shift(&self, offset: Fraction) -> Hap {
        Hap {
            whole: self.whole.map(|w| w.shift(offset)),
            part: self.part.shift(offset),
            value: self.value.clone(),
        }
    }

    /// Apply a function to both whole and part.
    pub fn with_span<F>(&self, f: F) -> Hap
    where
        F: Fn(TimeSpan) -> TimeSpan,
    {
        Hap {
            whole: self.whole.map(&f),
            part: f(self.part),
            value: self.value.clone(),
        }
    }

    /// Replace the value, keeping the timing.
    pub fn with_value(&self, value: LightValue) -> Hap {
        Hap {
            whole: self.whole,
            part: self.part,
            value,
        }
    }

    /// Replace the part, keeping whole and value.
    pub fn with_part(&self, part: TimeSpan) -> Hap {
        Hap {
            whole: self.whole,
            part,
            value: self.value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hap(whole: (i64, i64), part: (i64, i64)) -> Hap {
        Hap::new(
            Some(TimeSpan::from_integers(whole.0, whole.1)),
            TimeSpan::from_integers(part.0, part.1),
            LightValue::for_light(0),
        )
    }

    #[test]
    fn test_has_onset() {
        assert!(hap((0, 1), (0, 1)).has_onset());
        // A fragment starting mid-whole has no onset.
        let fragment = Hap::new(
            Some(TimeSpan::from_integers(0, 2)),
            TimeSpan::from_integers(1, 2),
            LightValue::for_light(0),
        );
        assert!(!fragment.has_onset());
        // Signal fragments never have onsets.
        let signal = Hap::new(None, TimeSpan::from_integers(0, 1), LightValue::for_light(0));
        assert!(!signal.has_onset());
    }

    #[test]
    fn test_shift() {
        let h = hap((0, 1), (0, 1)).shift(Fraction::new(1, 2));
        assert_eq!(
            h.whole.unwrap(),
            TimeSpan::new(Fraction::new(1, 2), Fraction::new(3, 2))
        );
        assert_eq!(h.part, h.whole.unwrap());
    }

    #[test]
    fn test_whole_or_part() {
        let signal = Hap::new(None, TimeSpan::from_integers(3, 4), LightValue::for_light(0));
        assert_eq!(signal.whole_or_part(), TimeSpan::from_integers(3, 4));
    }
}
