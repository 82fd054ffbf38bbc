//! ADSR envelope math for time-varying event intensity.
//!
//! Envelope durations are rational cycles, so phase boundaries are computed
//! exactly against an event's whole; only the ramp values themselves are
//! floating point.

use crate::fraction::Fraction;
use crate::timespan::TimeSpan;

/// ADSR-style envelope for lighting events.
///
/// Within an event's whole `[start, end)`:
/// - attack: ramp 0 -> 1 over `[start, start+attack)`
/// - decay: ramp 1 -> sustain over `[start+attack, start+attack+decay)`
/// - sustain: hold until `end - release`
/// - release: ramp sustain -> 0 over the final `release` window, reaching 0
///   exactly at `end`
///
/// All durations are in cycles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub attack: Fraction,
    pub decay: Fraction,
    pub sustain: f64,
    pub release: Fraction,
}

impl Default for Envelope {
    fn default() -> Self {
        Envelope {
            attack: Fraction::zero(),
            decay: Fraction::zero(),
            sustain: 1.0,
            release: Fraction::zero(),
        }
    }
}

impl Envelope {
    pub fn new(attack: Fraction, decay: Fraction, sustain: f64, release: Fraction) -> Self {
        Envelope {
            attack,
            decay,
            sustain,
            release,
        }
    }

    /// Intensity multiplier at absolute time `t` for an event occupying
    /// `whole`. Returns 0 outside `[whole.start, whole.end)`.
    pub fn intensity_at(&self, t: Fraction, whole: TimeSpan) -> f64 {
        if t < whole.start || t >= whole.end {
            return 0.0;
        }

        let attack_end = whole.start + self.attack;
        let decay_end = attack_end + self.decay;
        let release_start = (whole.end - self.release).max(whole.start);

        let base = if t < attack_end {
            // attack is non-zero here, otherwise attack_end == whole.start
            (t - whole.start).to_f64() / self.attack.to_f64()
        } else if t < decay_end {
            let frac = (t - attack_end).to_f64() / self.decay.to_f64();
            1.0 - frac * (1.0 - self.sustain)
        } else {
            self.sustain
        };

        let shaped = if !self.release.is_zero() && t >= release_start {
            let frac = (t - release_start).to_f64() / self.release.to_f64();
            base * (1.0 - frac)
        } else {
            base
        };

        shaped.clamp(0.0, 1.0)
    }

    /// The time after which an event shaped by this envelope can never
    /// light again. Conservative bound used for active-table expiry.
    pub fn expiry(&self, whole: TimeSpan) -> Fraction {
        whole.end + self.release
    }

    /// Merge with another envelope, preferring self's non-default fields.
    /// Lets `.envelope()` applied later in a chain fill gaps left earlier.
    pub fn merge(&self, other: &Envelope) -> Envelope {
        Envelope {
            attack: if self.attack.is_zero() {
                other.attack
            } else {
                self.attack
            },
            decay: if self.decay.is_zero() {
                other.decay
            } else {
                self.decay
            },
            sustain: if self.sustain == 1.0 {
                other.sustain
            } else {
                self.sustain
            },
            release: if self.release.is_zero() {
                other.release
            } else {
                self.release
            },
        }
    }
}
