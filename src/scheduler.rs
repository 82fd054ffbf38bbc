//! Per-frame scheduler: queries the active pattern, shapes intensities
//! through envelopes and modulators, and composites per-light colors.
//!
//! The scheduler owns the only mutable state in the system: an active-event
//! table that persists across frames for the life of the selected pattern.
//! Rebuilding the scheduler each frame would truncate envelopes mid-flight,
//! so callers cache one instance per selected pattern and discard it only on
//! an explicit swap.

use std::collections::HashMap;

use crate::color::{Hsv, Rgb};
use crate::context::LightContext;
use crate::fraction::Fraction;
use crate::pattern::Pattern;
use crate::timespan::TimeSpan;
use crate::value::LightValue;

/// Half-width of the per-frame query window, in cycles. Wide enough that a
/// 50Hz frame clock never skips an onset, narrow enough not to double up.
fn query_margin() -> Fraction {
    Fraction::new(1, 50)
}

/// Intensities below this render as untouched rather than near-black,
/// avoiding color artifacts as envelopes tail off.
const MIN_INTENSITY: f64 = 0.01;

/// A registered event, alive from its onset until past its release tail.
#[derive(Debug, Clone)]
struct ActiveEvent {
    value: LightValue,
    whole: TimeSpan,
    expiry: Fraction,
    /// Monotonic registration order; later registrations win overlaps.
    registered: u64,
}

/// Drives one pattern, frame by frame.
#[derive(Debug)]
pub struct Scheduler {
    pattern: Pattern,
    context: LightContext,
    default_color: Hsv,
    active: HashMap<(usize, Fraction), ActiveEvent>,
    registrations: u64,
}

impl Scheduler {
    pub fn new(pattern: Pattern, context: LightContext) -> Self {
        Scheduler {
            pattern,
            context,
            default_color: Hsv::new(0.0, 0.0, 1.0),
            active: HashMap::new(),
            registrations: 0,
        }
    }

    /// Color used for events that never set one.
    pub fn set_default_color(&mut self, color: Hsv) {
        self.default_color = color;
    }

    /// Swap in a new pattern. Active-event state belongs to the old pattern
    /// and is discarded with it.
    pub fn set_pattern(&mut self, pattern: Pattern) {
        self.pattern = pattern;
        self.active.clear();
    }

    pub fn context(&self) -> &LightContext {
        &self.context
    }

    /// Number of live entries in the active-event table.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Compute colors for one frame at the given beat position.
    ///
    /// Returns a map containing only the lights touched this frame; the
    /// caller applies its own default/blackout policy to the rest.
    pub fn compute_colors(&mut self, beat_position: f64) -> HashMap<usize, Rgb> {
        let now = self.context.beats_to_cycles(beat_position);
        self.register_onsets(now);
        self.expire_elapsed(now);
        self.composite(now)
    }

    /// Query a small window around `now` and register every event onset
    /// under each light it resolves to.
    fn register_onsets(&mut self, now: Fraction) {
        let margin = query_margin();
        let window = TimeSpan::new(now - margin, now + margin);

        for hap in self.pattern.query(window, &self.context) {
            if !hap.has_onset() {
                continue;
            }
            let whole = match hap.whole {
                Some(w) => w,
                None => continue,
            };
            let expiry = match &hap.value.envelope {
                Some(env) => env.expiry(whole),
                None => whole.end,
            };
            let lights = self
                .context
                .resolve_target(hap.value.light_id, hap.value.group.as_deref());

            for light in lights {
                let key = (light, whole.start);
                match self.active.get_mut(&key) {
                    // Seen in an earlier frame's window; refresh without
                    // disturbing registration order.
                    Some(entry) => {
                        entry.value = hap.value.clone();
                        entry.whole = whole;
                        entry.expiry = expiry;
                    }
                    None => {
                        self.registrations += 1;
                        self.active.insert(
                            key,
                            ActiveEvent {
                                value: hap.value.clone(),
                                whole,
                                expiry,
                                registered: self.registrations,
                            },
                        );
                    }
                }
            }
        }
    }

    /// Drop entries whose release tail has fully elapsed, keeping the table
    /// bounded over long sessions.
    fn expire_elapsed(&mut self, now: Fraction) {
        self.active.retain(|_, entry| entry.expiry > now);
    }

    /// Evaluate every active entry at `now` and write colors, later
    /// registrations overwriting earlier ones per light.
    fn composite(&self, now: Fraction) -> HashMap<usize, Rgb> {
        let mut entries: Vec<(usize, &ActiveEvent)> = self
            .active
            .iter()
            .map(|(&(light, _), entry)| (light, entry))
            .collect();
        entries.sort_by_key(|(_, entry)| entry.registered);

        let mut colors = HashMap::new();
        for (light, entry) in entries {
            let intensity = self.event_intensity(entry, now);
            if intensity < MIN_INTENSITY {
                continue;
            }
            let base = entry.value.color.unwrap_or(self.default_color);
            let rgb = Rgb::from_hsv(base.hue, base.saturation, base.value * intensity);
            colors.insert(light, rgb);
        }
        colors
    }

    fn event_intensity(&self, entry: &ActiveEvent, now: Fraction) -> f64 {
        let envelope = match &entry.value.envelope {
            Some(env) => env.intensity_at(now, entry.whole),
            None => {
                if entry.whole.contains(now) {
                    1.0
                } else {
                    0.0
                }
            }
        };
        let modulator = match &entry.value.modulator {
            Some(m) => m.intensity_at(now.to_f64()),
            None => 1.0,
        };
        entry.value.intensity * envelope * modulator
    }
}
