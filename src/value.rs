//! LightValue: the payload of a pattern event.

use crate::color::Hsv;
use crate::envelope::Envelope;
use crate::modulator::Modulator;

/// The properties of a light event.
///
/// A value targets either a specific light (`light_id`) or a named group or
/// zone (`group`), resolved against the [`LightContext`](crate::LightContext)
/// at render time. Color, envelope and modulator are all optional; intensity
/// defaults to full.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LightValue {
    /// Explicit light index, if the event targets one light.
    pub light_id: Option<usize>,
    /// Group or zone name, resolved at render time. Unknown names resolve
    /// to an empty light set, never an error.
    pub group: Option<String>,
    /// Target color. None falls back to the scheduler's default.
    pub color: Option<Hsv>,
    /// Base intensity multiplier in 0..=1.
    pub intensity: f64,
    /// Optional ADSR envelope shaping intensity over the event's whole.
    pub envelope: Option<Envelope>,
    /// Optional LFO modulator keyed to absolute cycle position.
    pub modulator: Option<Modulator>,
}

impl LightValue {
    /// A value targeting a specific light.
    pub fn for_light(light_id: usize) -> Self {
        LightValue {
            light_id: Some(light_id),
            intensity: 1.0,
            ..Default::default()
        }
    }

    /// A value targeting a named group or zone.
    pub fn for_group(group: impl Into<String>) -> Self {
        LightValue {
            group: Some(group.into()),
            intensity: 1.0,
            ..Default::default()
        }
    }

    /// Retarget at a single light, dropping any group reference but keeping
    /// color/intensity/envelope/modulator. Used by combinators that expand
    /// group events into per-light events.
    pub fn retarget(&self, light_id: usize) -> Self {
        LightValue {
            light_id: Some(light_id),
            group: None,
            color: self.color,
            intensity: self.intensity,
            envelope: self.envelope.clone(),
            modulator: self.modulator.clone(),
        }
    }

    pub fn with_color(mut self, color: Hsv) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = intensity;
        self
    }

    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        self.envelope = Some(envelope);
        self
    }

    pub fn with_modulator(mut self, modulator: Modulator) -> Self {
        self.modulator = Some(modulator);
        self
    }
}
