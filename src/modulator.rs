//! LFO-style intensity modulation.
//!
//! A modulator is a stateless function of absolute cycle position,
//! independent of individual event timing, so every event in a bar shares
//! the same oscillation phase. Modulators can be chained; chained
//! intensities multiply.

/// Supported waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Saw,
    Square,
}

impl Waveform {
    /// Parse a waveform name.
    pub fn parse(name: &str) -> Option<Waveform> {
        match name.to_ascii_lowercase().as_str() {
            "sine" => Some(Waveform::Sine),
            "triangle" => Some(Waveform::Triangle),
            "saw" => Some(Waveform::Saw),
            "square" => Some(Waveform::Square),
            _ => None,
        }
    }

    /// Normalized wave value in 0..=1 at phase t in 0..1.
    fn value(self, t: f64) -> f64 {
        match self {
            Waveform::Sine => ((t * std::f64::consts::TAU).sin() + 1.0) / 2.0,
            Waveform::Triangle => {
                if t < 0.5 {
                    t * 2.0
                } else {
                    2.0 - t * 2.0
                }
            }
            Waveform::Saw => t,
            Waveform::Square => {
                if t < 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Oscillating intensity multiplier keyed to absolute cycle position.
#[derive(Debug, Clone, PartialEq)]
pub struct Modulator {
    pub wave: Waveform,
    /// Oscillations per cycle (1.0 = one full wave per bar).
    pub frequency: f64,
    pub min_intensity: f64,
    pub max_intensity: f64,
    /// Phase offset in cycles.
    pub phase: f64,
    /// Subtracted from the cycle position, for event-relative waves.
    pub reference_time: f64,
    /// Additional modulators whose intensities multiply with this one.
    chain: Vec<Modulator>,
}

impl Modulator {
    pub fn new(wave: Waveform, frequency: f64, min_intensity: f64, max_intensity: f64) -> Self {
        Modulator {
            wave,
            frequency,
            min_intensity,
            max_intensity,
            phase: 0.0,
            reference_time: 0.0,
            chain: Vec::new(),
        }
    }

    pub fn with_phase(mut self, phase: f64) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_reference_time(mut self, reference_time: f64) -> Self {
        self.reference_time = reference_time;
        self
    }

    /// Intensity multiplier at an absolute cycle position. Stateless and
    /// clamped into `[min_intensity, max_intensity]`.
    pub fn intensity_at(&self, cycle_position: f64) -> f64 {
        let relative = cycle_position - self.reference_time;
        let t = (relative * self.frequency + self.phase).rem_euclid(1.0);

        let wave_value = self.wave.value(t);
        let mut intensity =
            self.min_intensity + wave_value * (self.max_intensity - self.min_intensity);

        for chained in &self.chain {
            intensity *= chained.intensity_at(cycle_position);
        }

        intensity
    }

    /// Chain another modulator so both apply; intensities multiply.
    pub fn chain(mut self, other: Modulator) -> Self {
        // Flatten the other's chain so nesting stays one level deep.
        let Modulator { chain: other_chain, .. } = other.clone();
        let mut base = other;
        base.chain = Vec::new();
        self.chain.push(base);
        self.chain.extend(other_chain);
        self
    }
}
