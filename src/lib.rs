//! Beat-synchronized lighting patterns with exact rational time.
//!
//! Patterns are pure functions from a time span and venue context to timed
//! events, in the TidalCycles/Strudel style. A compact mini-notation compiles
//! to patterns; combinators transform them; a per-frame scheduler shapes
//! event intensities through ADSR envelopes and LFO modulators and composites
//! per-light colors for a hardware sink.
//!
//! ```
//! use flicker::{light, stack, LightContext, Scheduler};
//!
//! let pattern = stack(vec![
//!     light("left ~").unwrap().color("red").unwrap(),
//!     light("~ right").unwrap().color("blue").unwrap(),
//! ]);
//! let mut scheduler = Scheduler::new(pattern, LightContext::default_venue(6));
//! let colors = scheduler.compute_colors(0.0);
//! ```
//!
//! Time is measured in cycles (1 cycle = 1 bar) as exact rationals; the only
//! float-to-rational conversion happens once per frame on the incoming beat
//! position, so sessions never accumulate drift.

pub mod color;
pub mod context;
pub mod engine;
pub mod envelope;
pub mod fraction;
pub mod hap;
pub mod layering;
pub mod mini;
pub mod modulator;
pub mod pattern;
pub mod scheduler;
pub mod timespan;
pub mod value;

pub use color::{color_from_hex, color_from_name, interpolate_hsv, resolve_color};
pub use color::{ColorError, Hsv, Rgb};
pub use context::{ConfigError, LightContext, VenueConfig};
pub use engine::{EngineError, EngineHandle, EngineStatus, PatternEngine};
pub use envelope::Envelope;
pub use fraction::Fraction;
pub use hap::Hap;
pub use layering::{combine_zone_layers, FallbackStrategy, LayeredPattern, ZoneLayer};
pub use mini::{light, ParseError, ParseErrorKind};
pub use modulator::{Modulator, Waveform};
pub use pattern::{cat, fastcat, pure, stack, Pattern};
pub use scheduler::Scheduler;
pub use timespan::TimeSpan;
pub use value::LightValue;
