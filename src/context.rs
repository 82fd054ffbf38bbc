//! Venue context: the binding of group/zone names to physical light indices.
//!
//! The context is built once from venue configuration and passed by
//! reference into every pattern query. Name resolution is total: unknown
//! group or zone names resolve to an empty light set so patterns stay
//! portable across venues.

use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

use crate::fraction::Fraction;

/// Default beats per cycle (4/4 time, 1 cycle = 1 bar).
pub const DEFAULT_CYCLE_BEATS: f64 = 4.0;

/// Invalid venue configuration, surfaced once at engine-configuration time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("group {group:?} references light {index} but venue has {num_lights} lights")]
    GroupIndexOutOfRange {
        group: String,
        index: usize,
        num_lights: usize,
    },
    #[error("zone {zone:?} references light {index} but venue has {num_lights} lights")]
    ZoneIndexOutOfRange {
        zone: String,
        index: usize,
        num_lights: usize,
    },
    #[error("physical group {0:?} is not a configured group")]
    UnknownPhysicalGroup(String),
    #[error("primary zone {0:?} is not a configured zone")]
    UnknownPrimaryZone(String),
    #[error("cycle_beats must be positive, got {0}")]
    InvalidCycleBeats(f64),
}

/// Venue configuration as loaded from disk by an external config loader.
#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    pub num_lights: usize,
    #[serde(default)]
    pub groups: HashMap<String, Vec<usize>>,
    #[serde(default)]
    pub zones: HashMap<String, Vec<usize>>,
    /// Ordered list of group names that `seq()` treats as concurrent
    /// physical sub-sequences.
    #[serde(default)]
    pub physical_groups: Vec<String>,
    /// Zone substituted by the USE_PRIMARY layering fallback.
    #[serde(default)]
    pub primary_zone: Option<String>,
    #[serde(default = "default_cycle_beats")]
    pub cycle_beats: f64,
}

fn default_cycle_beats() -> f64 {
    DEFAULT_CYCLE_BEATS
}

/// Runtime context for pattern evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct LightContext {
    pub num_lights: usize,
    pub groups: HashMap<String, Vec<usize>>,
    pub zones: HashMap<String, Vec<usize>>,
    pub physical_groups: Vec<String>,
    pub primary_zone: Option<String>,
    pub cycle_beats: f64,
}

impl LightContext {
    /// Create a context, guaranteeing the "all" group exists.
    pub fn new(num_lights: usize, groups: HashMap<String, Vec<usize>>) -> Self {
        let mut groups = groups;
        groups
            .entry("all".to_string())
            .or_insert_with(|| (0..num_lights).collect());
        LightContext {
            num_lights,
            groups,
            zones: HashMap::new(),
            physical_groups: Vec::new(),
            primary_zone: None,
            cycle_beats: DEFAULT_CYCLE_BEATS,
        }
    }

    /// Default venue layout: all/left/right/odd/even over `num_lights`.
    pub fn default_venue(num_lights: usize) -> Self {
        let half = num_lights / 2;
        let groups = HashMap::from([
            ("all".to_string(), (0..num_lights).collect()),
            ("left".to_string(), (0..half).collect()),
            ("right".to_string(), (half..num_lights).collect()),
            ("odd".to_string(), (1..num_lights).step_by(2).collect()),
            ("even".to_string(), (0..num_lights).step_by(2).collect()),
        ]);
        LightContext::new(num_lights, groups)
    }

    /// Build and validate a context from venue configuration. All
    /// configuration mistakes surface here, never on the render path.
    pub fn from_config(config: &VenueConfig) -> Result<Self, ConfigError> {
        if !(config.cycle_beats > 0.0) {
            return Err(ConfigError::InvalidCycleBeats(config.cycle_beats));
        }

        for (name, indices) in &config.groups {
            if let Some(&bad) = indices.iter().find(|&&i| i >= config.num_lights) {
                return Err(ConfigError::GroupIndexOutOfRange {
                    group: name.clone(),
                    index: bad,
                    num_lights: config.num_lights,
                });
            }
        }
        for (name, indices) in &config.zones {
            if let Some(&bad) = indices.iter().find(|&&i| i >= config.num_lights) {
                return Err(ConfigError::ZoneIndexOutOfRange {
                    zone: name.clone(),
                    index: bad,
                    num_lights: config.num_lights,
                });
            }
        }
        for name in &config.physical_groups {
            if !config.groups.contains_key(name) {
                return Err(ConfigError::UnknownPhysicalGroup(name.clone()));
            }
        }
        if let Some(primary) = &config.primary_zone {
            if !config.zones.contains_key(primary) {
                return Err(ConfigError::UnknownPrimaryZone(primary.clone()));
            }
        }

        let mut ctx = LightContext::new(config.num_lights, config.groups.clone());
        ctx.zones = config.zones.clone();
        // Zones double as groups so notation like "ceiling" resolves.
        for (name, indices) in &config.zones {
            ctx.groups
                .entry(name.clone())
                .or_insert_with(|| indices.clone());
        }
        ctx.physical_groups = config.physical_groups.clone();
        ctx.primary_zone = config.primary_zone.clone();
        ctx.cycle_beats = config.cycle_beats;
        Ok(ctx)
    }

    /// Resolve a group (or zone) name to light indices. Unknown names
    /// resolve to the empty set.
    pub fn resolve_group(&self, name: &str) -> Vec<usize> {
        self.groups
            .get(name)
            .or_else(|| self.zones.get(name))
            .cloned()
            .unwrap_or_default()
    }

    /// Resolve a zone name to light indices. Unknown names resolve to the
    /// empty set.
    pub fn resolve_zone(&self, name: &str) -> Vec<usize> {
        self.zones.get(name).cloned().unwrap_or_default()
    }

    pub fn has_zone(&self, name: &str) -> bool {
        self.zones.contains_key(name)
    }

    pub fn available_zones(&self) -> Vec<String> {
        self.zones.keys().cloned().collect()
    }

    /// The light set a hap resolves to: its explicit light if targeted,
    /// otherwise its group.
    pub fn resolve_target(&self, light_id: Option<usize>, group: Option<&str>) -> Vec<usize> {
        match (light_id, group) {
            (Some(id), _) if id < self.num_lights => vec![id],
            (Some(_), _) => Vec::new(),
            (None, Some(name)) => self
                .resolve_group(name)
                .into_iter()
                .filter(|&i| i < self.num_lights)
                .collect(),
            (None, None) => Vec::new(),
        }
    }

    /// A copy of this context restricted to a subset of lights: "all" (and
    /// every other group/zone) is intersected with the subset. Used by the
    /// zone-layering combinator so a layer pattern only ever sees its
    /// zone's lights.
    pub fn restricted_to(&self, subset: &[usize]) -> LightContext {
        let allowed: std::collections::HashSet<usize> = subset.iter().copied().collect();
        let restrict = |indices: &Vec<usize>| -> Vec<usize> {
            indices
                .iter()
                .copied()
                .filter(|i| allowed.contains(i))
                .collect()
        };

        let mut groups: HashMap<String, Vec<usize>> = self
            .groups
            .iter()
            .map(|(k, v)| (k.clone(), restrict(v)))
            .collect();
        groups.insert("all".to_string(), subset.to_vec());
        let zones = self
            .zones
            .iter()
            .map(|(k, v)| (k.clone(), restrict(v)))
            .collect();

        LightContext {
            num_lights: self.num_lights,
            groups,
            zones,
            physical_groups: self.physical_groups.clone(),
            primary_zone: self.primary_zone.clone(),
            cycle_beats: self.cycle_beats,
        }
    }

    /// Convert an external beat position into exact cycle time. The single
    /// beats->cycles conversion point; everything past here is cycles.
    pub fn beats_to_cycles(&self, beat_position: f64) -> Fraction {
        Fraction::from(beat_position) / Fraction::from(self.cycle_beats)
    }

    /// Convert cycle time back to beats, for callers reporting status.
    pub fn cycles_to_beats(&self, cycles: Fraction) -> f64 {
        cycles.to_f64() * self.cycle_beats
    }
}
