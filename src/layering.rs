//! Spatial layering: compose independent zone-scoped patterns into one.
//!
//! A layered pattern declares which zones it needs (`requires`) and which it
//! merely benefits from (`enhanced_by`). At combine time the declared zones
//! are checked against the venue; missing hard requirements trigger one of
//! the fallback strategies. Layer output is always concretized to per-light
//! events, so the result behaves identically under any downstream context.

use std::collections::HashSet;

use crate::context::LightContext;
use crate::fraction::Fraction;
use crate::hap::Hap;
use crate::pattern::{stack, Pattern};

/// One zone-scoped layer with a timing offset in cycles.
#[derive(Debug, Clone)]
pub struct ZoneLayer {
    pub zone: String,
    pub pattern: Pattern,
    pub offset: Fraction,
}

impl ZoneLayer {
    pub fn new(zone: impl Into<String>, pattern: Pattern) -> Self {
        ZoneLayer {
            zone: zone.into(),
            pattern,
            offset: Fraction::zero(),
        }
    }

    pub fn with_offset(mut self, offset: Fraction) -> Self {
        self.offset = offset;
        self
    }
}

/// What to do when a required zone is missing from the venue.
#[derive(Debug, Clone)]
pub enum FallbackStrategy {
    /// Run the primary zone's layer (or the fallback pattern if the venue
    /// has no primary) across all available lights.
    UsePrimary,
    /// Union every layer's output onto all available lights.
    MergeLayers,
    /// Exclude the pattern from selection entirely.
    Disable,
    /// Swap in an explicitly supplied alternate pattern.
    Reinterpret(Pattern),
}

/// A composition of zone layers with declared zone requirements.
#[derive(Debug, Clone)]
pub struct LayeredPattern {
    pub layers: Vec<ZoneLayer>,
    /// Zones that must exist for the layered composition to run.
    pub requires: Vec<String>,
    /// Zones that improve the pattern but whose absence only drops their
    /// layers.
    pub enhanced_by: Vec<String>,
    /// Single-zone pattern used when falling back without a primary layer.
    pub fallback: Pattern,
    pub strategy: FallbackStrategy,
}

impl LayeredPattern {
    pub fn new(fallback: Pattern) -> Self {
        LayeredPattern {
            layers: Vec::new(),
            requires: Vec::new(),
            enhanced_by: Vec::new(),
            fallback,
            strategy: FallbackStrategy::UsePrimary,
        }
    }

    pub fn layer(mut self, layer: ZoneLayer) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn requires(mut self, zones: Vec<String>) -> Self {
        self.requires = zones;
        self
    }

    pub fn enhanced_by(mut self, zones: Vec<String>) -> Self {
        self.enhanced_by = zones;
        self
    }

    pub fn strategy(mut self, strategy: FallbackStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Resolve a layered pattern against a venue. Returns None only when a
/// required zone is missing and the strategy is [`FallbackStrategy::Disable`].
pub fn combine_zone_layers(layered: &LayeredPattern, ctx: &LightContext) -> Option<Pattern> {
    let missing_required = layered
        .requires
        .iter()
        .any(|zone| !ctx.has_zone(zone));

    if !missing_required {
        let layers: Vec<Pattern> = layered
            .layers
            .iter()
            // Layers on absent enhancement zones drop out silently.
            .filter(|layer| ctx.has_zone(&layer.zone))
            .map(|layer| zone_scoped(layer.pattern.clone(), layer.zone.clone()).late(layer.offset))
            .collect();
        return Some(stack(layers));
    }

    match &layered.strategy {
        FallbackStrategy::Disable => None,
        FallbackStrategy::UsePrimary => {
            let primary = ctx.primary_zone.as_deref().and_then(|primary| {
                layered
                    .layers
                    .iter()
                    .find(|layer| layer.zone == primary)
                    .map(|layer| layer.pattern.clone())
            });
            let pattern = primary.unwrap_or_else(|| layered.fallback.clone());
            Some(across_available(pattern))
        }
        FallbackStrategy::MergeLayers => {
            let merged = stack(
                layered
                    .layers
                    .iter()
                    .map(|layer| layer.pattern.clone().late(layer.offset))
                    .collect(),
            );
            Some(across_available(merged))
        }
        FallbackStrategy::Reinterpret(alternate) => Some(across_available(alternate.clone())),
    }
}

/// Scope a pattern to one zone: it queries against a context whose "all"
/// (and every group) is intersected with the zone, and its output is
/// concretized to lights inside the zone.
fn zone_scoped(pattern: Pattern, zone: String) -> Pattern {
    Pattern::new(move |span, ctx: &LightContext| {
        let lights = ctx.resolve_zone(&zone);
        if lights.is_empty() {
            return Vec::new();
        }
        let scoped = ctx.restricted_to(&lights);
        let allowed: HashSet<usize> = lights.into_iter().collect();
        concretize(pattern.query(span, &scoped), &scoped, &allowed)
    })
}

/// Run a pattern across the union of all configured zones' lights. Group
/// references inside the pattern, including "all", genuinely restrict to
/// that subset rather than passing through.
fn across_available(pattern: Pattern) -> Pattern {
    Pattern::new(move |span, ctx: &LightContext| {
        let mut lights: Vec<usize> = ctx
            .zones
            .values()
            .flatten()
            .copied()
            .collect::<HashSet<usize>>()
            .into_iter()
            .collect();
        lights.sort_unstable();
        if lights.is_empty() {
            return Vec::new();
        }
        let scoped = ctx.restricted_to(&lights);
        let allowed: HashSet<usize> = lights.into_iter().collect();
        concretize(pattern.query(span, &scoped), &scoped, &allowed)
    })
}

/// Expand group events to per-light events within an allowed subset, so the
/// restriction survives resolution against any later context.
fn concretize(haps: Vec<Hap>, ctx: &LightContext, allowed: &HashSet<usize>) -> Vec<Hap> {
    haps.into_iter()
        .flat_map(|hap| match hap.value.light_id {
            Some(id) => {
                if allowed.contains(&id) {
                    vec![hap]
                } else {
                    Vec::new()
                }
            }
            None => ctx
                .resolve_target(None, hap.value.group.as_deref())
                .into_iter()
                .filter(|light| allowed.contains(light))
                .map(|light| hap.with_value(hap.value.retarget(light)))
                .collect(),
        })
        .collect()
}
