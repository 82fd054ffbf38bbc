//! Pattern is the core abstraction for representing time-varying light state.
//!
//! A `Pattern` is essentially a function from a time span and venue context
//! to a list of [`Hap`]s. Patterns are immutable; every combinator returns a
//! new pattern wrapping the old query. Queries are pure and deterministic:
//! any randomness (shuffle, pick) is seeded from cycle index and a caller
//! seed, never from global RNG state.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::Arc;

use crate::color::{resolve_color, ColorError, Hsv};
use crate::context::LightContext;
use crate::envelope::Envelope;
use crate::fraction::Fraction;
use crate::hap::Hap;
use crate::modulator::{Modulator, Waveform};
use crate::timespan::TimeSpan;
use crate::value::LightValue;

/// The query function type: takes a span and context, returns haps.
pub type QueryFn = dyn Fn(TimeSpan, &LightContext) -> Vec<Hap> + Send + Sync;

/// A time-varying lighting value, queryable over any span.
pub struct Pattern {
    query: Arc<QueryFn>,
}

impl Clone for Pattern {
    fn clone(&self) -> Self {
        Pattern {
            query: Arc::clone(&self.query),
        }
    }
}

impl std::fmt::Debug for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pattern").finish_non_exhaustive()
    }
}

impl Pattern {
    /// Create a new pattern from a query function.
    pub fn new<F>(query: F) -> Self
    where
        F: Fn(TimeSpan, &LightContext) -> Vec<Hap> + Send + Sync + 'static,
    {
        Pattern {
            query: Arc::new(query),
        }
    }

    /// The empty pattern.
    pub fn silence() -> Self {
        Pattern::new(|_, _| Vec::new())
    }

    /// Query the pattern for events overlapping the given span.
    pub fn query(&self, span: TimeSpan, ctx: &LightContext) -> Vec<Hap> {
        (self.query)(span, ctx)
    }

    /// Query the pattern over an arc given as two time points.
    pub fn query_arc(&self, begin: Fraction, end: Fraction, ctx: &LightContext) -> Vec<Hap> {
        self.query(TimeSpan::new(begin, end), ctx)
    }

    // ============================================
    // Query / hap span plumbing
    // ============================================

    /// Apply a function to the query span before querying.
    fn with_query_span<F>(self, f: F) -> Self
    where
        F: Fn(TimeSpan) -> TimeSpan + Send + Sync + 'static,
    {
        let query = self.query;
        Pattern {
            query: Arc::new(move |span, ctx| query(f(span), ctx)),
        }
    }

    /// Apply a function to both endpoints of the query span.
    fn with_query_time<F>(self, f: F) -> Self
    where
        F: Fn(Fraction) -> Fraction + Send + Sync + 'static,
    {
        self.with_query_span(move |span| span.with_time(&f))
    }

    /// Apply a function to the whole and part of every resulting hap.
    fn with_hap_span<F>(self, f: F) -> Self
    where
        F: Fn(TimeSpan) -> TimeSpan + Send + Sync + 'static,
    {
        let query = self.query;
        Pattern {
            query: Arc::new(move |span, ctx| {
                query(span, ctx)
                    .into_iter()
                    .map(|hap| hap.with_span(&f))
                    .collect()
            }),
        }
    }

    /// Apply a function to both endpoints of every resulting hap.
    fn with_hap_time<F>(self, f: F) -> Self
    where
        F: Fn(Fraction) -> Fraction + Send + Sync + 'static,
    {
        self.with_hap_span(move |span| span.with_time(&f))
    }

    /// Apply a function to the value of every resulting hap.
    pub fn with_value<F>(self, f: F) -> Self
    where
        F: Fn(LightValue) -> LightValue + Send + Sync + 'static,
    {
        let query = self.query;
        Pattern {
            query: Arc::new(move |span, ctx| {
                query(span, ctx)
                    .into_iter()
                    .map(|hap| {
                        let value = f(hap.value.clone());
                        hap.with_value(value)
                    })
                    .collect()
            }),
        }
    }

    /// Split queries at cycle boundaries so the wrapped query only ever sees
    /// spans within a single cycle. Required by per-cycle combinators.
    fn split_queries(self) -> Self {
        let query = self.query;
        Pattern {
            query: Arc::new(move |span: TimeSpan, ctx: &LightContext| {
                span.span_cycles()
                    .into_iter()
                    .flat_map(|subspan| query(subspan, ctx))
                    .collect()
            }),
        }
    }

    // ============================================
    // Time transformations
    // ============================================

    /// Speed the pattern up by a factor.
    pub fn fast(self, factor: Fraction) -> Self {
        if factor.is_zero() {
            return Pattern::silence();
        }
        self.with_query_time(move |t| t * factor)
            .with_hap_time(move |t| t / factor)
    }

    /// Slow the pattern down by a factor.
    pub fn slow(self, factor: Fraction) -> Self {
        if factor.is_zero() {
            return Pattern::silence();
        }
        self.fast(Fraction::one() / factor)
    }

    /// Shift the pattern earlier by an offset in cycles.
    pub fn early(self, offset: Fraction) -> Self {
        self.with_query_time(move |t| t + offset)
            .with_hap_time(move |t| t - offset)
    }

    /// Shift the pattern later by an offset in cycles.
    pub fn late(self, offset: Fraction) -> Self {
        self.early(-offset)
    }

    /// Reverse the pattern within each cycle.
    pub fn rev(self) -> Self {
        let pat = self;
        Pattern::new(move |span: TimeSpan, ctx: &LightContext| {
            let cycle = span.start.sam();
            let next_cycle = span.start.next_sam();

            // Reflect a span about its cycle: a point t maps to
            // cycle + (next_cycle - t), swapping start and end.
            let reflect = |ts: TimeSpan| {
                TimeSpan::new(cycle + (next_cycle - ts.end), cycle + (next_cycle - ts.start))
            };

            pat.query(reflect(span), ctx)
                .into_iter()
                .map(|hap| {
                    Hap::new(
                        hap.whole.map(|w| reflect(w)),
                        reflect(hap.part),
                        hap.value,
                    )
                })
                .collect()
        })
        .split_queries()
    }

    // ============================================
    // Stochastic transformations (seeded, deterministic)
    // ============================================

    /// Permute event values within each cycle. The permutation is derived
    /// from the cycle index and seed, so identical queries always agree.
    pub fn shuffle(self, seed: u64) -> Self {
        let pat = self;
        Pattern::new(move |span: TimeSpan, ctx: &LightContext| {
            let cycle_start = span.start.sam();
            let cycle = TimeSpan::new(cycle_start, span.start.next_sam());

            let mut haps = pat.query(cycle, ctx);
            haps.sort_by(|a, b| a.whole_or_part().start.cmp(&b.whole_or_part().start));

            let mut order: Vec<usize> = (0..haps.len()).collect();
            let mut rng = StdRng::seed_from_u64(mix_seed(seed, cycle_start.cycle_index(), 0));
            order.shuffle(&mut rng);

            let values: Vec<LightValue> = haps.iter().map(|h| h.value.clone()).collect();
            for (hap, from) in haps.iter_mut().zip(order) {
                hap.value = values[from].clone();
            }

            haps.into_iter()
                .filter_map(|hap| hap.part.intersection(&span).map(|part| hap.with_part(part)))
                .collect()
        })
        .split_queries()
    }

    /// Restrict each event to `n` lights chosen from its resolved target
    /// set. With `hold`, the choice stays fixed for windows of that length;
    /// otherwise a fresh choice is made per event onset. Apply after any
    /// time-scaling combinators, since the selection keys off event times
    /// as the event actually fires.
    pub fn pick(self, n: usize, hold: Option<Fraction>, seed: u64) -> Self {
        let pat = self;
        Pattern::new(move |span: TimeSpan, ctx: &LightContext| {
            pat.query(span, ctx)
                .into_iter()
                .flat_map(|hap| {
                    let lights =
                        ctx.resolve_target(hap.value.light_id, hap.value.group.as_deref());
                    if lights.len() <= n {
                        return vec![hap];
                    }

                    let start = hap.whole_or_part().start;
                    let key = match hold {
                        Some(h) if !h.is_zero() => (start / h).floor(),
                        _ => start,
                    };
                    let mut rng =
                        StdRng::seed_from_u64(mix_seed(seed, key.numer(), key.denom()));
                    let chosen = rand::seq::index::sample(&mut rng, lights.len(), n);

                    chosen
                        .iter()
                        .map(|i| hap.with_value(hap.value.retarget(lights[i])))
                        .collect::<Vec<_>>()
                })
                .collect()
        })
    }

    // ============================================
    // Spatial transformations
    // ============================================

    /// Expand each group event into a run of per-light events, each light
    /// occupying an equal slice of the event's whole. With `per_group`, the
    /// venue's configured physical groups run as concurrent sub-sequences;
    /// otherwise the full light set sequences as one stream.
    pub fn seq(self, per_group: bool) -> Self {
        let pat = self;
        Pattern::new(move |span: TimeSpan, ctx: &LightContext| {
            pat.query(span, ctx)
                .into_iter()
                .flat_map(|hap| {
                    let whole = match hap.whole {
                        Some(w) => w,
                        None => return vec![hap],
                    };
                    let lights =
                        ctx.resolve_target(hap.value.light_id, hap.value.group.as_deref());
                    if lights.is_empty() {
                        return Vec::new();
                    }

                    let streams = sequence_streams(&lights, per_group, ctx);
                    streams
                        .into_iter()
                        .flat_map(|stream| {
                            let step = whole.duration()
                                / Fraction::from_integer(stream.len() as i64);
                            stream
                                .into_iter()
                                .enumerate()
                                .filter_map(|(i, light)| {
                                    let sub_start =
                                        whole.start + step * Fraction::from_integer(i as i64);
                                    let sub = TimeSpan::new(sub_start, sub_start + step);
                                    sub.intersection(&hap.part).map(|part| {
                                        Hap::new(Some(sub), part, hap.value.retarget(light))
                                    })
                                })
                                .collect::<Vec<_>>()
                        })
                        .collect::<Vec<_>>()
                })
                .collect()
        })
    }

    /// Spread an oscillation spatially: every resolved light gets the same
    /// modulator, phase-offset by its position in the target set, producing
    /// a traveling wave. Chains onto any modulator already present.
    pub fn wave(self, wave: Waveform, frequency: f64, min: f64, max: f64) -> Self {
        let pat = self;
        Pattern::new(move |span: TimeSpan, ctx: &LightContext| {
            pat.query(span, ctx)
                .into_iter()
                .flat_map(|hap| {
                    let lights =
                        ctx.resolve_target(hap.value.light_id, hap.value.group.as_deref());
                    let count = lights.len().max(1);
                    lights
                        .into_iter()
                        .enumerate()
                        .map(|(i, light)| {
                            let m = Modulator::new(wave, frequency, min, max)
                                .with_phase(i as f64 / count as f64);
                            let m = match &hap.value.modulator {
                                Some(existing) => existing.clone().chain(m),
                                None => m,
                            };
                            hap.with_value(hap.value.retarget(light).with_modulator(m))
                        })
                        .collect::<Vec<_>>()
                })
                .collect()
        })
    }

    /// Restrict the pattern to a zone's light subset. If the zone is not
    /// configured for this venue, the optional fallback zone is tried; with
    /// neither available the pattern is silent.
    pub fn zone(self, name: impl Into<String>, fallback: Option<String>) -> Self {
        let name = name.into();
        let pat = self;
        Pattern::new(move |span: TimeSpan, ctx: &LightContext| {
            let target = if ctx.has_zone(&name) {
                Some(name.clone())
            } else {
                fallback.clone().filter(|f| ctx.has_zone(f))
            };
            let target = match target {
                Some(t) => t,
                None => return Vec::new(),
            };
            let allowed: HashSet<usize> = ctx.resolve_zone(&target).into_iter().collect();

            pat.query(span, ctx)
                .into_iter()
                .flat_map(|hap| {
                    match hap.value.light_id {
                        // Explicitly targeted lights pass only if in-zone.
                        Some(id) => {
                            if allowed.contains(&id) {
                                vec![hap]
                            } else {
                                Vec::new()
                            }
                        }
                        None => {
                            let lights = ctx
                                .resolve_target(None, hap.value.group.as_deref())
                                .into_iter()
                                .filter(|i| allowed.contains(i));
                            lights
                                .map(|light| hap.with_value(hap.value.retarget(light)))
                                .collect()
                        }
                    }
                })
                .collect()
        })
    }

    // ============================================
    // Value transformations
    // ============================================

    /// Set every event's color from a name or `#hex` spec.
    pub fn color(self, spec: &str) -> Result<Self, ColorError> {
        let color = resolve_color(spec)?;
        Ok(self.hsv(color))
    }

    /// Set every event's color from an HSV value.
    pub fn hsv(self, color: Hsv) -> Self {
        self.with_value(move |v| v.with_color(color))
    }

    /// Scale every event's base intensity, clamped to 0..=1.
    pub fn intensity(self, intensity: f64) -> Self {
        let intensity = intensity.clamp(0.0, 1.0);
        self.with_value(move |v| v.with_intensity(intensity))
    }

    /// Shape every event with an ADSR envelope. Merges with any envelope
    /// already present, preferring the new one's explicit fields.
    pub fn envelope(self, envelope: Envelope) -> Self {
        self.with_value(move |v| {
            let merged = match &v.envelope {
                Some(existing) => envelope.merge(existing),
                None => envelope,
            };
            v.with_envelope(merged)
        })
    }

    /// Modulate every event's intensity with an LFO, chaining onto any
    /// modulator already present.
    pub fn modulate(self, modulator: Modulator) -> Self {
        self.with_value(move |v| {
            let m = match &v.modulator {
                Some(existing) => existing.clone().chain(modulator.clone()),
                None => modulator.clone(),
            };
            v.with_modulator(m)
        })
    }
}

/// Mix a caller seed with two integer keys into a PRNG seed.
fn mix_seed(seed: u64, a: i64, b: i64) -> u64 {
    seed.wrapping_mul(0x9e37_79b9_7f4a_7c15)
        ^ (a as u64).wrapping_mul(0xff51_afd7_ed55_8ccd)
        ^ (b as u64).wrapping_mul(0xc4ce_b9fe_1a85_ec53)
}

/// Partition a resolved light set into the streams `seq` runs concurrently.
fn sequence_streams(lights: &[usize], per_group: bool, ctx: &LightContext) -> Vec<Vec<usize>> {
    if !per_group || ctx.physical_groups.is_empty() {
        return vec![lights.to_vec()];
    }

    let mut streams = Vec::new();
    let mut claimed: HashSet<usize> = HashSet::new();
    for name in &ctx.physical_groups {
        let members: Vec<usize> = ctx
            .resolve_group(name)
            .into_iter()
            .filter(|i| lights.contains(i) && claimed.insert(*i))
            .collect();
        if !members.is_empty() {
            streams.push(members);
        }
    }
    // Lights outside every physical group still fire, as one extra stream.
    let rest: Vec<usize> = lights
        .iter()
        .copied()
        .filter(|i| !claimed.contains(i))
        .collect();
    if !rest.is_empty() {
        streams.push(rest);
    }
    streams
}

// ============================================
// Constructors
// ============================================

/// A pattern repeating one value every cycle.
pub fn pure(value: LightValue) -> Pattern {
    Pattern::new(move |span: TimeSpan, _ctx: &LightContext| {
        span.span_cycles()
            .into_iter()
            .map(|subspan| {
                let whole = TimeSpan::new(subspan.start.sam(), subspan.start.next_sam());
                Hap::new(Some(whole), subspan, value.clone())
            })
            .collect()
    })
}

/// Play patterns simultaneously. Overlaps are left for the scheduler's
/// compositing rule to resolve.
pub fn stack(patterns: Vec<Pattern>) -> Pattern {
    if patterns.is_empty() {
        return Pattern::silence();
    }
    Pattern::new(move |span, ctx| patterns.iter().flat_map(|pat| pat.query(span, ctx)).collect())
}

/// Concatenate patterns, one per cycle, round-robin by cycle index. Works
/// for any integer cycle including negative ones.
pub fn cat(patterns: Vec<Pattern>) -> Pattern {
    if patterns.is_empty() {
        return Pattern::silence();
    }
    if patterns.len() == 1 {
        return patterns.into_iter().next().unwrap_or_else(Pattern::silence);
    }

    let len = patterns.len() as i64;
    let patterns = Arc::new(patterns);

    Pattern::new(move |span: TimeSpan, ctx: &LightContext| {
        let cycle = span.start.cycle_index();
        let pat = &patterns[cycle.rem_euclid(len) as usize];

        // Map cycle i of the output onto cycle i.div_euclid(len) of the
        // chosen sub-pattern, so each sub-pattern advances one cycle per
        // round rather than skipping.
        let offset = Fraction::from_integer(cycle - cycle.div_euclid(len));

        pat.query(span.shift(-offset), ctx)
            .into_iter()
            .map(|hap| hap.shift(offset))
            .collect()
    })
    .split_queries()
}

/// Concatenate patterns within a single cycle, each taking an equal slice.
pub fn fastcat(patterns: Vec<Pattern>) -> Pattern {
    if patterns.is_empty() {
        return Pattern::silence();
    }
    let len = patterns.len() as i64;
    cat(patterns).fast(Fraction::from_integer(len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> LightContext {
        LightContext::default_venue(6)
    }

    fn whole_cycle() -> TimeSpan {
        TimeSpan::from_integers(0, 1)
    }

    #[test]
    fn test_query_is_deterministic() {
        let pat = stack(vec![
            pure(LightValue::for_group("left")),
            pure(LightValue::for_group("right")).fast(Fraction::from_integer(3)),
        ])
        .shuffle(7);
        let a = pat.query(whole_cycle(), &ctx());
        let b = pat.query(whole_cycle(), &ctx());
        assert_eq!(a, b);
    }

    #[test]
    fn test_fast_slow_round_trip() {
        let pat = pure(LightValue::for_light(2));
        for n in 1..=5i64 {
            let f = Fraction::from_integer(n);
            let round = pat.clone().fast(f).slow(f);
            assert_eq!(
                round.query(whole_cycle(), &ctx()),
                pat.query(whole_cycle(), &ctx()),
                "n={}",
                n
            );
        }
    }

    #[test]
    fn test_fast_doubles_events() {
        let pat = pure(LightValue::for_light(0)).fast(Fraction::from_integer(2));
        let haps = pat.query(whole_cycle(), &ctx());
        assert_eq!(haps.len(), 2);
        assert_eq!(
            haps[0].whole.unwrap(),
            TimeSpan::new(Fraction::zero(), Fraction::new(1, 2))
        );
        assert_eq!(
            haps[1].whole.unwrap(),
            TimeSpan::new(Fraction::new(1, 2), Fraction::one())
        );
    }

    #[test]
    fn test_early_late_inverse() {
        let pat = pure(LightValue::for_light(1));
        let o = Fraction::new(1, 4);
        let round = pat.clone().early(o).late(o);
        assert_eq!(
            round.query(whole_cycle(), &ctx()),
            pat.query(whole_cycle(), &ctx())
        );
    }

    #[test]
    fn test_late_shifts_onset() {
        let pat = pure(LightValue::for_light(0)).late(Fraction::new(1, 4));
        let haps = pat.query(whole_cycle(), &ctx());
        // The onset within this window is the shifted whole at 1/4.
        let onsets: Vec<_> = haps.iter().filter(|h| h.has_onset()).collect();
        assert_eq!(onsets.len(), 1);
        assert_eq!(onsets[0].whole.unwrap().start, Fraction::new(1, 4));
    }

    #[test]
    fn test_cat_round_robin() {
        let pats = vec![
            pure(LightValue::for_light(0)),
            pure(LightValue::for_light(1)),
            pure(LightValue::for_light(2)),
        ];
        let pat = cat(pats);
        for k in [-4i64, -1, 0, 1, 2, 3, 7] {
            let span = TimeSpan::from_integers(k, k + 1);
            let haps = pat.query(span, &ctx());
            assert_eq!(haps.len(), 1, "k={}", k);
            let expected = k.rem_euclid(3) as usize;
            assert_eq!(haps[0].value.light_id, Some(expected), "k={}", k);
            assert_eq!(haps[0].whole.unwrap(), span, "k={}", k);
        }
    }

    #[test]
    fn test_cat_splits_boundary_spans() {
        let pat = cat(vec![
            pure(LightValue::for_light(0)),
            pure(LightValue::for_light(1)),
        ]);
        let span = TimeSpan::new(Fraction::new(1, 2), Fraction::new(3, 2));
        let haps = pat.query(span, &ctx());
        assert_eq!(haps.len(), 2);
        assert_eq!(haps[0].value.light_id, Some(0));
        assert_eq!(haps[1].value.light_id, Some(1));
        // Parts are clipped to the query, wholes are not.
        assert_eq!(haps[0].part.end, Fraction::one());
        assert_eq!(haps[0].whole.unwrap(), TimeSpan::from_integers(0, 1));
    }

    #[test]
    fn test_fastcat_divides_cycle() {
        let pat = fastcat(vec![
            pure(LightValue::for_light(0)),
            pure(LightValue::for_light(1)),
        ]);
        let haps = pat.query(whole_cycle(), &ctx());
        assert_eq!(haps.len(), 2);
        assert_eq!(haps[0].whole.unwrap().end, Fraction::new(1, 2));
        assert_eq!(haps[1].whole.unwrap().start, Fraction::new(1, 2));
    }

    #[test]
    fn test_rev_mirrors_cycle() {
        let pat = fastcat(vec![
            pure(LightValue::for_light(0)),
            pure(LightValue::for_light(1)),
        ])
        .rev();
        let mut haps = pat.query(whole_cycle(), &ctx());
        haps.sort_by_key(|h| h.part.start);
        assert_eq!(haps[0].value.light_id, Some(1));
        assert_eq!(haps[1].value.light_id, Some(0));
    }

    #[test]
    fn test_rev_twice_is_identity() {
        let pat = fastcat(vec![
            pure(LightValue::for_light(0)),
            pure(LightValue::for_light(1)),
            pure(LightValue::for_light(2)),
        ]);
        let mut a = pat.clone().query(whole_cycle(), &ctx());
        let mut b = pat.rev().rev().query(whole_cycle(), &ctx());
        a.sort_by_key(|h| h.part.start);
        b.sort_by_key(|h| h.part.start);
        assert_eq!(a, b);
    }

    #[test]
    fn test_stack_concatenates() {
        let pat = stack(vec![
            pure(LightValue::for_group("left")),
            pure(LightValue::for_group("right")),
        ]);
        let haps = pat.query(whole_cycle(), &ctx());
        assert_eq!(haps.len(), 2);
    }

    #[test]
    fn test_shuffle_same_cycle_same_order() {
        let pat = fastcat(vec![
            pure(LightValue::for_light(0)),
            pure(LightValue::for_light(1)),
            pure(LightValue::for_light(2)),
            pure(LightValue::for_light(3)),
        ])
        .shuffle(42);
        assert_eq!(
            pat.query(whole_cycle(), &ctx()),
            pat.query(whole_cycle(), &ctx())
        );
        // A different cycle eventually yields a different order.
        let differs = (1..20).any(|k| {
            let span = TimeSpan::from_integers(k, k + 1);
            let values: Vec<_> = pat
                .query(span, &ctx())
                .into_iter()
                .map(|h| h.value.light_id)
                .collect();
            values != vec![Some(0), Some(1), Some(2), Some(3)]
        });
        assert!(differs);
    }

    #[test]
    fn test_pick_selects_n() {
        let pat = pure(LightValue::for_group("all")).pick(2, None, 1);
        let haps = pat.query(whole_cycle(), &ctx());
        assert_eq!(haps.len(), 2);
        let ids: HashSet<_> = haps.iter().map(|h| h.value.light_id).collect();
        assert_eq!(ids.len(), 2);
        for h in &haps {
            assert!(h.value.group.is_none());
        }
    }

    #[test]
    fn test_pick_hold_keeps_selection() {
        let hold = Fraction::from_integer(2);
        let pat = pure(LightValue::for_group("all")).pick(2, Some(hold), 9);
        let first: HashSet<_> = pat
            .query(TimeSpan::from_integers(0, 1), &ctx())
            .into_iter()
            .map(|h| h.value.light_id)
            .collect();
        let second: HashSet<_> = pat
            .query(TimeSpan::from_integers(1, 2), &ctx())
            .into_iter()
            .map(|h| h.value.light_id)
            .collect();
        // Both cycles fall in the same hold window.
        assert_eq!(first, second);
    }

    #[test]
    fn test_seq_subdivides_whole() {
        let pat = pure(LightValue::for_group("left")).seq(false);
        let mut haps = pat.query(whole_cycle(), &ctx());
        haps.sort_by_key(|h| h.part.start);
        assert_eq!(haps.len(), 3);
        assert_eq!(haps[0].value.light_id, Some(0));
        assert_eq!(haps[0].whole.unwrap().end, Fraction::new(1, 3));
        assert_eq!(haps[2].whole.unwrap().start, Fraction::new(2, 3));
    }

    #[test]
    fn test_seq_per_group_runs_concurrently() {
        let mut c = ctx();
        c.physical_groups = vec!["left".to_string(), "right".to_string()];
        let pat = pure(LightValue::for_group("all")).seq(true);
        let haps = pat.query(whole_cycle(), &c);
        // Two streams of three lights each, so two events start at 0.
        assert_eq!(haps.len(), 6);
        let at_zero: Vec<_> = haps
            .iter()
            .filter(|h| h.whole.unwrap().start == Fraction::zero())
            .map(|h| h.value.light_id)
            .collect();
        assert_eq!(at_zero.len(), 2);
        assert!(at_zero.contains(&Some(0)));
        assert!(at_zero.contains(&Some(3)));
    }

    #[test]
    fn test_wave_offsets_phase_per_light() {
        let pat = pure(LightValue::for_group("left")).wave(Waveform::Sine, 1.0, 0.0, 1.0);
        let haps = pat.query(whole_cycle(), &ctx());
        assert_eq!(haps.len(), 3);
        let phases: Vec<f64> = haps
            .iter()
            .map(|h| h.value.modulator.as_ref().unwrap().phase)
            .collect();
        let unique: HashSet<_> = phases.iter().map(|p| (p * 1000.0) as i64).collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_zone_restricts_to_subset() {
        let mut c = ctx();
        c.zones
            .insert("ceiling".to_string(), vec![0, 1]);
        let pat = pure(LightValue::for_group("all")).zone("ceiling", None);
        let haps = pat.query(whole_cycle(), &c);
        let ids: HashSet<_> = haps.iter().map(|h| h.value.light_id).collect();
        assert_eq!(ids, HashSet::from([Some(0), Some(1)]));
    }

    #[test]
    fn test_zone_fallback() {
        let mut c = ctx();
        c.zones.insert("floor".to_string(), vec![4, 5]);
        let pat = pure(LightValue::for_group("all"))
            .zone("ceiling", Some("floor".to_string()));
        let haps = pat.query(whole_cycle(), &c);
        let ids: HashSet<_> = haps.iter().map(|h| h.value.light_id).collect();
        assert_eq!(ids, HashSet::from([Some(4), Some(5)]));
        // No zone at all goes dark.
        let silent = pure(LightValue::for_group("all")).zone("ceiling", None);
        assert!(silent.query(whole_cycle(), &ctx()).is_empty());
    }

    #[test]
    fn test_color_and_intensity_setters() {
        let pat = pure(LightValue::for_light(0))
            .color("red")
            .unwrap()
            .intensity(0.5);
        let haps = pat.query(whole_cycle(), &ctx());
        assert_eq!(haps[0].value.color.unwrap().hue, 0.0);
        assert_eq!(haps[0].value.intensity, 0.5);
        assert!(Pattern::silence().color("plaid").is_err());
    }

    #[test]
    fn test_envelope_merge_through_chain() {
        let first = Envelope::new(Fraction::new(1, 10), Fraction::zero(), 1.0, Fraction::zero());
        let second =
            Envelope::new(Fraction::zero(), Fraction::zero(), 1.0, Fraction::new(1, 5));
        let pat = pure(LightValue::for_light(0)).envelope(first).envelope(second);
        let haps = pat.query(whole_cycle(), &ctx());
        let env = haps[0].value.envelope.unwrap();
        assert_eq!(env.attack, Fraction::new(1, 10));
        assert_eq!(env.release, Fraction::new(1, 5));
    }

    #[test]
    fn test_silence_is_empty() {
        assert!(Pattern::silence()
            .query(TimeSpan::from_integers(-3, 3), &ctx())
            .is_empty());
    }
}
