//! Mini-notation compiler.
//!
//! A compact string syntax for rhythmic light patterns:
//!
//! ```text
//! "all ~ left right"    four slots per cycle, second is a rest
//! "0 3*2 ~ odd"         numbers target lights, words target groups
//! "all*4"               subdivide a slot into 4 sub-events
//! "all/2"               fire only every 2nd cycle
//! ```
//!
//! Each space-delimited token occupies `1/N` of the cycle. Compilation
//! never panics; malformed notation returns a [`ParseError`] carrying the
//! offending substring and its position.

use thiserror::Error;

use crate::fraction::Fraction;
use crate::hap::Hap;
use crate::pattern::{stack, Pattern};
use crate::timespan::TimeSpan;
use crate::value::LightValue;

/// What went wrong while compiling notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedToken,
    UnknownModifier,
    EmptyExpression,
}

/// A compile failure, with the offending substring and byte position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?} at position {position}: {token:?}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub token: String,
    pub position: usize,
}

impl ParseError {
    fn new(kind: ParseErrorKind, token: &str, position: usize) -> Self {
        ParseError {
            kind,
            token: token.to_string(),
            position,
        }
    }
}

/// One parsed slot of the sequence.
#[derive(Debug, Clone, PartialEq)]
enum Target {
    Rest,
    Light(usize),
    Group(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Element {
    target: Target,
    /// Subdivisions of the slot, from `*n`.
    reps: i64,
    /// Fire only on cycles divisible by this, from `/n`.
    every: i64,
}

/// Compile mini-notation into a pattern.
pub fn light(notation: &str) -> Result<Pattern, ParseError> {
    let elements = parse(notation)?;
    let n_slots = elements.len() as i64;

    let slots: Vec<Pattern> = elements
        .into_iter()
        .enumerate()
        .filter_map(|(index, element)| {
            let value = match element.target {
                Target::Rest => return None,
                Target::Light(id) => LightValue::for_light(id),
                Target::Group(name) => LightValue::for_group(name),
            };
            Some(slot_pattern(value, index as i64, n_slots, element.reps, element.every))
        })
        .collect();

    Ok(stack(slots))
}

/// A pattern firing `reps` sub-events in slot `index` of `n_slots`, on
/// cycles divisible by `every`.
fn slot_pattern(value: LightValue, index: i64, n_slots: i64, reps: i64, every: i64) -> Pattern {
    Pattern::new(move |span: TimeSpan, _ctx| {
        let mut haps = Vec::new();
        for cycle_span in span.span_cycles() {
            let cycle = cycle_span.start.cycle_index();
            if cycle.rem_euclid(every) != 0 {
                continue;
            }
            let base = cycle_span.start.sam();
            let slot_width = Fraction::new(1, n_slots * reps);
            for rep in 0..reps {
                let start =
                    base + Fraction::new(index, n_slots) + slot_width * Fraction::from_integer(rep);
                let whole = TimeSpan::new(start, start + slot_width);
                if let Some(part) = whole.intersection(&cycle_span) {
                    haps.push(Hap::new(Some(whole), part, value.clone()));
                }
            }
        }
        haps
    })
}

fn parse(notation: &str) -> Result<Vec<Element>, ParseError> {
    let mut elements = Vec::new();

    for (position, token) in tokens(notation) {
        elements.push(parse_token(token, position)?);
    }

    if elements.is_empty() {
        return Err(ParseError::new(
            ParseErrorKind::EmptyExpression,
            notation.trim(),
            0,
        ));
    }
    Ok(elements)
}

/// Whitespace-delimited tokens with their byte positions.
fn tokens(notation: &str) -> impl Iterator<Item = (usize, &str)> {
    notation
        .split_whitespace()
        .map(move |tok| (offset_of(notation, tok), tok))
}

fn offset_of(haystack: &str, token: &str) -> usize {
    // split_whitespace yields subslices of the input, so pointer math
    // recovers the byte offset.
    token.as_ptr() as usize - haystack.as_ptr() as usize
}

fn parse_token(token: &str, position: usize) -> Result<Element, ParseError> {
    if token == "~" {
        return Ok(Element {
            target: Target::Rest,
            reps: 1,
            every: 1,
        });
    }

    let name_end = token
        .find(|c: char| c == '*' || c == '/')
        .unwrap_or(token.len());
    let (name, modifiers) = token.split_at(name_end);

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ParseError::new(
            ParseErrorKind::UnexpectedToken,
            token,
            position,
        ));
    }

    let target = match name.parse::<usize>() {
        Ok(id) => Target::Light(id),
        Err(_) => Target::Group(name.to_string()),
    };

    let mut reps = 1i64;
    let mut every = 1i64;
    let mut rest = modifiers;
    while !rest.is_empty() {
        let op = rest
            .chars()
            .next()
            .filter(|&c| c == '*' || c == '/')
            .ok_or_else(|| ParseError::new(ParseErrorKind::UnknownModifier, token, position))?;
        let arg_end = rest[1..]
            .find(|c: char| !c.is_ascii_digit())
            .map(|i| i + 1)
            .unwrap_or(rest.len());
        let count: i64 = rest[1..arg_end]
            .parse()
            .map_err(|_| ParseError::new(ParseErrorKind::UnknownModifier, token, position))?;
        if count < 1 {
            return Err(ParseError::new(
                ParseErrorKind::UnknownModifier,
                token,
                position,
            ));
        }
        match op {
            '*' => reps = count,
            _ => every = count,
        }
        rest = &rest[arg_end..];
    }

    Ok(Element {
        target,
        reps,
        every,
    })
}
