//! Pattern engine: a registry of named patterns, one of which is selected
//! and rendered.
//!
//! The engine owns one [`Scheduler`] per selection, cached across frames and
//! rebuilt only when the selection actually changes. Selection, hot-reload
//! and blackout can be driven from other threads through an [`EngineHandle`];
//! commands are queued on a channel and drained non-blockingly at the top of
//! each frame, so the renderer always observes a complete pattern+scheduler
//! pair.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, warn};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;

use crate::color::Rgb;
use crate::context::LightContext;
use crate::mini::{light, ParseError};
use crate::pattern::Pattern;
use crate::scheduler::Scheduler;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("no pattern registered under {0:?}")]
    UnknownPattern(String),
    #[error("pattern registry is empty")]
    EmptyRegistry,
}

/// Control messages applied between frames.
enum Command {
    Select(String),
    Next,
    Prev,
    Swap { name: String, pattern: Pattern },
    Blackout(bool),
}

/// Cloneable cross-thread control surface for a [`PatternEngine`].
#[derive(Clone)]
pub struct EngineHandle {
    sender: Sender<Command>,
}

impl EngineHandle {
    pub fn select(&self, name: impl Into<String>) {
        let _ = self.sender.send(Command::Select(name.into()));
    }

    pub fn next(&self) {
        let _ = self.sender.send(Command::Next);
    }

    pub fn prev(&self) {
        let _ = self.sender.send(Command::Prev);
    }

    /// Publish a fully compiled replacement for a registered pattern.
    /// Compile on the calling thread, never the render thread.
    pub fn swap(&self, name: impl Into<String>, pattern: Pattern) {
        let _ = self.sender.send(Command::Swap {
            name: name.into(),
            pattern,
        });
    }

    pub fn set_blackout(&self, blackout: bool) {
        let _ = self.sender.send(Command::Blackout(blackout));
    }
}

/// Snapshot of the engine's state, for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub selected: Option<String>,
    pub available: Vec<String>,
    pub blackout: bool,
    pub active_events: usize,
}

/// Registry plus render loop entry point.
pub struct PatternEngine {
    context: LightContext,
    /// Registration order, for next/prev cycling.
    names: Vec<String>,
    patterns: HashMap<String, Pattern>,
    selected: Option<String>,
    scheduler: Option<Scheduler>,
    blackout: bool,
    commands: Receiver<Command>,
    handle: EngineHandle,
}

impl PatternEngine {
    pub fn new(context: LightContext) -> Self {
        let (sender, commands) = unbounded();
        PatternEngine {
            context,
            names: Vec::new(),
            patterns: HashMap::new(),
            selected: None,
            scheduler: None,
            blackout: false,
            commands,
            handle: EngineHandle { sender },
        }
    }

    /// A control handle usable from any thread.
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Register a pattern under a name. The first registration becomes the
    /// selection; re-registering a name replaces its pattern.
    pub fn register(&mut self, name: impl Into<String>, pattern: Pattern) {
        let name = name.into();
        if !self.patterns.contains_key(&name) {
            self.names.push(name.clone());
        }
        let first = self.selected.is_none();
        let replacing_selected = self.selected.as_deref() == Some(name.as_str());
        self.patterns.insert(name.clone(), pattern);

        if first {
            // Infallible: the name was just inserted.
            let _ = self.select(&name);
        } else if replacing_selected {
            self.rebuild_scheduler();
        }
    }

    /// Select a pattern by name, building a fresh scheduler for it.
    pub fn select(&mut self, name: &str) -> Result<(), EngineError> {
        if !self.patterns.contains_key(name) {
            return Err(EngineError::UnknownPattern(name.to_string()));
        }
        debug!("selecting pattern {:?}", name);
        self.selected = Some(name.to_string());
        self.rebuild_scheduler();
        Ok(())
    }

    /// Select by position in registration order.
    pub fn select_index(&mut self, index: usize) -> Result<(), EngineError> {
        let name = self
            .names
            .get(index)
            .cloned()
            .ok_or(EngineError::EmptyRegistry)?;
        self.select(&name)
    }

    /// Advance the selection to the next registered pattern.
    pub fn next(&mut self) -> Result<(), EngineError> {
        self.step(1)
    }

    /// Move the selection to the previous registered pattern.
    pub fn prev(&mut self) -> Result<(), EngineError> {
        self.step(-1)
    }

    fn step(&mut self, delta: i64) -> Result<(), EngineError> {
        if self.names.is_empty() {
            return Err(EngineError::EmptyRegistry);
        }
        let current = self
            .selected
            .as_ref()
            .and_then(|s| self.names.iter().position(|n| n == s))
            .unwrap_or(0) as i64;
        let len = self.names.len() as i64;
        let next = (current + delta).rem_euclid(len) as usize;
        let name = self.names[next].clone();
        self.select(&name)
    }

    /// Recompile a registered pattern from notation. On a parse failure the
    /// previous good pattern stays registered and selected.
    pub fn reload(&mut self, name: &str, notation: &str) -> Result<(), ParseError> {
        match light(notation) {
            Ok(pattern) => {
                self.register(name, pattern);
                Ok(())
            }
            Err(err) => {
                warn!("reload of {:?} failed, keeping previous: {}", name, err);
                Err(err)
            }
        }
    }

    pub fn set_blackout(&mut self, blackout: bool) {
        self.blackout = blackout;
    }

    pub fn toggle_blackout(&mut self) -> bool {
        self.blackout = !self.blackout;
        self.blackout
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            selected: self.selected.clone(),
            available: self.names.clone(),
            blackout: self.blackout,
            active_events: self.scheduler.as_ref().map_or(0, Scheduler::active_count),
        }
    }

    /// Render one frame. Drains queued control commands first, then runs the
    /// cached scheduler. Nothing here may take down the render loop: an
    /// internal panic is caught, logged, and rendered as a dark frame.
    pub fn compute_colors(&mut self, beat_position: f64) -> HashMap<usize, Rgb> {
        self.drain_commands();

        if self.blackout {
            return HashMap::new();
        }
        let scheduler = match &mut self.scheduler {
            Some(s) => s,
            None => return HashMap::new(),
        };

        match catch_unwind(AssertUnwindSafe(|| scheduler.compute_colors(beat_position))) {
            Ok(colors) => colors,
            Err(_) => {
                warn!("frame at beat {} panicked, rendering dark", beat_position);
                HashMap::new()
            }
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Select(name) => {
                    if let Err(err) = self.select(&name) {
                        warn!("select failed: {}", err);
                    }
                }
                Command::Next => {
                    if let Err(err) = self.next() {
                        warn!("next failed: {}", err);
                    }
                }
                Command::Prev => {
                    if let Err(err) = self.prev() {
                        warn!("prev failed: {}", err);
                    }
                }
                Command::Swap { name, pattern } => self.register(name, pattern),
                Command::Blackout(blackout) => self.blackout = blackout,
            }
        }
    }

    fn rebuild_scheduler(&mut self) {
        let pattern = self
            .selected
            .as_ref()
            .and_then(|name| self.patterns.get(name))
            .cloned();
        self.scheduler = pattern.map(|p| Scheduler::new(p, self.context.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mini::ParseErrorKind;

    fn engine() -> PatternEngine {
        PatternEngine::new(LightContext::default_venue(6))
    }

    #[test]
    fn test_first_registration_is_selected() {
        let mut e = engine();
        e.register("pulse", light("all ~").unwrap());
        assert_eq!(e.status().selected.as_deref(), Some("pulse"));
        assert!(!e.compute_colors(0.0).is_empty());
    }

    #[test]
    fn test_select_unknown_fails() {
        let mut e = engine();
        e.register("pulse", light("all").unwrap());
        assert_eq!(
            e.select("strobe"),
            Err(EngineError::UnknownPattern("strobe".to_string()))
        );
        assert_eq!(e.status().selected.as_deref(), Some("pulse"));
    }

    #[test]
    fn test_next_prev_cycle_registration_order() {
        let mut e = engine();
        e.register("a", light("all").unwrap());
        e.register("b", light("left").unwrap());
        e.register("c", light("right").unwrap());

        e.next().unwrap();
        assert_eq!(e.status().selected.as_deref(), Some("b"));
        e.next().unwrap();
        e.next().unwrap();
        assert_eq!(e.status().selected.as_deref(), Some("a"));
        e.prev().unwrap();
        assert_eq!(e.status().selected.as_deref(), Some("c"));
    }

    #[test]
    fn test_reload_keeps_previous_on_failure() {
        let mut e = engine();
        e.register("pulse", light("all").unwrap());

        let err = e.reload("pulse", "all *").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
        // The old pattern still renders.
        assert!(!e.compute_colors(0.0).is_empty());
    }

    #[test]
    fn test_reload_success_replaces() {
        let mut e = engine();
        e.register("pulse", light("all").unwrap());
        e.reload("pulse", "0 ~ ~ ~").unwrap();
        let colors = e.compute_colors(0.0);
        assert_eq!(colors.len(), 1);
    }

    #[test]
    fn test_blackout() {
        let mut e = engine();
        e.register("pulse", light("all").unwrap());
        assert!(e.toggle_blackout());
        assert!(e.compute_colors(0.0).is_empty());
        assert!(!e.toggle_blackout());
        assert!(!e.compute_colors(0.0).is_empty());
    }

    #[test]
    fn test_handle_commands_apply_between_frames() {
        let mut e = engine();
        e.register("a", light("all").unwrap());
        e.register("b", light("0 ~ ~ ~").unwrap());

        let handle = e.handle();
        handle.select("b");
        assert_eq!(e.compute_colors(0.0).len(), 1);
        assert_eq!(e.status().selected.as_deref(), Some("b"));

        handle.swap("b", light("left").unwrap());
        assert_eq!(e.compute_colors(0.0).len(), 3);

        handle.set_blackout(true);
        assert!(e.compute_colors(0.0).is_empty());
    }

    #[test]
    fn test_empty_registry_renders_dark() {
        let mut e = engine();
        assert!(e.compute_colors(0.0).is_empty());
        assert_eq!(e.next(), Err(EngineError::EmptyRegistry));
    }
}
