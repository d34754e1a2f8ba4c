//! Per-category alert rotation.
//!
//! A rotator is a two-state machine (`Idle` / `Displaying`) advanced once per
//! display-duration tick:
//!
//! 1. Hide the alert currently shown, if any.
//! 2. Stop if nothing is queued.
//! 3. Pop the head event. Drop it if the active scene has no bindings for the
//!    category.
//! 4. Drop it if the category is disabled.
//! 5. Otherwise write its fields, show the toggle and enter `Displaying`.
//!
//! Hiding always comes first so that two alerts of one category are never
//! visible together and the hide transition gets a full tick before the next
//! alert appears. A popped event is never requeued.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::binding::{DisplayBinding, SceneBindingRegistry};
use crate::config::CategoryConfig;
use crate::event::{Category, Event};
use crate::events::DropReason;
use crate::presentation::PresentationTarget;
use crate::queue::SharedQueue;

/// Rotator phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Displaying,
}

/// Observable rotator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotatorState {
    pub phase: Phase,
    /// Set only while `Displaying`.
    pub active_since: Option<DateTime<Utc>>,
}

impl RotatorState {
    fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            active_since: None,
        }
    }
}

/// What happened to the queue head during a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Nothing was queued.
    Empty,
    /// The head event is now displayed.
    Shown(Event),
    /// The head event was discarded.
    Dropped { event: Event, reason: DropReason },
}

/// Result of one rotator tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    /// The alert hidden at the start of the tick, with when it was shown.
    pub retired: Option<(Event, DateTime<Utc>)>,
    pub advance: Advance,
}

/// Display state machine for one category.
#[derive(Debug)]
pub struct AlertRotator {
    category: Category,
    config: CategoryConfig,
    queue: SharedQueue,
    state: RotatorState,
    current: Option<(Event, DisplayBinding)>,
    shown_total: u64,
    dropped_total: u64,
}

impl AlertRotator {
    pub fn new(category: Category, config: CategoryConfig, queue: SharedQueue) -> Self {
        Self {
            category,
            config,
            queue,
            state: RotatorState::idle(),
            current: None,
            shown_total: 0,
            dropped_total: 0,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn state(&self) -> RotatorState {
        self.state
    }

    /// Event currently displayed.
    pub fn current_event(&self) -> Option<&Event> {
        self.current.as_ref().map(|(event, _)| event)
    }

    /// Scene the current alert was bound in.
    pub fn current_scene(&self) -> Option<&str> {
        self.current.as_ref().map(|(_, binding)| binding.scene.as_str())
    }

    pub fn shown_total(&self) -> u64 {
        self.shown_total
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total
    }

    /// Replace the configuration. Takes effect on the next tick.
    pub fn set_config(&mut self, config: CategoryConfig) {
        self.config = config;
    }

    /// Advance the state machine by one tick.
    pub fn tick(
        &mut self,
        target: &dyn PresentationTarget,
        registry: &mut SceneBindingRegistry,
        now: DateTime<Utc>,
    ) -> TickOutcome {
        let retired = self.retire(target);

        let Some(event) = self.queue.lock().dequeue_head() else {
            return TickOutcome {
                retired,
                advance: Advance::Empty,
            };
        };

        let binding = match registry.resolve(target, self.category, &self.config) {
            Ok(binding) => binding,
            Err(unresolved) => {
                debug!(category = %self.category, event = %event, "{unresolved}, dropping alert");
                return self.drop_event(
                    retired,
                    event,
                    DropReason::Unbound {
                        scene: unresolved.scene,
                        missing: unresolved.missing,
                    },
                );
            }
        };

        if !self.config.enabled {
            debug!(category = %self.category, event = %event, "Alerts disabled, dropping alert");
            return self.drop_event(retired, event, DropReason::Disabled);
        }

        for (role, text) in event.render() {
            if let Some(slot) = binding.slot(role) {
                target.set_text(slot, &text);
            }
        }
        target.set_visible(binding.toggle, true);

        info!(category = %self.category, scene = %binding.scene, "Showing alert: {event}");
        self.state = RotatorState {
            phase: Phase::Displaying,
            active_since: Some(now),
        };
        self.shown_total += 1;
        self.current = Some((event.clone(), binding));

        TickOutcome {
            retired,
            advance: Advance::Shown(event),
        }
    }

    /// Hide the displayed alert, if any, and return to `Idle`.
    pub fn retire(&mut self, target: &dyn PresentationTarget) -> Option<(Event, DateTime<Utc>)> {
        let shown_at = self.state.active_since;
        self.state = RotatorState::idle();

        let (event, binding) = self.current.take()?;
        target.set_visible(binding.toggle, false);
        debug!(category = %self.category, "Finished alert: {event}");
        shown_at.map(|at| (event, at))
    }

    fn drop_event(
        &mut self,
        retired: Option<(Event, DateTime<Utc>)>,
        event: Event,
        reason: DropReason,
    ) -> TickOutcome {
        self.dropped_total += 1;
        TickOutcome {
            retired,
            advance: Advance::Dropped { event, reason },
        }
    }
}
