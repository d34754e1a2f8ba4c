//! Live alerts: follower, subscriber and rant overlays for live streams.
//!
//! This crate polls a live-streaming service for audience events and rotates
//! them through timed overlays in a broadcasting application, one category at
//! a time.
//!
//! ## Core Types
//!
//! - [`Event`] - A single audience event (follower, subscriber or rant)
//! - [`Category`] - The alert category an event belongs to
//! - [`CategoryQueue`] - FIFO of pending events for one category
//! - [`AlertRotator`] - Per-category display state machine
//! - [`SceneBindingRegistry`] - Resolves slot/toggle names in the active scene
//! - [`Poller`] - Pulls new events from an [`EventSource`] into the queues
//! - [`AlertSystem`] - Owns configuration, queues, rotators and timers
//!
//! ## Collaborators
//!
//! - [`EventSource`] - Where events come from ([`source::RumbleApiSource`])
//! - [`PresentationTarget`] - Where alerts are shown ([`presentation::SceneGraph`])

pub mod binding;
pub mod config;
pub mod error;
pub mod event;
pub mod events;
pub mod poller;
pub mod presentation;
pub mod queue;
pub mod rotator;
pub mod scheduler;
pub mod source;
pub mod system;

pub use binding::{BindingUnresolved, DisplayBinding, SceneBindingRegistry};
pub use config::{AlertConfig, CategoryConfig, SlotNames};
pub use error::{Error, Result, SourceError};
pub use event::{Category, CategoryMap, Event, SlotRole, format_cents};
pub use events::{AlertEvent, AlertEventBroadcaster, DropReason};
pub use poller::{Cursors, PollReport, Poller};
pub use presentation::{PresentationTarget, SceneListing, SlotHandle, ToggleHandle};
pub use queue::{CategoryQueue, QueueSet, SharedQueue};
pub use rotator::{Advance, AlertRotator, Phase, RotatorState, TickOutcome};
pub use scheduler::{Scheduler, TimerHandle, TokioScheduler};
pub use source::{Cursor, EventSource, SessionHandle};
pub use system::{AlertSystem, CategoryStatus, SystemStatus};
