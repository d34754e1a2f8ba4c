//! Presentation target trait.
//!
//! A [`PresentationTarget`] is the host application that owns scenes, text
//! sources and scene-item visibility. Slot and toggle handles are opaque and
//! only meaningful to the target that issued them.

mod scene_graph;

pub use scene_graph::{OverlaySnapshot, SceneGraph, VisibleItem};

/// Handle to a text source, valid for the target that resolved it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotHandle(u64);

impl SlotHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Handle to a scene item whose visibility can be toggled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToggleHandle(u64);

impl ToggleHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Kind of source behind a scene item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// A text display.
    Text,
    /// A nested scene.
    Scene,
    /// Anything else (images, media, browser sources...).
    Other(String),
}

/// One item of a scene as seen during a relisting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneItemListing {
    pub name: String,
    pub kind: SourceKind,
}

/// A scene and its direct items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneListing {
    pub name: String,
    pub items: Vec<SceneItemListing>,
}

/// The host presentation layer.
///
/// Calls are synchronous and cheap; implementations must be shareable across
/// the rotator timers.
pub trait PresentationTarget: Send + Sync {
    /// Name of the scene currently on air, if any.
    fn active_scene_name(&self) -> Option<String>;

    /// Find a text source reachable from `scene`.
    fn resolve_slot(&self, scene: &str, slot: &str) -> Option<SlotHandle>;

    /// Find an item directly inside `scene` whose visibility can be toggled.
    fn resolve_toggle(&self, scene: &str, toggle: &str) -> Option<ToggleHandle>;

    fn set_text(&self, slot: SlotHandle, text: &str);

    fn set_visible(&self, toggle: ToggleHandle, visible: bool);

    fn is_visible(&self, toggle: ToggleHandle) -> bool;

    /// Every scene with its direct items.
    fn list_scenes(&self) -> Vec<SceneListing>;
}
