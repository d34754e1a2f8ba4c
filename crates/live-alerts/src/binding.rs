//! Scene binding resolution.
//!
//! The registry answers, for the scene currently on air, whether a category's
//! text slots and visibility toggle all exist, and hands back handles for one
//! rotation cycle. Handles are resolved on every request and never reused
//! across scene switches.
//!
//! It also keeps a listing of the scene topology, rebuilt on every
//! configuration refresh or scene-list change, which hosts use to offer text
//! sources and sub-scenes as binding choices.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::debug;

use crate::config::CategoryConfig;
use crate::event::{Category, SlotRole};
use crate::presentation::{
    PresentationTarget, SceneItemListing, SlotHandle, SourceKind, ToggleHandle,
};

/// Resolved handles for one category in one scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayBinding {
    pub scene: String,
    pub slots: Vec<(SlotRole, SlotHandle)>,
    pub toggle: ToggleHandle,
}

impl DisplayBinding {
    pub fn slot(&self, role: SlotRole) -> Option<SlotHandle> {
        self.slots
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, handle)| *handle)
    }
}

/// The active scene has no alert UI for a category.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{category} alert is not bound in scene {scene:?} (missing: {})", .missing.join(", "))]
pub struct BindingUnresolved {
    pub category: Category,
    pub scene: Option<String>,
    pub missing: Vec<String>,
}

/// Resolves category bindings against the active scene.
#[derive(Debug, Default)]
pub struct SceneBindingRegistry {
    scenes: BTreeMap<String, Vec<SceneItemListing>>,
    text_sources: BTreeSet<String>,
    subscenes: BTreeSet<String>,
    generation: u64,
}

impl SceneBindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the topology listing from the target.
    pub fn relist(&mut self, target: &dyn PresentationTarget) {
        self.scenes.clear();
        self.text_sources.clear();
        self.subscenes.clear();

        for scene in target.list_scenes() {
            for item in &scene.items {
                debug!(scene = %scene.name, item = %item.name, kind = ?item.kind, "Listed scene item");
                match item.kind {
                    SourceKind::Text => {
                        self.text_sources.insert(item.name.clone());
                    }
                    SourceKind::Scene => {
                        self.subscenes.insert(item.name.clone());
                    }
                    SourceKind::Other(_) => {}
                }
            }
            self.scenes.insert(scene.name, scene.items);
        }

        self.generation += 1;
        debug!(
            generation = self.generation,
            scenes = self.scenes.len(),
            text_sources = self.text_sources.len(),
            subscenes = self.subscenes.len(),
            "Relisted scenes and sources"
        );
    }

    /// Hook for hosts that report scene list changes.
    pub fn scene_list_changed(&mut self, target: &dyn PresentationTarget) {
        self.relist(target);
    }

    /// Resolve `category`'s slots and toggle in the active scene.
    pub fn resolve(
        &mut self,
        target: &dyn PresentationTarget,
        category: Category,
        config: &CategoryConfig,
    ) -> Result<DisplayBinding, BindingUnresolved> {
        let wanted: Vec<(SlotRole, Option<&str>)> = category
            .required_slots()
            .iter()
            .map(|role| (*role, config.slots.name_for(*role)))
            .collect();

        let Some(scene) = target.active_scene_name() else {
            let mut missing: Vec<String> = wanted
                .iter()
                .map(|(role, name)| name.map_or_else(|| role.to_string(), str::to_string))
                .collect();
            missing.push(config.toggle.clone());
            return Err(BindingUnresolved {
                category,
                scene: None,
                missing,
            });
        };

        if !self.scenes.contains_key(&scene) {
            debug!(scene = %scene, "Active scene not in listing, relisting");
            self.relist(target);
        }

        let mut missing = Vec::new();
        let mut slots = Vec::with_capacity(wanted.len());
        for (role, name) in wanted {
            match name.and_then(|n| target.resolve_slot(&scene, n)) {
                Some(handle) => slots.push((role, handle)),
                None => missing.push(name.map_or_else(|| role.to_string(), str::to_string)),
            }
        }

        let toggle = target.resolve_toggle(&scene, &config.toggle);
        if toggle.is_none() {
            missing.push(config.toggle.clone());
        }

        match toggle {
            Some(toggle) if missing.is_empty() => Ok(DisplayBinding {
                scene,
                slots,
                toggle,
            }),
            _ => Err(BindingUnresolved {
                category,
                scene: Some(scene),
                missing,
            }),
        }
    }

    /// Text sources seen in the last listing.
    pub fn text_sources(&self) -> impl Iterator<Item = &str> {
        self.text_sources.iter().map(String::as_str)
    }

    /// Scenes used as items of other scenes in the last listing.
    pub fn subscenes(&self) -> impl Iterator<Item = &str> {
        self.subscenes.iter().map(String::as_str)
    }

    pub fn scene_names(&self) -> impl Iterator<Item = &str> {
        self.scenes.keys().map(String::as_str)
    }

    pub fn items_in(&self, scene: &str) -> Option<&[SceneItemListing]> {
        self.scenes.get(scene).map(Vec::as_slice)
    }

    /// Number of relistings so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
