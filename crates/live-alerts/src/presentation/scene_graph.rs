//! In-process scene graph.
//!
//! Models what a broadcasting application exposes to alert logic: named
//! sources (text, nested scenes, anything else), scenes made of items that
//! reference sources, per-item visibility, and the active scene.

use std::collections::{BTreeMap, HashSet};

use parking_lot::RwLock;
use serde::Serialize;

use super::{
    PresentationTarget, SceneItemListing, SceneListing, SlotHandle, SourceKind, ToggleHandle,
};
use crate::error::{Error, Result};

#[derive(Debug)]
struct SourceEntry {
    name: String,
    kind: SourceKind,
    text: String,
}

#[derive(Debug)]
struct ItemEntry {
    scene: u64,
    source: u64,
    visible: bool,
}

#[derive(Debug, Default)]
struct GraphInner {
    next_id: u64,
    sources: BTreeMap<u64, SourceEntry>,
    items: BTreeMap<u64, ItemEntry>,
    active_scene: Option<u64>,
}

impl GraphInner {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn source_id(&self, name: &str) -> Option<u64> {
        self.sources
            .iter()
            .find(|(_, s)| s.name == name)
            .map(|(id, _)| *id)
    }

    fn scene_id(&self, name: &str) -> Option<u64> {
        self.sources
            .iter()
            .find(|(_, s)| s.name == name && s.kind == SourceKind::Scene)
            .map(|(id, _)| *id)
    }

    fn items_of(&self, scene: u64) -> impl Iterator<Item = (u64, &ItemEntry)> {
        self.items
            .iter()
            .filter(move |(_, item)| item.scene == scene)
            .map(|(id, item)| (*id, item))
    }

    fn find_text(&self, scene: u64, name: &str, visited: &mut HashSet<u64>) -> Option<u64> {
        if !visited.insert(scene) {
            return None;
        }
        for (_, item) in self.items_of(scene) {
            let Some(source) = self.sources.get(&item.source) else {
                continue;
            };
            match source.kind {
                SourceKind::Text if source.name == name => return Some(item.source),
                SourceKind::Scene => {
                    if let Some(found) = self.find_text(item.source, name, visited) {
                        return Some(found);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

/// A visible scene item in an [`OverlaySnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibleItem {
    pub scene: String,
    pub item: String,
}

/// Serializable view of what is on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlaySnapshot {
    pub active_scene: Option<String>,
    pub texts: BTreeMap<String, String>,
    pub visible: Vec<VisibleItem>,
}

/// In-process [`PresentationTarget`].
#[derive(Debug, Default)]
pub struct SceneGraph {
    inner: RwLock<GraphInner>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source. Names are unique.
    pub fn add_source(&self, name: &str, kind: SourceKind) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.source_id(name).is_some() {
            return Err(Error::config(format!("source {name:?} already exists")));
        }
        let id = inner.allocate_id();
        inner.sources.insert(
            id,
            SourceEntry {
                name: name.to_string(),
                kind,
                text: String::new(),
            },
        );
        Ok(())
    }

    pub fn add_scene(&self, name: &str) -> Result<()> {
        self.add_source(name, SourceKind::Scene)
    }

    pub fn add_text_source(&self, name: &str) -> Result<()> {
        self.add_source(name, SourceKind::Text)
    }

    /// Place `source` inside `scene`. Items start hidden.
    pub fn add_item(&self, scene: &str, source: &str) -> Result<()> {
        let mut inner = self.inner.write();
        let scene_id = inner
            .scene_id(scene)
            .ok_or_else(|| Error::config(format!("unknown scene {scene:?}")))?;
        let source_id = inner
            .source_id(source)
            .ok_or_else(|| Error::config(format!("unknown source {source:?}")))?;
        if scene_id == source_id {
            return Err(Error::config(format!("scene {scene:?} cannot contain itself")));
        }
        let id = inner.allocate_id();
        inner.items.insert(
            id,
            ItemEntry {
                scene: scene_id,
                source: source_id,
                visible: false,
            },
        );
        Ok(())
    }

    /// Remove a source and every item referencing it.
    pub fn remove_source(&self, name: &str) -> bool {
        let mut inner = self.inner.write();
        let Some(id) = inner.source_id(name) else {
            return false;
        };
        inner.sources.remove(&id);
        inner.items.retain(|_, item| item.source != id && item.scene != id);
        if inner.active_scene == Some(id) {
            inner.active_scene = None;
        }
        true
    }

    pub fn rename_source(&self, old: &str, new: &str) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.source_id(new).is_some() {
            return Err(Error::config(format!("source {new:?} already exists")));
        }
        let id = inner
            .source_id(old)
            .ok_or_else(|| Error::config(format!("unknown source {old:?}")))?;
        if let Some(source) = inner.sources.get_mut(&id) {
            source.name = new.to_string();
        }
        Ok(())
    }

    /// Switch the scene on air.
    pub fn set_active_scene(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.write();
        let id = inner
            .scene_id(name)
            .ok_or_else(|| Error::config(format!("unknown scene {name:?}")))?;
        inner.active_scene = Some(id);
        Ok(())
    }

    /// Current text of a source.
    pub fn text_of(&self, source: &str) -> Option<String> {
        let inner = self.inner.read();
        let id = inner.source_id(source)?;
        inner.sources.get(&id).map(|s| s.text.clone())
    }

    /// Visibility of `item` inside `scene`.
    pub fn item_visible(&self, scene: &str, item: &str) -> Option<bool> {
        let inner = self.inner.read();
        let scene_id = inner.scene_id(scene)?;
        let source_id = inner.source_id(item)?;
        inner
            .items_of(scene_id)
            .find(|(_, entry)| entry.source == source_id)
            .map(|(_, entry)| entry.visible)
    }

    pub fn snapshot(&self) -> OverlaySnapshot {
        let inner = self.inner.read();
        let name_of = |id: &u64| inner.sources.get(id).map(|s| s.name.clone());

        OverlaySnapshot {
            active_scene: inner.active_scene.as_ref().and_then(name_of),
            texts: inner
                .sources
                .values()
                .filter(|s| s.kind == SourceKind::Text)
                .map(|s| (s.name.clone(), s.text.clone()))
                .collect(),
            visible: inner
                .items
                .values()
                .filter(|item| item.visible)
                .filter_map(|item| {
                    Some(VisibleItem {
                        scene: name_of(&item.scene)?,
                        item: name_of(&item.source)?,
                    })
                })
                .collect(),
        }
    }
}

impl PresentationTarget for SceneGraph {
    fn active_scene_name(&self) -> Option<String> {
        let inner = self.inner.read();
        inner
            .active_scene
            .and_then(|id| inner.sources.get(&id))
            .map(|s| s.name.clone())
    }

    fn resolve_slot(&self, scene: &str, slot: &str) -> Option<SlotHandle> {
        let inner = self.inner.read();
        let scene_id = inner.scene_id(scene)?;
        inner
            .find_text(scene_id, slot, &mut HashSet::new())
            .map(SlotHandle::new)
    }

    fn resolve_toggle(&self, scene: &str, toggle: &str) -> Option<ToggleHandle> {
        let inner = self.inner.read();
        let scene_id = inner.scene_id(scene)?;
        inner
            .items_of(scene_id)
            .find(|(_, item)| {
                inner
                    .sources
                    .get(&item.source)
                    .is_some_and(|s| s.name == toggle)
            })
            .map(|(id, _)| ToggleHandle::new(id))
    }

    fn set_text(&self, slot: SlotHandle, text: &str) {
        if let Some(source) = self.inner.write().sources.get_mut(&slot.id()) {
            source.text = text.to_string();
        }
    }

    fn set_visible(&self, toggle: ToggleHandle, visible: bool) {
        if let Some(item) = self.inner.write().items.get_mut(&toggle.id()) {
            item.visible = visible;
        }
    }

    fn is_visible(&self, toggle: ToggleHandle) -> bool {
        self.inner
            .read()
            .items
            .get(&toggle.id())
            .is_some_and(|item| item.visible)
    }

    fn list_scenes(&self) -> Vec<SceneListing> {
        let inner = self.inner.read();
        inner
            .sources
            .iter()
            .filter(|(_, s)| s.kind == SourceKind::Scene)
            .map(|(id, scene)| SceneListing {
                name: scene.name.clone(),
                items: inner
                    .items_of(*id)
                    .filter_map(|(_, item)| inner.sources.get(&item.source))
                    .map(|s| SceneItemListing {
                        name: s.name.clone(),
                        kind: s.kind.clone(),
                    })
                    .collect(),
            })
            .collect()
    }
}
