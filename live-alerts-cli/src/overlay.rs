//! The overlay the CLI drives: a scene graph built from the config layout,
//! optionally mirrored to a JSON file for an external renderer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use live_alerts::presentation::{SceneGraph, SourceKind};
use live_alerts::{PresentationTarget, SceneListing, SlotHandle, ToggleHandle};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::OverlayLayout;
use crate::error::{CliError, Result};

/// Build a scene graph from `layout`.
pub fn build_scene_graph(layout: &OverlayLayout) -> Result<SceneGraph> {
    let graph = SceneGraph::new();
    let layout_err = |e: live_alerts::Error| CliError::Layout(e.to_string());

    for scene in &layout.scenes {
        graph.add_scene(&scene.name).map_err(layout_err)?;
    }
    for text in &layout.text_sources {
        graph.add_text_source(text).map_err(layout_err)?;
    }

    for scene in &layout.scenes {
        for item in &scene.items {
            // Unknown item names become placeholder sources so layouts can
            // mention images and media the alerts never touch.
            let known = layout.text_sources.contains(item)
                || layout.scenes.iter().any(|s| &s.name == item);
            if !known && graph.add_source(item, SourceKind::Other("placeholder".into())).is_ok() {
                debug!(item = %item, "Added placeholder source");
            }
            graph.add_item(&scene.name, item).map_err(layout_err)?;
        }
    }

    if let Some(active) = &layout.active_scene {
        graph.set_active_scene(active).map_err(layout_err)?;
    }
    Ok(graph)
}

/// [`PresentationTarget`] over an in-process scene graph, optionally
/// mirrored to a snapshot file.
pub struct Overlay {
    graph: Arc<SceneGraph>,
    changes: Option<watch::Sender<()>>,
}

impl Overlay {
    pub fn new(graph: Arc<SceneGraph>) -> Self {
        Self {
            graph,
            changes: None,
        }
    }

    /// Write the overlay state to `path` now and after every visibility
    /// change. Writes happen on the returned task, which exits once the
    /// overlay is dropped. Changes made during a write are coalesced.
    pub fn mirror_to(&mut self, path: PathBuf) -> JoinHandle<()> {
        let (tx, rx) = watch::channel(());
        self.changes = Some(tx);
        tokio::spawn(write_snapshots(self.graph.clone(), path, rx))
    }
}

async fn write_snapshots(graph: Arc<SceneGraph>, path: PathBuf, mut changes: watch::Receiver<()>) {
    loop {
        if let Err(e) = write_snapshot_to(&graph, &path).await {
            warn!(path = %path.display(), error = %e, "Failed to write overlay snapshot");
        }
        if changes.changed().await.is_err() {
            break;
        }
    }
    debug!(path = %path.display(), "Snapshot writer stopped");
}

async fn write_snapshot_to(graph: &SceneGraph, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&graph.snapshot()).map_err(live_alerts::Error::from)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

impl PresentationTarget for Overlay {
    fn active_scene_name(&self) -> Option<String> {
        self.graph.active_scene_name()
    }

    fn resolve_slot(&self, scene: &str, slot: &str) -> Option<SlotHandle> {
        self.graph.resolve_slot(scene, slot)
    }

    fn resolve_toggle(&self, scene: &str, toggle: &str) -> Option<ToggleHandle> {
        self.graph.resolve_toggle(scene, toggle)
    }

    fn set_text(&self, slot: SlotHandle, text: &str) {
        self.graph.set_text(slot, text);
    }

    fn set_visible(&self, toggle: ToggleHandle, visible: bool) {
        self.graph.set_visible(toggle, visible);
        if let Some(changes) = &self.changes {
            changes.send_replace(());
        }
    }

    fn is_visible(&self, toggle: ToggleHandle) -> bool {
        self.graph.is_visible(toggle)
    }

    fn list_scenes(&self) -> Vec<SceneListing> {
        self.graph.list_scenes()
    }
}
