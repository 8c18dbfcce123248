//! Editor session: one open document wired to its surface, history and store.
//!
//! Data flows one way. Surface mutation events are drained by
//! [`EditorSession::process_events`], captured into the history, and the
//! resulting snapshot is handed to the debounced autosave. Undo and redo
//! replay a snapshot onto the surface under the history's replay guard and
//! then write the restored state immediately.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use canvaskeep_store::{DocumentRecord, DocumentStore};
use tracing::{debug, error, info};

use crate::access::{self, AccessMode, DocumentLink};
use crate::autosave::{Autosave, SAVE_FAILED};
use crate::codec::{self, SceneSnapshot};
use crate::config::EditorConfig;
use crate::history::{History, Replay};
use crate::notice::NoticeBoard;
use crate::scene::{ElementId, Scene, ShapeKind};
use crate::surface::{SceneSurface, Subscription};

pub const LOAD_FAILED: &str = "Failed to load canvas. Please refresh.";
pub const UNDO_FAILED: &str = "Failed to undo. Please try again.";
pub const REDO_FAILED: &str = "Failed to redo. Please try again.";

/// Moved elements snap to multiples of this
pub const GRID_SIZE: f64 = 20.0;

/// Active editing tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Select,
    Pen,
}

impl Tool {
    pub fn name(self) -> &'static str {
        match self {
            Tool::Select => "select",
            Tool::Pen => "pen",
        }
    }
}

/// Point-in-time summary for a status bar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub document: String,
    pub access: AccessMode,
    pub tool: Tool,
    pub elements: usize,
    pub undo: usize,
    pub redo: usize,
    pub saving: bool,
    pub notice: Option<String>,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] tool: {} | {} elements",
            self.document,
            self.access.name(),
            self.tool.name(),
            self.elements
        )?;
        if !self.access.is_read_only() {
            if self.undo > 0 {
                write!(f, " | Undo ({})", self.undo)?;
            }
            if self.redo > 0 {
                write!(f, " | Redo ({})", self.redo)?;
            }
        }
        if self.saving {
            f.write_str(" | Saving changes...")?;
        }
        if let Some(notice) = &self.notice {
            write!(f, " | {}", notice)?;
        }
        Ok(())
    }
}

/// One open document
pub struct EditorSession<S: SceneSurface> {
    link: DocumentLink,
    store: Arc<dyn DocumentStore>,
    surface: S,
    history: History,
    autosave: Autosave,
    notices: NoticeBoard,
    events: Option<Subscription>,
    tool: Tool,
    config: EditorConfig,
}

impl<S: SceneSurface> EditorSession<S> {
    /// Open `link` on `surface`, loading whatever the store holds for it.
    ///
    /// Store and surface failures during the load are reported as a notice
    /// and leave the session on an empty scene; only a scene the codec cannot
    /// encode at all fails the open.
    pub async fn open(
        link: DocumentLink,
        store: Arc<dyn DocumentStore>,
        mut surface: S,
        config: EditorConfig,
    ) -> Result<Self> {
        let notices = NoticeBoard::new(config.notice_ttl);
        let autosave = Autosave::new(config.quiet_interval, notices.clone());
        let events = surface.subscribe();
        let history = History::new(
            codec::encode(&Scene::empty())?,
            link.access,
            config.max_history,
        );

        let mut session = Self {
            link,
            store,
            surface,
            history,
            autosave,
            notices,
            events: Some(events),
            tool: Tool::Select,
            config,
        };
        session.load().await?;
        Ok(session)
    }

    async fn load(&mut self) -> Result<()> {
        let fetched = self.store.get(self.link.id.as_str()).await;
        match fetched {
            Ok(Some(record)) => {
                let last_updated = record.last_updated_rfc3339();
                let snapshot = SceneSnapshot::from_value(record.canvas);
                let guard = self.history.begin_replay();
                let applied = self.apply_snapshot(&snapshot).await;
                drop(guard);
                match applied {
                    Ok(()) => info!(
                        document = %self.link.id,
                        elements = self.surface.scene().len(),
                        last_updated = %last_updated,
                        "loaded document"
                    ),
                    Err(e) => {
                        error!(document = %self.link.id, error = %e, "load failed");
                        self.notices.report(LOAD_FAILED);
                    }
                }
            }
            Ok(None) => info!(document = %self.link.id, "new document"),
            Err(e) => {
                error!(document = %self.link.id, error = %e, "load failed");
                self.notices.report(LOAD_FAILED);
            }
        }

        if self.is_read_only() {
            self.surface.for_each_element(&mut access::lock_down);
            self.surface.select(None);
            self.surface.set_interactive(false);
        }
        self.surface.render();

        let baseline = codec::encode(self.surface.scene())?;
        self.history.reset(baseline);
        Ok(())
    }

    // --- Mutation entry points ---

    /// Add a stock shape and select it
    pub fn add_shape(&mut self, shape: ShapeKind) -> Result<Option<ElementId>> {
        if self.is_read_only() {
            return Ok(None);
        }
        self.select_tool();
        let id = self.surface.add_element(shape.build());
        self.surface.select(Some(id));
        self.surface.render();
        self.process_events()?;
        Ok(Some(id))
    }

    /// Remove the selected element unless it is locked
    pub fn delete_selected(&mut self) -> Result<bool> {
        let Some(id) = self.editable_selection() else {
            return Ok(false);
        };
        self.surface.remove_element(id);
        self.surface.render();
        self.process_events()?;
        Ok(true)
    }

    /// Set the fill of the selected element unless it is locked
    pub fn change_color(&mut self, color: &str) -> Result<bool> {
        let Some(id) = self.editable_selection() else {
            return Ok(false);
        };
        self.surface
            .mutate_element(id, &mut |el| el.fill = Some(color.to_string()));
        self.surface.notify_modified(id);
        self.surface.render();
        self.process_events()?;
        Ok(true)
    }

    /// Drop the selected element at `(left, top)`, snapped to the grid
    pub fn move_selected(&mut self, left: f64, top: f64) -> Result<bool> {
        let Some(id) = self.editable_selection() else {
            return Ok(false);
        };
        self.surface.mutate_element(id, &mut |el| {
            el.left = snap_to_grid(left);
            el.top = snap_to_grid(top);
        });
        self.surface.notify_modified(id);
        self.surface.render();
        self.process_events()?;
        Ok(true)
    }

    /// Flip every lock flag of the selected element.
    ///
    /// Unlocking selects the element, locking deselects it. Records exactly
    /// one history entry.
    pub fn toggle_lock(&mut self) -> Result<bool> {
        if self.is_read_only() {
            return Ok(false);
        }
        let Some(id) = self.surface.selected() else {
            return Ok(false);
        };
        // Earlier surface edits get their own entry before the toggle
        self.process_events()?;

        let mut locked = false;
        let found = self.surface.mutate_element(id, &mut |el| {
            el.locks = el.locks.toggled();
            locked = el.is_locked();
        });
        if !found {
            return Ok(false);
        }

        if locked {
            self.surface.select(None);
        } else {
            self.surface.select(Some(id));
        }
        self.surface.render();
        debug!(element = %id, locked, "toggled lock");
        self.capture()?;
        Ok(true)
    }

    /// Switch to freehand drawing
    pub fn enable_pen(&mut self) -> bool {
        if self.is_read_only() {
            return false;
        }
        self.tool = Tool::Pen;
        self.surface.select(None);
        self.surface.set_drawing_mode(true);
        true
    }

    /// Switch back to the selection tool
    pub fn select_tool(&mut self) {
        self.tool = Tool::Select;
        self.surface.set_drawing_mode(false);
    }

    /// Finish a pen stroke through `points`
    pub fn complete_stroke(&mut self, points: &[(f64, f64)]) -> Result<Option<ElementId>> {
        if self.is_read_only() {
            return Ok(None);
        }
        let id = self.surface.complete_stroke(points);
        if id.is_some() {
            self.surface.render();
            self.process_events()?;
        }
        Ok(id)
    }

    pub fn select(&mut self, id: Option<ElementId>) -> bool {
        if self.is_read_only() {
            return false;
        }
        self.surface.select(id);
        self.surface.selected() == id
    }

    /// Step back one history entry. Returns whether the surface changed.
    pub async fn undo(&mut self) -> Result<bool> {
        if self.is_read_only() {
            return Ok(false);
        }
        self.process_events()?;
        let Some(Replay { snapshot, guard }) = self.history.begin_undo() else {
            return Ok(false);
        };

        let applied = self.apply_snapshot(&snapshot).await;
        drop(guard);
        if let Err(e) = &applied {
            error!(error = %e, "undo failed");
            self.notices.report(UNDO_FAILED);
        }
        self.flush_now().await?;
        Ok(applied.is_ok())
    }

    /// Re-apply the most recently undone entry. Returns whether the surface
    /// changed.
    pub async fn redo(&mut self) -> Result<bool> {
        if self.is_read_only() {
            return Ok(false);
        }
        self.process_events()?;
        let Some(Replay { snapshot, guard }) = self.history.begin_redo() else {
            return Ok(false);
        };

        let applied = self.apply_snapshot(&snapshot).await;
        if applied.is_ok() {
            self.history.complete_redo(snapshot);
        }
        drop(guard);
        if let Err(e) = &applied {
            error!(error = %e, "redo failed");
            self.notices.report(REDO_FAILED);
        }
        self.flush_now().await?;
        Ok(applied.is_ok())
    }

    /// Drain pending surface events and record them as one history entry.
    ///
    /// Returns the number of events drained. During a replay the history
    /// drops the capture, so this is also how replay side effects are
    /// discarded.
    pub fn process_events(&mut self) -> Result<usize> {
        let batch = match self.events.as_mut() {
            Some(events) => events.drain(),
            None => return Ok(0),
        };
        if batch.is_empty() {
            return Ok(0);
        }
        debug!(
            events = batch.len(),
            replaying = self.history.is_replaying(),
            "surface events"
        );
        self.capture()?;
        Ok(batch.len())
    }

    /// Write the surface state now, superseding any pending debounced save
    pub async fn flush_now(&mut self) -> Result<()> {
        if self.is_read_only() {
            return Ok(());
        }
        let snapshot = match codec::encode(self.surface.scene()) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.notices.report(SAVE_FAILED);
                return Err(e).context("failed to encode scene");
            }
        };
        let write = save_record(Arc::clone(&self.store), self.link.id.to_string(), snapshot);
        self.autosave.flush_now(write).await;
        Ok(())
    }

    // --- Queries ---

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            document: self.link.id.to_string(),
            access: self.link.access,
            tool: self.tool,
            elements: self.surface.scene().len(),
            undo: self.history.undo_count(),
            redo: self.history.redo_count(),
            saving: self.autosave.pending(),
            notice: self.notices.current(),
        }
    }

    pub fn share_url(&self, origin: &str, access: AccessMode) -> String {
        self.link.share_url(origin, access)
    }

    pub fn link(&self) -> &DocumentLink {
        &self.link
    }

    pub fn access(&self) -> AccessMode {
        self.link.access
    }

    pub fn is_read_only(&self) -> bool {
        self.link.access.is_read_only()
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Direct surface access, for edits that originate on the surface itself
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn autosave(&self) -> &Autosave {
        &self.autosave
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Deregister from the surface and hand it back.
    ///
    /// Debounced saves already scheduled still run; call
    /// [`flush_now`](Self::flush_now) first to write synchronously.
    pub fn close(mut self) -> S {
        self.events = None;
        info!(document = %self.link.id, "closed document");
        self.surface
    }

    // --- Internals ---

    fn editable_selection(&self) -> Option<ElementId> {
        if self.is_read_only() {
            return None;
        }
        let id = self.surface.selected()?;
        let element = self.surface.scene().get(id)?;
        (!element.is_locked()).then_some(id)
    }

    fn capture(&mut self) -> Result<()> {
        match self.history.capture(self.surface.scene()) {
            Ok(Some(snapshot)) => {
                self.schedule_save(snapshot);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                self.notices.report(SAVE_FAILED);
                Err(e).context("failed to capture scene")
            }
        }
    }

    fn schedule_save(&self, snapshot: SceneSnapshot) {
        let write = save_record(Arc::clone(&self.store), self.link.id.to_string(), snapshot);
        self.autosave.schedule(write);
    }

    /// Put `snapshot` on the surface. Callers hold the replay guard.
    async fn apply_snapshot(&mut self, snapshot: &SceneSnapshot) -> Result<()> {
        let scene = codec::decode(snapshot).context("failed to decode snapshot")?;
        let applied = self.surface.apply_scene(scene).await;
        // Whatever the surface emitted while rebuilding is dropped here.
        self.process_events()?;
        applied?;

        if self.tool == Tool::Pen {
            self.surface.set_drawing_mode(true);
        }
        self.surface.render();
        Ok(())
    }
}

impl<S: SceneSurface> fmt::Debug for EditorSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorSession")
            .field("link", &self.link)
            .field("tool", &self.tool)
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

async fn save_record(
    store: Arc<dyn DocumentStore>,
    id: String,
    snapshot: SceneSnapshot,
) -> Result<()> {
    let record = DocumentRecord::new(snapshot.to_value());
    store
        .put(&id, record)
        .await
        .with_context(|| format!("failed to save document {}", id))?;
    info!(document = %id, objects = snapshot.object_count(), "saved document");
    Ok(())
}

fn snap_to_grid(value: f64) -> f64 {
    (value / GRID_SIZE).round() * GRID_SIZE
}
