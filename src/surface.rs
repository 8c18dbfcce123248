//! Scene surface contract and an in-process implementation.
//!
//! The surface is whatever renders the scene and lets the user edit it. The
//! core only needs it to report mutations, to replace its scene with a
//! snapshot's contents, and to expose a handful of element operations.

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::scene::{ElementId, Scene, SceneElement};

/// Brush used for freehand strokes
pub const PEN_COLOR: &str = "#000000";
pub const PEN_WIDTH: f64 = 5.0;

/// Mutation notifications emitted by a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    ElementAdded(ElementId),
    ElementModified(ElementId),
    ElementRemoved(ElementId),
    FreehandStrokeCompleted(ElementId),
}

impl SurfaceEvent {
    pub fn element(&self) -> ElementId {
        match *self {
            SurfaceEvent::ElementAdded(id)
            | SurfaceEvent::ElementModified(id)
            | SurfaceEvent::ElementRemoved(id)
            | SurfaceEvent::FreehandStrokeCompleted(id) => id,
        }
    }
}

/// Registration for all four mutation notifications.
///
/// Dropping it deregisters: the surface discards listeners whose receiving
/// end is gone the next time it emits.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<SurfaceEvent>,
}

impl Subscription {
    /// Non-blocking check for a single event
    pub fn try_next(&mut self) -> Option<SurfaceEvent> {
        self.rx.try_recv().ok()
    }

    /// Take every event queued so far
    pub fn drain(&mut self) -> Vec<SurfaceEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_next() {
            events.push(event);
        }
        events
    }

    /// Wait for the next event
    pub async fn next(&mut self) -> Option<SurfaceEvent> {
        self.rx.recv().await
    }
}

/// Fan-out of surface events to live subscriptions
#[derive(Debug, Default)]
pub struct Listeners {
    senders: Vec<mpsc::UnboundedSender<SurfaceEvent>>,
}

impl Listeners {
    pub fn subscribe(&mut self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx);
        Subscription { rx }
    }

    pub fn emit(&mut self, event: SurfaceEvent) {
        self.senders.retain(|tx| tx.send(event).is_ok());
    }

    /// Number of registrations still alive
    pub fn len(&mut self) -> usize {
        self.senders.retain(|tx| !tx.is_closed());
        self.senders.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }
}

/// The interactive rendering/editing surface as seen by the core
#[async_trait]
pub trait SceneSurface: Send {
    /// Scene as currently shown
    fn scene(&self) -> &Scene;

    /// Replace the whole scene. Restoring is not instantaneous, and the
    /// surface may emit mutation events while it happens.
    async fn apply_scene(&mut self, scene: Scene) -> Result<()>;

    /// Toggle interactivity; a non-interactive surface also stops target
    /// finding and hover feedback
    fn set_interactive(&mut self, interactive: bool);

    fn is_interactive(&self) -> bool;

    /// Toggle freehand drawing
    fn set_drawing_mode(&mut self, enabled: bool);

    fn is_drawing(&self) -> bool;

    fn for_each_element(&mut self, f: &mut dyn FnMut(&mut SceneElement));

    fn selected(&self) -> Option<ElementId>;

    fn select(&mut self, id: Option<ElementId>);

    /// Add an element; emits `ElementAdded`
    fn add_element(&mut self, element: SceneElement) -> ElementId;

    /// Remove an element; emits `ElementRemoved`
    fn remove_element(&mut self, id: ElementId) -> Option<SceneElement>;

    /// Change an element in place without emitting anything
    fn mutate_element(&mut self, id: ElementId, f: &mut dyn FnMut(&mut SceneElement)) -> bool;

    /// Emit `ElementModified` for an element changed through `mutate_element`
    fn notify_modified(&mut self, id: ElementId);

    /// Finish a pen stroke; emits `FreehandStrokeCompleted` then
    /// `ElementAdded`. `None` unless drawing mode is on.
    fn complete_stroke(&mut self, points: &[(f64, f64)]) -> Option<ElementId>;

    fn render(&mut self);

    fn subscribe(&mut self) -> Subscription;
}

/// Headless surface holding the scene in memory
#[derive(Debug)]
pub struct MemorySurface {
    scene: Scene,
    selected: Option<ElementId>,
    interactive: bool,
    target_finding: bool,
    drawing: bool,
    listeners: Listeners,
    renders: usize,
    reject_next_apply: bool,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::with_scene(Scene::empty())
    }

    pub fn with_scene(scene: Scene) -> Self {
        Self {
            scene,
            selected: None,
            interactive: true,
            target_finding: true,
            drawing: false,
            listeners: Listeners::default(),
            renders: 0,
            reject_next_apply: false,
        }
    }

    /// Make the next `apply_scene` fail, as a surface rejecting a scene would
    pub fn reject_next_apply(&mut self) {
        self.reject_next_apply = true;
    }

    pub fn render_count(&self) -> usize {
        self.renders
    }

    pub fn finds_targets(&self) -> bool {
        self.target_finding
    }

    pub fn listener_count(&mut self) -> usize {
        self.listeners.len()
    }
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SceneSurface for MemorySurface {
    fn scene(&self) -> &Scene {
        &self.scene
    }

    async fn apply_scene(&mut self, scene: Scene) -> Result<()> {
        if std::mem::take(&mut self.reject_next_apply) {
            bail!("surface rejected scene");
        }
        tokio::task::yield_now().await;

        // Rebuilding fires the same notifications as user edits would.
        for old in std::mem::take(&mut self.scene.elements) {
            self.listeners.emit(SurfaceEvent::ElementRemoved(old.id));
        }
        self.scene.background = scene.background;
        for element in scene.elements {
            let id = element.id;
            self.scene.elements.push(element);
            self.listeners.emit(SurfaceEvent::ElementAdded(id));
        }
        self.selected = None;
        Ok(())
    }

    fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
        self.target_finding = interactive;
        if !interactive {
            self.drawing = false;
            self.selected = None;
        }
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn set_drawing_mode(&mut self, enabled: bool) {
        self.drawing = enabled && self.interactive;
    }

    fn is_drawing(&self) -> bool {
        self.drawing
    }

    fn for_each_element(&mut self, f: &mut dyn FnMut(&mut SceneElement)) {
        self.scene.elements.iter_mut().for_each(f);
    }

    fn selected(&self) -> Option<ElementId> {
        self.selected
    }

    fn select(&mut self, id: Option<ElementId>) {
        self.selected = id.filter(|id| self.scene.get(*id).is_some());
    }

    fn add_element(&mut self, element: SceneElement) -> ElementId {
        let id = element.id;
        self.scene.elements.push(element);
        self.listeners.emit(SurfaceEvent::ElementAdded(id));
        id
    }

    fn remove_element(&mut self, id: ElementId) -> Option<SceneElement> {
        let index = self.scene.elements.iter().position(|e| e.id == id)?;
        let removed = self.scene.elements.remove(index);
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.listeners.emit(SurfaceEvent::ElementRemoved(id));
        Some(removed)
    }

    fn mutate_element(&mut self, id: ElementId, f: &mut dyn FnMut(&mut SceneElement)) -> bool {
        match self.scene.get_mut(id) {
            Some(element) => {
                f(element);
                true
            }
            None => false,
        }
    }

    fn notify_modified(&mut self, id: ElementId) {
        self.listeners.emit(SurfaceEvent::ElementModified(id));
    }

    fn complete_stroke(&mut self, points: &[(f64, f64)]) -> Option<ElementId> {
        if !self.drawing || points.is_empty() {
            return None;
        }
        let element = SceneElement::freehand(points, PEN_COLOR, PEN_WIDTH);
        let id = element.id;
        self.scene.elements.push(element);
        self.listeners.emit(SurfaceEvent::FreehandStrokeCompleted(id));
        self.listeners.emit(SurfaceEvent::ElementAdded(id));
        Some(id)
    }

    fn render(&mut self) {
        self.renders += 1;
    }

    fn subscribe(&mut self) -> Subscription {
        self.listeners.subscribe()
    }
}
