//! Scene graph model.
//!
//! A [`Scene`] is the ordered list of drawable [`SceneElement`]s a canvas
//! holds at one instant. Elements carry their geometry, style and the seven
//! interaction-lock flags that decide whether a user may touch them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canvas background used by new scenes
pub const DEFAULT_BACKGROUND: &str = "#f3f3f3";

/// Element identifier - UUID so ids stay unique across reloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub Uuid);

impl ElementId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-element interaction locks.
///
/// These flags are the only persisted authorization state: an element with
/// `movable == false` counts as locked and refuses deletion and recoloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFlags {
    pub movable: bool,
    pub eventable: bool,
    pub rotatable: bool,
    pub scalable_x: bool,
    pub scalable_y: bool,
    pub has_controls: bool,
    pub has_borders: bool,
}

impl LockFlags {
    pub const UNLOCKED: LockFlags = LockFlags {
        movable: true,
        eventable: true,
        rotatable: true,
        scalable_x: true,
        scalable_y: true,
        has_controls: true,
        has_borders: true,
    };

    pub const LOCKED: LockFlags = LockFlags {
        movable: false,
        eventable: false,
        rotatable: false,
        scalable_x: false,
        scalable_y: false,
        has_controls: false,
        has_borders: false,
    };

    pub fn is_locked(&self) -> bool {
        !self.movable
    }

    /// Flip all seven flags to the opposite lock state
    pub fn toggled(self) -> Self {
        if self.is_locked() {
            Self::UNLOCKED
        } else {
            Self::LOCKED
        }
    }
}

impl Default for LockFlags {
    fn default() -> Self {
        Self::UNLOCKED
    }
}

/// One token of a drawing command: a verb such as `M` or an operand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathToken {
    Number(f64),
    Verb(String),
}

/// A single drawing command, e.g. `["L", 10, 10]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathCommand(pub Vec<PathToken>);

impl PathCommand {
    pub fn new(verb: &str, operands: &[f64]) -> Self {
        let mut tokens = Vec::with_capacity(operands.len() + 1);
        tokens.push(PathToken::Verb(verb.to_string()));
        tokens.extend(operands.iter().map(|&n| PathToken::Number(n)));
        Self(tokens)
    }

    pub fn verb(&self) -> Option<&str> {
        match self.0.first() {
            Some(PathToken::Verb(v)) => Some(v),
            _ => None,
        }
    }
}

/// Freehand geometry
#[derive(Debug, Clone, PartialEq)]
pub enum PathData {
    Commands(Vec<PathCommand>),
    /// Stored data that could not be read back as commands; kept verbatim
    Raw(String),
}

impl PathData {
    pub fn commands(&self) -> Option<&[PathCommand]> {
        match self {
            PathData::Commands(cmds) => Some(cmds),
            PathData::Raw(_) => None,
        }
    }
}

/// Geometry that depends on the element type
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Rect {
        width: f64,
        height: f64,
    },
    Circle {
        radius: f64,
    },
    Ellipse {
        rx: f64,
        ry: f64,
    },
    Textbox {
        text: String,
        width: f64,
        font_size: f64,
        text_align: String,
        /// Per-glyph style overrides; transient, never persisted
        styles: Option<serde_json::Value>,
        /// Never persisted
        text_background_color: Option<String>,
    },
    Path {
        path: PathData,
    },
}

impl ElementKind {
    /// Type tag used in snapshots
    pub fn type_name(&self) -> &'static str {
        match self {
            ElementKind::Rect { .. } => "rect",
            ElementKind::Circle { .. } => "circle",
            ElementKind::Ellipse { .. } => "ellipse",
            ElementKind::Textbox { .. } => "textbox",
            ElementKind::Path { .. } => "path",
        }
    }
}

/// A single drawable unit
#[derive(Debug, Clone, PartialEq)]
pub struct SceneElement {
    pub id: ElementId,
    pub kind: ElementKind,
    pub left: f64,
    pub top: f64,
    pub angle: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub stroke_width: f64,
    pub opacity: f64,
    pub locks: LockFlags,
    pub hover_cursor: Option<String>,
    /// Surface properties the core does not interpret. `None` is a property
    /// the surface reported without a value.
    pub extra: BTreeMap<String, Option<serde_json::Value>>,
}

impl SceneElement {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            id: ElementId::new(),
            kind,
            left: 0.0,
            top: 0.0,
            angle: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            fill: None,
            stroke: None,
            stroke_width: 1.0,
            opacity: 1.0,
            locks: LockFlags::UNLOCKED,
            hover_cursor: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn at(mut self, left: f64, top: f64) -> Self {
        self.left = left;
        self.top = top;
        self
    }

    pub fn with_fill(mut self, fill: impl Into<String>) -> Self {
        self.fill = Some(fill.into());
        self
    }

    pub fn with_stroke(mut self, stroke: impl Into<String>, width: f64) -> Self {
        self.stroke = Some(stroke.into());
        self.stroke_width = width;
        self
    }

    /// Freehand stroke through `points`, drawn with the pen brush
    pub fn freehand(points: &[(f64, f64)], color: &str, width: f64) -> Self {
        let commands = points
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| PathCommand::new(if i == 0 { "M" } else { "L" }, &[x, y]))
            .collect();
        let (left, top) = points.iter().fold((f64::MAX, f64::MAX), |(l, t), &(x, y)| {
            (l.min(x), t.min(y))
        });
        let mut element = Self::new(ElementKind::Path {
            path: PathData::Commands(commands),
        })
        .with_stroke(color, width);
        if !points.is_empty() {
            element = element.at(left, top);
        }
        element
    }

    pub fn is_locked(&self) -> bool {
        self.locks.is_locked()
    }
}

/// Shapes the toolbar can add, with their stock look
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Rectangle,
    Circle,
    Text,
}

impl ShapeKind {
    pub fn name(&self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "Rectangle",
            ShapeKind::Circle => "Circle",
            ShapeKind::Text => "Text",
        }
    }

    /// Build a new element of this shape at the default insertion point
    pub fn build(self) -> SceneElement {
        match self {
            ShapeKind::Rectangle => SceneElement::new(ElementKind::Rect {
                width: 100.0,
                height: 100.0,
            })
            .at(100.0, 100.0)
            .with_fill("#ff5555"),
            ShapeKind::Circle => SceneElement::new(ElementKind::Circle { radius: 50.0 })
                .at(100.0, 100.0)
                .with_fill("#55ff55"),
            ShapeKind::Text => SceneElement::new(ElementKind::Textbox {
                text: "Edit me".to_string(),
                width: 150.0,
                font_size: 20.0,
                text_align: "left".to_string(),
                styles: None,
                text_background_color: None,
            })
            .at(100.0, 100.0)
            .with_fill("#5555ff"),
        }
    }
}

/// The full set of elements at one moment
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub background: Option<String>,
    pub elements: Vec<SceneElement>,
}

impl Scene {
    pub fn empty() -> Self {
        Self {
            background: Some(DEFAULT_BACKGROUND.to_string()),
            elements: Vec::new(),
        }
    }

    pub fn get(&self, id: ElementId) -> Option<&SceneElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut SceneElement> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_flips_every_flag() {
        let locked = LockFlags::UNLOCKED.toggled();
        assert_eq!(locked, LockFlags::LOCKED);
        assert!(locked.is_locked());
        assert_eq!(locked.toggled(), LockFlags::UNLOCKED);
    }

    #[test]
    fn freehand_starts_with_move() {
        let el = SceneElement::freehand(&[(5.0, 7.0), (10.0, 2.0), (20.0, 9.0)], "#000000", 5.0);
        let ElementKind::Path { path } = &el.kind else {
            panic!("expected path");
        };
        let cmds = path.commands().unwrap();
        assert_eq!(cmds.len(), 3);
        assert_eq!(cmds[0].verb(), Some("M"));
        assert_eq!(cmds[2], PathCommand::new("L", &[20.0, 9.0]));
        assert_eq!((el.left, el.top), (5.0, 2.0));
    }

    #[test]
    fn stock_shapes_sit_at_insertion_point() {
        for shape in [ShapeKind::Rectangle, ShapeKind::Circle, ShapeKind::Text] {
            let el = shape.build();
            assert_eq!((el.left, el.top), (100.0, 100.0));
            assert!(!el.is_locked());
        }
    }
}
