//! Snapshot codec: scene graph <-> storable canvas value.
//!
//! The document store accepts scalars, maps and flat sequences only. Every
//! element is written as a flat map with a uniform key set:
//!
//! - the seven lock flags and the hover cursor are always present
//! - path geometry (a sequence of sequences) travels as one JSON text token
//! - `styles`, `textBackgroundColor` and, for non-path elements, `path` are
//!   written as `null`
//! - pass-through properties without a value are written as `null`
//! - pass-through values holding nested sequences become JSON text tokens,
//!   and their keys are listed under `encodedFields`
//!
//! Decoding reverses both kinds of token. Path data that fails to parse is kept
//! verbatim as [`PathData::Raw`] so one bad stroke never blocks a load.

use std::sync::Arc;

use canvaskeep_store::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::error::CodecError;
use crate::scene::{ElementId, ElementKind, LockFlags, PathCommand, PathData, Scene, SceneElement};

/// Newest snapshot layout this codec writes and reads
pub const SNAPSHOT_VERSION: i64 = 1;

/// Lists the pass-through keys whose values travel as JSON text tokens
const ENCODED_FIELDS: &str = "encodedFields";

const RESERVED_KEYS: &[&str] = &[
    ENCODED_FIELDS,
    "type",
    "id",
    "left",
    "top",
    "angle",
    "scaleX",
    "scaleY",
    "fill",
    "stroke",
    "strokeWidth",
    "opacity",
    "movable",
    "eventable",
    "rotatable",
    "scalableX",
    "scalableY",
    "hasControls",
    "hasBorders",
    "hoverCursor",
    "width",
    "height",
    "radius",
    "rx",
    "ry",
    "text",
    "fontSize",
    "textAlign",
    "styles",
    "textBackgroundColor",
    "path",
];

/// Immutable, storage-ready capture of a whole scene.
///
/// Cloning is cheap; equality is structural.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSnapshot(Arc<Value>);

impl SceneSnapshot {
    pub fn from_value(value: Value) -> Self {
        Self(Arc::new(value))
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        self.0.as_ref().clone()
    }

    pub fn version(&self) -> Option<i64> {
        self.0.get("version").and_then(Value::as_i64)
    }

    pub fn object_count(&self) -> usize {
        self.0
            .get("objects")
            .and_then(Value::as_array)
            .map_or(0, <[Value]>::len)
    }
}

/// Encode a scene into a storable snapshot
pub fn encode(scene: &Scene) -> Result<SceneSnapshot, CodecError> {
    let objects = scene
        .elements
        .iter()
        .map(|el| write_element(el).map(Value::Map))
        .collect::<Result<Vec<_>, _>>()?;

    let mut canvas = Map::new();
    canvas.insert("version".into(), Value::Integer(SNAPSHOT_VERSION));
    canvas.insert("background".into(), scene.background.clone().into());
    canvas.insert("objects".into(), Value::Array(objects));
    Ok(SceneSnapshot::from_value(Value::Map(canvas)))
}

/// Decode a snapshot back into a scene
pub fn decode(snapshot: &SceneSnapshot) -> Result<Scene, CodecError> {
    let canvas = snapshot.value().as_map().ok_or(CodecError::NotACanvas)?;

    let version = canvas
        .get("version")
        .and_then(Value::as_i64)
        .unwrap_or(SNAPSHOT_VERSION);
    if version > SNAPSHOT_VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: version,
            supported: SNAPSHOT_VERSION,
        });
    }

    let objects = match canvas.get("objects") {
        None | Some(Value::Null) => &[][..],
        Some(value) => value.as_array().ok_or(CodecError::NotACanvas)?,
    };

    let mut elements = Vec::with_capacity(objects.len());
    for (index, obj) in objects.iter().enumerate() {
        match obj.as_map() {
            Some(map) => {
                if let Some(element) = read_element(map) {
                    elements.push(element);
                }
            }
            None => warn!(index, "skipping canvas object that is not a map"),
        }
    }

    Ok(Scene {
        background: get_opt_string(canvas, "background"),
        elements,
    })
}

// --- Element helpers ---

fn write_element(el: &SceneElement) -> Result<Map, CodecError> {
    let mut obj = Map::new();
    let mut encoded = Vec::new();

    // Pass-through first so the typed fields below always win.
    for (key, value) in &el.extra {
        if RESERVED_KEYS.contains(&key.as_str()) {
            warn!(key = %key, "ignoring pass-through property that shadows a scene field");
            continue;
        }
        let value = match value {
            Some(json) => {
                let value = Value::from_json(json.clone());
                if value.check_storable().is_ok() {
                    value
                } else {
                    encoded.push(Value::from(key.as_str()));
                    Value::String(serde_json::to_string(json)?)
                }
            }
            None => Value::Null,
        };
        obj.insert(key.clone(), value);
    }
    if !encoded.is_empty() {
        obj.insert(ENCODED_FIELDS.into(), Value::Array(encoded));
    }

    obj.insert("type".into(), el.kind.type_name().into());
    obj.insert("id".into(), el.id.to_string().into());
    obj.insert("left".into(), el.left.into());
    obj.insert("top".into(), el.top.into());
    obj.insert("angle".into(), el.angle.into());
    obj.insert("scaleX".into(), el.scale_x.into());
    obj.insert("scaleY".into(), el.scale_y.into());
    obj.insert("fill".into(), el.fill.clone().into());
    obj.insert("stroke".into(), el.stroke.clone().into());
    obj.insert("strokeWidth".into(), el.stroke_width.into());
    obj.insert("opacity".into(), el.opacity.into());

    let locks = &el.locks;
    obj.insert("movable".into(), locks.movable.into());
    obj.insert("eventable".into(), locks.eventable.into());
    obj.insert("rotatable".into(), locks.rotatable.into());
    obj.insert("scalableX".into(), locks.scalable_x.into());
    obj.insert("scalableY".into(), locks.scalable_y.into());
    obj.insert("hasControls".into(), locks.has_controls.into());
    obj.insert("hasBorders".into(), locks.has_borders.into());
    obj.insert("hoverCursor".into(), el.hover_cursor.clone().into());

    obj.insert("styles".into(), Value::Null);
    obj.insert("textBackgroundColor".into(), Value::Null);
    obj.insert("path".into(), Value::Null);

    match &el.kind {
        ElementKind::Rect { width, height } => {
            obj.insert("width".into(), (*width).into());
            obj.insert("height".into(), (*height).into());
        }
        ElementKind::Circle { radius } => {
            obj.insert("radius".into(), (*radius).into());
        }
        ElementKind::Ellipse { rx, ry } => {
            obj.insert("rx".into(), (*rx).into());
            obj.insert("ry".into(), (*ry).into());
        }
        ElementKind::Textbox {
            text,
            width,
            font_size,
            text_align,
            ..
        } => {
            obj.insert("text".into(), text.as_str().into());
            obj.insert("width".into(), (*width).into());
            obj.insert("fontSize".into(), (*font_size).into());
            obj.insert("textAlign".into(), text_align.as_str().into());
        }
        ElementKind::Path { path } => {
            obj.insert("path".into(), path_token(path)?.into());
        }
    }

    Ok(obj)
}

fn read_element(obj: &Map) -> Option<SceneElement> {
    let type_name = get_opt_string(obj, "type")?;

    let kind = match type_name.as_str() {
        "rect" => ElementKind::Rect {
            width: get_f64(obj, "width", 0.0),
            height: get_f64(obj, "height", 0.0),
        },
        "circle" => ElementKind::Circle {
            radius: get_f64(obj, "radius", 0.0),
        },
        "ellipse" => ElementKind::Ellipse {
            rx: get_f64(obj, "rx", 0.0),
            ry: get_f64(obj, "ry", 0.0),
        },
        "textbox" => ElementKind::Textbox {
            text: get_opt_string(obj, "text").unwrap_or_default(),
            width: get_f64(obj, "width", 0.0),
            font_size: get_f64(obj, "fontSize", 20.0),
            text_align: get_opt_string(obj, "textAlign").unwrap_or_else(|| "left".to_string()),
            styles: None,
            text_background_color: None,
        },
        "path" => ElementKind::Path {
            path: read_path(obj.get("path")),
        },
        other => {
            warn!(element_type = other, "skipping element of unknown type");
            return None;
        }
    };

    let id = get_opt_string(obj, "id")
        .and_then(|s| Uuid::parse_str(&s).ok())
        .map(ElementId)
        .unwrap_or_default();

    let encoded: Vec<&str> = obj
        .get(ENCODED_FIELDS)
        .and_then(Value::as_array)
        .map(|keys| keys.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let extra = obj
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| {
            let json = match value {
                Value::String(token) if encoded.contains(&key.as_str()) => read_token(key, token),
                other => other.to_json(),
            };
            (key.clone(), Some(json))
        })
        .collect();

    Some(SceneElement {
        id,
        kind,
        left: get_f64(obj, "left", 0.0),
        top: get_f64(obj, "top", 0.0),
        angle: get_f64(obj, "angle", 0.0),
        scale_x: get_f64(obj, "scaleX", 1.0),
        scale_y: get_f64(obj, "scaleY", 1.0),
        fill: get_opt_string(obj, "fill"),
        stroke: get_opt_string(obj, "stroke"),
        stroke_width: get_f64(obj, "strokeWidth", 1.0),
        opacity: get_f64(obj, "opacity", 1.0),
        locks: LockFlags {
            movable: get_bool(obj, "movable", true),
            eventable: get_bool(obj, "eventable", true),
            rotatable: get_bool(obj, "rotatable", true),
            scalable_x: get_bool(obj, "scalableX", true),
            scalable_y: get_bool(obj, "scalableY", true),
            has_controls: get_bool(obj, "hasControls", true),
            has_borders: get_bool(obj, "hasBorders", true),
        },
        hover_cursor: get_opt_string(obj, "hoverCursor"),
        extra,
    })
}

fn read_token(key: &str, token: &str) -> serde_json::Value {
    serde_json::from_str(token).unwrap_or_else(|e| {
        warn!(key, error = %e, "failed to parse encoded pass-through property");
        serde_json::Value::String(token.to_string())
    })
}

// --- Path token ---

fn path_token(path: &PathData) -> Result<String, CodecError> {
    match path {
        PathData::Commands(cmds) => Ok(serde_json::to_string(cmds)?),
        PathData::Raw(raw) => Ok(raw.clone()),
    }
}

fn read_path(value: Option<&Value>) -> PathData {
    match value {
        Some(Value::String(token)) => parse_path_token(token),
        None | Some(Value::Null) => PathData::Commands(Vec::new()),
        Some(other) => {
            warn!("path data is not a text token");
            PathData::Raw(other.to_string())
        }
    }
}

fn parse_path_token(token: &str) -> PathData {
    let parsed: serde_json::Value = match serde_json::from_str(token) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "failed to parse path data");
            return PathData::Raw(token.to_string());
        }
    };

    let is_command_list = parsed
        .as_array()
        .is_some_and(|cmds| cmds.iter().all(serde_json::Value::is_array));
    if !is_command_list {
        warn!(path = token, "invalid path data format");
        return PathData::Raw(token.to_string());
    }

    match serde_json::from_value::<Vec<PathCommand>>(parsed) {
        Ok(cmds) => PathData::Commands(cmds),
        Err(e) => {
            warn!(error = %e, "path commands hold unsupported tokens");
            PathData::Raw(token.to_string())
        }
    }
}

// --- Field readers ---

fn get_f64(obj: &Map, key: &str, default: f64) -> f64 {
    obj.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn get_bool(obj: &Map, key: &str, default: bool) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn get_opt_string(obj: &Map, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}
