//! canvaskeep: scene-state versioning and persistence for a canvas editor.
//!
//! The pieces, leaf first:
//!
//! - [`scene`]: elements, lock flags and path geometry
//! - [`codec`]: scene <-> storable snapshot
//! - [`history`]: undo/redo ledger with replay suppression
//! - [`autosave`]: debounced writes to the document store
//! - [`access`]: editable vs view-only sessions and document links
//! - [`surface`]: what the core needs from a rendering surface
//! - [`session`]: one open document wiring all of the above together
//!
//! Storage lives in the `canvaskeep-store` crate.

pub mod access;
pub mod autosave;
pub mod codec;
pub mod config;
pub mod error;
pub mod history;
pub mod notice;
pub mod scene;
pub mod session;
pub mod surface;

pub use access::{AccessMode, DocumentId, DocumentLink};
pub use config::EditorConfig;
pub use error::CodecError;
pub use session::{EditorSession, SessionStatus, Tool};
pub use surface::{MemorySurface, SceneSurface, SurfaceEvent};
