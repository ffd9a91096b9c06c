//! Canvasflow Core Library
//!
//! Interaction and synchronization engine for a multi-user infinite canvas:
//! shape model, viewport transform, pointer-driven editing, snapping, nested
//! groups and the contract used to keep all of it in a shared document store.

pub mod config;
pub mod document;
pub mod error;
pub mod geometry;
pub mod handles;
pub mod input;
pub mod interaction;
pub mod layers;
pub mod presence;
pub mod selection;
pub mod shapes;
pub mod snap;
pub mod store;
pub mod sync;
pub mod viewport;

pub use config::{ConfigError, EngineConfig, MIN_SHAPE_SIZE};
pub use document::Document;
pub use error::{Error, Result};
pub use geometry::{Anchor, Bounds, bounds_of, contains_rect, to_absolute_anchor, to_relative_anchor};
pub use handles::{ConnectorSide, ResizeHandle};
pub use input::{Key, Modifiers, PointerInput};
pub use interaction::{ConnectorPreview, Editor, InteractionState};
pub use layers::LayerNode;
pub use presence::{PresenceMessage, PresenceRoster, PresenceState};
pub use selection::{Selection, SelectionToken};
pub use shapes::{Comment, Connection, GridColumns, Group, Shape, ShapeId, ShapeKind, ShapeStyle};
pub use snap::{Guide, SnapMode};
pub use store::{Collection, DocumentStore, LoroStore, MemoryStore, StoreError, StoreResult};
pub use sync::{RecordSnapshot, SyncBridge};
pub use viewport::{Viewport, WheelInput};
