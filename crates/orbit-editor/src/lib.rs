//! Editor state core for the Orbit scene editor.
//!
//! - [`history`]: bounded undo/redo stack of closure-based commands
//! - [`metadata`]: per-node side-table of editor-only attributes
//! - [`selection`]: observable selection whose every change is a command
//! - [`transform_action`]: before/after snapshot batching for drags
//! - [`hierarchy`]: depth-first view-model of the scene tree
//! - [`actions`] / [`shortcuts`]: user gestures turned into commands
//! - [`context`]: wires the pieces together around a shared scene
//!
//! Everything here is single-threaded: shared state lives behind `Rc` and
//! `RefCell`, and every notification is delivered synchronously after the
//! mutation it reports has been fully applied.

pub mod actions;
pub mod context;
pub mod error;
pub mod hierarchy;
pub mod history;
pub mod metadata;
pub mod selection;
pub mod shortcuts;
pub mod signal;
pub mod transform_action;

pub use actions::ClickMode;
pub use context::{EditorConfig, EditorContext, EditorPrefs, SceneHandle, SpaceMode, ToolKind};
pub use error::{CommandError, CommandResult};
pub use hierarchy::{HierarchyTree, LinkGuide, NodeInfo, SelectionBlocks};
pub use history::{CommandHistory, DEFAULT_CAPACITY, HistoryConfig};
pub use metadata::{Metadata, MetadataPatch, MetadataStore, Scope, Visibility};
pub use selection::{CommandHooks, SelectionSet};
pub use shortcuts::{ShortcutAction, ShortcutMap};
pub use signal::{Signal, Subscription};
pub use transform_action::{Axis, TransformAction, TransformField, TransformSnapshot};
