//! Keyboard shortcut mapping.
//!
//! Maps key + modifier combos to semantic `ShortcutAction`s. Executing them
//! is [`EditorContext::dispatch`](crate::EditorContext::dispatch)'s job,
//! except for [`ShortcutAction::ToggleFullscreen`] which only the host page
//! can honor.

use crate::context::ToolKind;

/// Actions that keyboard shortcuts can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    // ── Tools ──
    Tool(ToolKind),
    /// Flip between world and local space.
    ToggleSpace,

    // ── Edit ──
    Undo,
    Redo,
    SelectChildren,
    SelectParents,

    // ── View ──
    ToggleFullscreen,
}

/// Resolves key events into shortcut actions.
///
/// `ctrl` and `meta` are interchangeable so ⌘ on macOS and Ctrl elsewhere
/// both work.
pub struct ShortcutMap;

impl ShortcutMap {
    /// Resolve a key event to an action.
    ///
    /// `key` is the `KeyboardEvent.key` value (e.g. `"z"`, `"Enter"`).
    /// Returns `None` if the key combo has no binding.
    pub fn resolve(key: &str, ctrl: bool, shift: bool, alt: bool, meta: bool) -> Option<ShortcutAction> {
        let cmd = ctrl || meta;

        // Undo/redo only care about the command modifier.
        if cmd {
            return match key {
                "z" | "Z" if shift => Some(ShortcutAction::Redo),
                "z" | "Z" => Some(ShortcutAction::Undo),
                _ => None,
            };
        }

        // Enter ignores modifiers other than shift.
        if key == "Enter" {
            return Some(if shift {
                ShortcutAction::SelectParents
            } else {
                ShortcutAction::SelectChildren
            });
        }

        if alt {
            return None;
        }

        if shift {
            return match key {
                "f" | "F" => Some(ShortcutAction::ToggleFullscreen),
                _ => None,
            };
        }

        match key {
            "g" => Some(ShortcutAction::ToggleSpace),
            "a" => Some(ShortcutAction::Tool(ToolKind::Select)),
            "w" => Some(ShortcutAction::Tool(ToolKind::Move)),
            "r" => Some(ShortcutAction::Tool(ToolKind::Rotate)),
            "t" => Some(ShortcutAction::Tool(ToolKind::Scale)),
            _ => None,
        }
    }
}
