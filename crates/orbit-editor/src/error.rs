use orbit_scene::NodeId;
use std::fmt;

/// Failure reported by a command's execute or undo action.
///
/// The history does not catch or roll back these: the error is returned to
/// whoever called `push`, `undo` or `redo`, and the command stays on the
/// stack it was on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// A node the command operates on is no longer in the scene.
    TargetNotFound(NodeId),
    /// The target is in a state the command cannot handle.
    InvalidState(String),
    /// A caller-defined failure.
    Custom(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetNotFound(id) => write!(f, "target not found: {id}"),
            Self::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            Self::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CommandError {}

pub type CommandResult<T = ()> = Result<T, CommandError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            CommandError::TargetNotFound(NodeId::intern("lamp")).to_string(),
            "target not found: lamp"
        );
        assert_eq!(
            CommandError::InvalidState("locked".into()).to_string(),
            "invalid state: locked"
        );
        assert_eq!(CommandError::Custom("boom".into()).to_string(), "boom");
    }
}
