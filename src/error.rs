pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while loading, compiling, or running a
/// script.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The document JSON itself could not be read.
    #[error("invalid document: {0}")]
    Document(String),

    /// Malformed markup, reported when the node is compiled.
    #[error("parse error in node '{node}' at line {line}: {message}")]
    Parse {
        node: String,
        line: usize,
        message: String,
    },

    /// A `run` title or link target that is not in the document.
    #[error("node '{0}' not found")]
    NodeNotFound(String),

    /// An operator applied to operand types it does not accept.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// An unset variable used in an operation, condition, or interpolation.
    #[error("variable '${0}' is not defined")]
    UndefinedVariable(String),

    /// `select` called with no pending prompt, out of range, or twice.
    #[error("invalid selection: {0}")]
    Selection(String),

    /// The run was advanced while an options prompt was still unresolved.
    #[error("cannot advance: an options prompt is awaiting selection")]
    PendingSelection,

    /// A command with no registered handler, under strict dispatch.
    #[error("no handler registered for command '{0}'")]
    UnknownCommand(String),

    /// A registered command handler reported a failure.
    #[error("command '{name}' failed: {message}")]
    Command { name: String, message: String },
}
