/// A specialized `Result` type for model and learner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by model construction and lookups.
///
/// Missing `Q`/`N` table entries are not errors; they read as the default
/// value at the call site.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The world description is malformed or inconsistent. Construction
    /// aborts; no partially built model is handed out.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// A state name was used that the model does not contain.
    #[error("unknown state: {0}")]
    UnknownState(String),

    /// An action name was used that the model does not contain.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// Serializing a stats dump failed.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
