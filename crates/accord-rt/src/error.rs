use thiserror::Error;

/// Errors raised while executing a translated program.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("`{operand}` is not present on the device")]
    NotPresent { operand: String },

    /// The request straddles storage established by an enclosing mapping.
    #[error(
        "`{operand}` requests [{start}:{len}] but the device holds [{established_start}:{established_len}]"
    )]
    StorageAssociation {
        operand: String,
        start: i64,
        len: i64,
        established_start: i64,
        established_len: i64,
    },

    #[error("Unknown variable `{0}`")]
    UnknownVariable(String),

    #[error("No kernel bound to `{0}`")]
    UnknownKernel(String),

    #[error("`{name}[{index}]` has no backing storage")]
    MissingStorage { name: String, index: i64 },

    #[error("Cannot evaluate `{0}` at run time")]
    Unsupported(String),

    #[error("An asynchronous task panicked")]
    TaskPanicked,

    #[error("Kernel failed: {0}")]
    Kernel(String),
}
