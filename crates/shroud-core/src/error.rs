/// Core error type for the shroud framework.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A transform refused a function shape it cannot rewrite soundly.
    /// The function is left untouched.
    #[error("unsupported shape in `{function}`: {reason}")]
    UnsupportedShape { function: String, reason: String },

    #[error("unknown pass: {0}")]
    UnknownPass(String),

    #[error("verification failed: {0}")]
    Verify(String),

    #[error("evaluation error: {0}")]
    Eval(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
