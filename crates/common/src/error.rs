//! Error types shared across TinyTV crates.

/// Top-level error type for TinyTV operations.
///
/// Input and precondition errors are raised synchronously when a job is
/// requested; process errors surface once the encoder or prober has run.
#[derive(Debug, thiserror::Error)]
pub enum TinytvError {
    #[error("Invalid input: {message}")]
    Input { message: String },

    #[error("Precondition failed: {message}")]
    Precondition { message: String },

    #[error("Process error: {message}")]
    Process { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using TinytvError.
pub type TinytvResult<T> = Result<T, TinytvError>;

impl TinytvError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input {
            message: msg.into(),
        }
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition {
            message: msg.into(),
        }
    }

    pub fn process(msg: impl Into<String>) -> Self {
        Self::Process {
            message: msg.into(),
        }
    }

    /// Whether the error was raised before any work started (bad request or
    /// unmet precondition) rather than by a running process.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Input { .. } | Self::Precondition { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_classification() {
        assert!(TinytvError::input("empty file list").is_rejection());
        assert!(TinytvError::precondition("too large").is_rejection());
        assert!(!TinytvError::process("ffmpeg exited 1").is_rejection());
    }

    #[test]
    fn test_display_includes_message() {
        let err = TinytvError::input("Channel must be a number");
        assert_eq!(err.to_string(), "Invalid input: Channel must be a number");
    }

    #[test]
    fn test_io_and_json_convert() {
        let io: TinytvError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert!(matches!(io, TinytvError::Io(_)));
        assert!(!io.is_rejection());

        let json: TinytvError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(json, TinytvError::Json(_)));
    }
}
