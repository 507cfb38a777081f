use std::fmt;

/// Result type for engine setup and I/O plumbing.
pub type EngineResult<T = ()> = Result<T, EngineError>;

/// Error raised outside the command path: opening ports, spawning threads,
/// reading configuration. Command handling itself never fails.
#[derive(Debug, Clone)]
pub struct EngineError(pub String);

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for EngineError {}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError(e.to_string())
    }
}

impl From<String> for EngineError {
    fn from(s: String) -> Self {
        EngineError(s)
    }
}
