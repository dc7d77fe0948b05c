use thiserror::Error;

/// Main error type for hagraph
#[derive(Error, Debug)]
pub enum HagraphError {
    /// Controller answered a REST request with a non-2xx status
    #[error("Controller API error {status}: {body}")]
    UpstreamHttp { status: u16, body: String },

    /// Controller could not be reached (connect failure or timeout)
    #[error("Failed to connect to controller: {0}")]
    UpstreamUnreachable(String),

    /// WebSocket handshake rejected the access token
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// WebSocket connection failed or closed mid-operation
    #[error("Transport error: {0}")]
    Transport(String),

    /// Controller reported `success: false` for a WebSocket command
    #[error("Command {command_type} failed: {message}")]
    Command { command_type: String, message: String },

    /// Every automation tier failed
    #[error("Automation fetch error: {0}")]
    AutomationFetch(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed upstream payloads
    #[error("Parse error: {0}")]
    Parse(String),

    /// Layout task panicked or was cancelled
    #[error("Layout task failed: {0}")]
    Layout(String),

    /// File system / socket I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HagraphError {
    /// HTTP status the front door answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            HagraphError::UpstreamHttp { status, .. } => *status,
            HagraphError::UpstreamUnreachable(_) => 503,
            HagraphError::Layout(_) => 500,
            _ => 502,
        }
    }
}

/// Convenient Result type using HagraphError
pub type Result<T> = std::result::Result<T, HagraphError>;
