use thiserror::Error;

#[derive(Error, Debug)]
pub enum KlaudeError {
    #[error("Container runtime unavailable: {0}")]
    EnvironmentUnavailable(String),

    #[error("Image unavailable: {0}")]
    ImageUnavailable(String),

    #[error("Credential probe failed: {0}")]
    CredentialProbe(String),

    #[error("Sandbox launch failed: {0}")]
    SandboxLaunch(String),

    #[error("Wrapped tool exited with status {0}")]
    ToolExit(i32),

    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("Interrupted by signal")]
    Interrupted,

    #[error("Invalid session transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KlaudeError {
    /// Process exit status to report for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ToolExit(code) => *code,
            Self::Interrupted => 130,
            // docker's own convention for "the run spec was rejected"
            Self::SandboxLaunch(_) => 125,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, KlaudeError>;
