use crate::config::SandboxSpec;
use crate::error::{KlaudeError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check that the runtime daemon answers
    async fn ping(&self) -> Result<()>;

    /// Pull an image by reference
    async fn pull(&self, image: &str) -> Result<()>;

    /// Tag `source` as `target`
    async fn tag(&self, source: &str, target: &str) -> Result<()>;

    /// Check whether an image is present in the local image list
    async fn image_exists(&self, image: &str) -> Result<bool>;

    /// Remove a local image
    async fn remove_image(&self, image: &str) -> Result<()>;

    /// Force-remove every container whose name matches `name_filter`
    async fn remove_containers(&self, name_filter: &str) -> Result<usize>;

    /// Force-remove the container named `name`; a missing container is not an error
    async fn remove_container(&self, name: &str) -> Result<()>;

    /// Run the sandbox in the foreground and return the tool's exit status
    async fn run(&self, spec: &SandboxSpec) -> Result<i32>;
}

pub mod docker;

/// Helper to run a command and capture output
async fn run_command(cmd: &mut Command) -> Result<String> {
    debug!("Running command: {:?}", cmd);

    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| KlaudeError::ExecutionFailed(format!("Failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(KlaudeError::ExecutionFailed(format!(
            "Command failed with status {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
