use super::{Availability, SecretItem, SecretsManager};
use crate::error::{KlaudeError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

const OP_BINARY: &str = "op";

/// 1Password through the `op` CLI
pub struct OnePassword;

impl OnePassword {
    pub fn new() -> Self {
        Self
    }

    async fn op(&self, args: &[&str]) -> Result<Vec<u8>> {
        debug!("Running op {:?}", args.first());

        let output = Command::new(OP_BINARY)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| KlaudeError::CredentialProbe(format!("Failed to execute op: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(KlaudeError::CredentialProbe(format!(
                "op {} failed with status {}: {}",
                args.first().unwrap_or(&""),
                output.status,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

impl Default for OnePassword {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretsManager for OnePassword {
    async fn probe(&self) -> Availability {
        if which::which(OP_BINARY).is_err() {
            debug!("op CLI not found in PATH");
            return Availability::NotInstalled;
        }

        match self.op(&["account", "list"]).await {
            Ok(_) => Availability::Ready,
            Err(e) => {
                debug!("op account list failed: {}", e);
                Availability::SignedOut
            }
        }
    }

    async fn list_items(&self, tag: &str) -> Result<Vec<SecretItem>> {
        let stdout = self
            .op(&["item", "list", "--tags", tag, "--format", "json"])
            .await?;
        parse_item_list(&stdout)
    }

    async fn get_item_field(&self, id: &str, labels: &[&str]) -> Result<Option<String>> {
        let fields = labels
            .iter()
            .map(|label| format!("label={}", label))
            .collect::<Vec<_>>()
            .join(",");

        let stdout = self
            .op(&["item", "get", id, "--fields", fields.as_str(), "--format", "json"])
            .await?;
        parse_field_values(&stdout)
    }

    async fn get_document(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let stdout = self.op(&["document", "get", id]).await?;
        if stdout.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(stdout))
    }
}

/// Parse `op item list --format json`
fn parse_item_list(stdout: &[u8]) -> Result<Vec<SecretItem>> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(stdout)?)
}

/// Parse `op item get --fields ... --format json`.
///
/// `op` prints a single object when one field matched and an array when
/// several did; fields are taken in output order.
fn parse_field_values(stdout: &[u8]) -> Result<Option<String>> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let value: Value = serde_json::from_slice(stdout)?;
    let fields = match value {
        Value::Array(fields) => fields,
        other => vec![other],
    };

    Ok(fields.iter().find_map(|field| {
        field
            .get("value")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }))
}
