use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;

/// An entry returned by a tag listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SecretItem {
    pub id: String,
    pub title: String,
}

/// Outcome of probing for the secrets manager CLI and a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Ready,
    NotInstalled,
    SignedOut,
}

#[async_trait]
pub trait SecretsManager: Send + Sync {
    /// Check that the CLI exists and has an authenticated session
    async fn probe(&self) -> Availability;

    /// List items carrying `tag`, in the order the manager returns them
    async fn list_items(&self, tag: &str) -> Result<Vec<SecretItem>>;

    /// First non-empty value among the fields labelled `labels`
    async fn get_item_field(&self, id: &str, labels: &[&str]) -> Result<Option<String>>;

    /// Raw bytes of a document item
    async fn get_document(&self, id: &str) -> Result<Option<Vec<u8>>>;
}

pub mod onepassword;
