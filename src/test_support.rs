//! In-memory collaborators for unit tests

use crate::backend::ContainerRuntime;
use crate::config::SandboxSpec;
use crate::error::{KlaudeError, Result};
use crate::secrets::{Availability, SecretItem, SecretsManager};
use crate::workspace::VersionControl;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

enum FakeEntry {
    Field { label: String, value: String },
    Document(Vec<u8>),
}

pub struct FakeSecrets {
    availability: Availability,
    items: Vec<(SecretItem, FakeEntry)>,
    fail_list: bool,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeSecrets {
    fn with_availability(availability: Availability) -> Self {
        Self {
            availability,
            items: Vec::new(),
            fail_list: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn ready() -> Self {
        Self::with_availability(Availability::Ready)
    }

    pub fn signed_out() -> Self {
        Self::with_availability(Availability::SignedOut)
    }

    pub fn not_installed() -> Self {
        Self::with_availability(Availability::NotInstalled)
    }

    pub fn with_field(mut self, id: &str, title: &str, label: &str, value: &str) -> Self {
        self.items.push((
            SecretItem {
                id: id.to_string(),
                title: title.to_string(),
            },
            FakeEntry::Field {
                label: label.to_string(),
                value: value.to_string(),
            },
        ));
        self
    }

    pub fn with_document(mut self, id: &str, title: &str, bytes: &[u8]) -> Self {
        self.items.push((
            SecretItem {
                id: id.to_string(),
                title: title.to_string(),
            },
            FakeEntry::Document(bytes.to_vec()),
        ));
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn entry(&self, id: &str) -> Option<&FakeEntry> {
        self.items
            .iter()
            .find(|(item, _)| item.id == id)
            .map(|(_, entry)| entry)
    }
}

#[async_trait]
impl SecretsManager for FakeSecrets {
    async fn probe(&self) -> Availability {
        self.record("probe");
        self.availability
    }

    async fn list_items(&self, _tag: &str) -> Result<Vec<SecretItem>> {
        self.record("list_items");
        if self.fail_list {
            return Err(KlaudeError::CredentialProbe("listing failed".to_string()));
        }
        Ok(self.items.iter().map(|(item, _)| item.clone()).collect())
    }

    async fn get_item_field(&self, id: &str, labels: &[&str]) -> Result<Option<String>> {
        self.record("get_item_field");
        match self.entry(id) {
            Some(FakeEntry::Field { label, value }) if labels.contains(&label.as_str()) => {
                Ok(Some(value.clone()))
            }
            Some(FakeEntry::Field { .. }) => Ok(None),
            _ => Err(KlaudeError::CredentialProbe(format!("no fields on {}", id))),
        }
    }

    async fn get_document(&self, id: &str) -> Result<Option<Vec<u8>>> {
        self.record("get_document");
        match self.entry(id) {
            Some(FakeEntry::Document(bytes)) if !bytes.is_empty() => Ok(Some(bytes.clone())),
            Some(FakeEntry::Document(_)) => Ok(None),
            _ => Err(KlaudeError::CredentialProbe(format!("{} is not a document", id))),
        }
    }
}

/// What the fake runtime saw when `run` was called
#[derive(Debug, Clone)]
pub struct LaunchRecord {
    pub spec: SandboxSpec,
    /// Mount sources that existed on disk at launch time
    pub existing_sources: Vec<PathBuf>,
}

pub struct FakeRuntime {
    daemon_up: bool,
    pull_ok: bool,
    exit_code: i32,
    hang: bool,
    images: Mutex<HashMap<String, bool>>,
    calls: Mutex<Vec<String>>,
    launch: Mutex<Option<LaunchRecord>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            daemon_up: true,
            pull_ok: true,
            exit_code: 0,
            hang: false,
            images: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            launch: Mutex::new(None),
        }
    }

    pub fn daemon_down(mut self) -> Self {
        self.daemon_up = false;
        self
    }

    pub fn pull_fails(mut self) -> Self {
        self.pull_ok = false;
        self
    }

    pub fn with_local_image(self, image: &str) -> Self {
        self.images.lock().unwrap().insert(image.to_string(), true);
        self
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// `run` never returns, like an interactive session left open
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn launch(&self) -> Option<LaunchRecord> {
        self.launch.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ping(&self) -> Result<()> {
        self.record("ping");
        if self.daemon_up {
            Ok(())
        } else {
            Err(KlaudeError::EnvironmentUnavailable(
                "Cannot connect to the Docker daemon".to_string(),
            ))
        }
    }

    async fn pull(&self, image: &str) -> Result<()> {
        self.record(format!("pull {}", image));
        if !self.pull_ok {
            return Err(KlaudeError::ImageUnavailable(format!("pull {} failed", image)));
        }
        self.images.lock().unwrap().insert(image.to_string(), true);
        Ok(())
    }

    async fn tag(&self, source: &str, target: &str) -> Result<()> {
        self.record(format!("tag {} {}", source, target));
        self.images.lock().unwrap().insert(target.to_string(), true);
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        self.record(format!("image_exists {}", image));
        Ok(self.images.lock().unwrap().get(image).copied().unwrap_or(false))
    }

    async fn remove_image(&self, image: &str) -> Result<()> {
        self.record(format!("remove_image {}", image));
        match self.images.lock().unwrap().remove(image) {
            Some(_) => Ok(()),
            None => Err(KlaudeError::ExecutionFailed(format!("No such image: {}", image))),
        }
    }

    async fn remove_containers(&self, name_filter: &str) -> Result<usize> {
        self.record(format!("remove_containers {}", name_filter));
        Ok(0)
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        self.record(format!("remove_container {}", name));
        Ok(())
    }

    async fn run(&self, spec: &SandboxSpec) -> Result<i32> {
        self.record("run");
        let existing_sources = spec
            .bind_mounts
            .iter()
            .filter(|m| m.source.exists())
            .map(|m| m.source.clone())
            .collect();
        *self.launch.lock().unwrap() = Some(LaunchRecord {
            spec: spec.clone(),
            existing_sources,
        });

        if self.hang {
            std::future::pending::<()>().await;
        }
        Ok(self.exit_code)
    }
}

pub struct FakeVcs {
    toplevel: Option<PathBuf>,
}

impl FakeVcs {
    pub fn repo(root: &Path) -> Self {
        Self {
            toplevel: Some(root.to_path_buf()),
        }
    }

    pub fn none() -> Self {
        Self { toplevel: None }
    }
}

impl VersionControl for FakeVcs {
    fn show_toplevel(&self, _dir: &Path) -> Option<PathBuf> {
        self.toplevel.clone()
    }
}
