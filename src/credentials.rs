//! Credential discovery for a session.
//!
//! Two sources feed a sandbox: the persistent credential directory on the host
//! and items tagged for klaude in the secrets manager. The secrets manager is
//! optional; every failure there degrades to fewer credentials and is reported
//! through [`CredentialResolution::notes`].

use crate::config::SAVED_AUTH_FILE;
use crate::ephemeral::EphemeralSecret;
use crate::error::Result;
use crate::secrets::{Availability, SecretItem, SecretsManager};
use crate::strings;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How a category's secret is delivered to the sandbox
#[derive(Debug, Clone, Copy)]
pub enum SecretShape {
    /// Forwarded as an environment variable. `labels` are tried in order on
    /// every matching item, then `fallback` on every matching item.
    Scalar {
        labels: &'static [&'static str],
        fallback: &'static str,
    },
    /// Staged in an owner-only temp file and mounted read-only
    Document { file_prefix: &'static str },
}

#[derive(Debug, Clone, Copy)]
pub struct CredentialCategory {
    pub name: &'static str,
    /// Case-insensitive substring matched against item titles
    pub keyword: &'static str,
    pub shape: SecretShape,
}

pub const GITHUB_TOKEN: CredentialCategory = CredentialCategory {
    name: "GitHub token",
    keyword: "github",
    shape: SecretShape::Scalar {
        labels: &["token", "pat", "personal_access_token"],
        fallback: "password",
    },
};

pub const KUBE_CONFIG: CredentialCategory = CredentialCategory {
    name: "kubectl config",
    keyword: "kube",
    shape: SecretShape::Document {
        file_prefix: "klaude-kubeconfig.",
    },
};

/// Where a session's credentials came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    None,
    LocalDirectory,
    SecretsManagerItem,
}

#[derive(Debug, Clone)]
pub struct CredentialOptions {
    /// Skip the secrets manager entirely
    pub disable_secrets_manager: bool,
    /// Tag used to list candidate items
    pub tag: String,
    /// Persistent credential directory
    pub auth_dir: PathBuf,
    /// Directory ephemeral secret files are staged in
    pub temp_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAuth {
    pub dir: PathBuf,
    pub has_saved_auth: bool,
}

/// Everything credential resolution found, threaded into sandbox assembly
#[derive(Default)]
pub struct CredentialResolution {
    pub local_auth: Option<LocalAuth>,
    pub secrets_manager_used: bool,
    pub github_token: Option<String>,
    pub kubeconfig: Option<EphemeralSecret>,
    /// Why optional credentials are missing, for the status output
    pub notes: Vec<String>,
}

impl CredentialResolution {
    pub fn sources(&self) -> Vec<CredentialSource> {
        let mut sources = Vec::new();
        if self.local_auth.as_ref().is_some_and(|a| a.has_saved_auth) {
            sources.push(CredentialSource::LocalDirectory);
        }
        if self.secrets_manager_used {
            sources.push(CredentialSource::SecretsManagerItem);
        }
        if sources.is_empty() {
            sources.push(CredentialSource::None);
        }
        sources
    }

    /// Paths of every ephemeral file staged for this session
    pub fn ephemeral_paths(&self) -> Vec<PathBuf> {
        self.kubeconfig
            .iter()
            .map(|s| s.path().to_path_buf())
            .collect()
    }
}

impl fmt::Debug for CredentialResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolution")
            .field("local_auth", &self.local_auth)
            .field("secrets_manager_used", &self.secrets_manager_used)
            .field(
                "github_token",
                &self.github_token.as_ref().map(|_| "<redacted>"),
            )
            .field("kubeconfig", &self.kubeconfig.as_ref().map(|s| s.path()))
            .field("notes", &self.notes)
            .finish()
    }
}

/// Ensure the persistent credential directory exists and look for a saved login
pub fn prepare_local_auth(dir: &Path) -> Result<LocalAuth> {
    std::fs::create_dir_all(dir)?;
    let has_saved_auth = dir.join(SAVED_AUTH_FILE).is_file();
    debug!(
        "Credential directory {} (saved auth: {})",
        dir.display(),
        has_saved_auth
    );
    Ok(LocalAuth {
        dir: dir.to_path_buf(),
        has_saved_auth,
    })
}

/// Delete the persistent credential directory; `false` if there was none
pub fn reset_local_auth(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    std::fs::remove_dir_all(dir)?;
    info!("Removed credential directory {}", dir.display());
    Ok(true)
}

/// Resolve every credential a session can use.
///
/// Never fails because of the secrets manager; only the local credential
/// directory can produce an error.
pub async fn resolve_credentials(
    opts: &CredentialOptions,
    secrets: &dyn SecretsManager,
) -> Result<CredentialResolution> {
    let mut resolution = CredentialResolution {
        local_auth: Some(prepare_local_auth(&opts.auth_dir)?),
        ..Default::default()
    };

    if opts.disable_secrets_manager {
        info!("Secrets manager disabled, skipping lookup");
        resolution.notes.push(strings::SECRETS_DISABLED.to_string());
        return Ok(resolution);
    }

    match secrets.probe().await {
        Availability::Ready => {}
        Availability::NotInstalled => {
            debug!("Secrets manager CLI not installed");
            return Ok(resolution);
        }
        Availability::SignedOut => {
            resolution.notes.push(strings::SECRETS_SIGNED_OUT.to_string());
            return Ok(resolution);
        }
    }

    let items = match secrets.list_items(&opts.tag).await {
        Ok(items) => items,
        Err(e) => {
            warn!("Listing items tagged '{}' failed: {}", opts.tag, e);
            resolution
                .notes
                .push(strings::format_string(strings::NO_TAGGED_ITEMS, &opts.tag));
            return Ok(resolution);
        }
    };

    if items.is_empty() {
        resolution
            .notes
            .push(strings::format_string(strings::NO_TAGGED_ITEMS, &opts.tag));
        resolution
            .notes
            .push(strings::format_string(strings::TAG_ITEMS_HINT, &opts.tag));
        return Ok(resolution);
    }
    debug!("{} item(s) tagged '{}'", items.len(), opts.tag);

    resolution.github_token = resolve_scalar(secrets, &items, &GITHUB_TOKEN).await;
    resolution.kubeconfig = resolve_document(secrets, &items, &KUBE_CONFIG, &opts.temp_dir).await;

    resolution.secrets_manager_used =
        resolution.github_token.is_some() || resolution.kubeconfig.is_some();
    if !resolution.secrets_manager_used {
        resolution
            .notes
            .push(strings::format_string(strings::NO_MATCHING_CREDENTIALS, &opts.tag));
    }

    Ok(resolution)
}

/// Items whose title contains the category keyword, in listing order
pub fn matching_items<'a>(
    items: &'a [SecretItem],
    category: &CredentialCategory,
) -> Vec<&'a SecretItem> {
    items
        .iter()
        .filter(|item| item.title.to_lowercase().contains(category.keyword))
        .collect()
}

async fn resolve_scalar(
    secrets: &dyn SecretsManager,
    items: &[SecretItem],
    category: &CredentialCategory,
) -> Option<String> {
    let SecretShape::Scalar { labels, fallback } = category.shape else {
        return None;
    };
    let candidates = matching_items(items, category);

    let passes: [&[&str]; 2] = [labels, &[fallback]];
    for pass in passes {
        for item in &candidates {
            match secrets.get_item_field(&item.id, pass).await {
                Ok(Some(value)) => {
                    info!("Found {} in '{}'", category.name, item.title);
                    return Some(value);
                }
                Ok(None) => {}
                Err(e) => debug!("No {:?} field on '{}': {}", pass, item.title, e),
            }
        }
    }
    None
}

async fn resolve_document(
    secrets: &dyn SecretsManager,
    items: &[SecretItem],
    category: &CredentialCategory,
    temp_dir: &Path,
) -> Option<EphemeralSecret> {
    let SecretShape::Document { file_prefix } = category.shape else {
        return None;
    };

    for item in matching_items(items, category) {
        let bytes = match secrets.get_document(&item.id).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => continue,
            Err(e) => {
                debug!("No document on '{}': {}", item.title, e);
                continue;
            }
        };

        info!("Found {} in '{}'", category.name, item.title);
        // First non-empty document wins even if staging it fails
        return match EphemeralSecret::create_in(temp_dir, file_prefix, &bytes) {
            Ok(secret) => Some(secret),
            Err(e) => {
                warn!("Could not stage {}: {}", category.name, e);
                None
            }
        };
    }
    None
}
