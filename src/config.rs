use crate::error::{KlaudeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Image published by the klaude project
pub const REMOTE_IMAGE: &str = "ghcr.io/alfredtm/klaude:latest";

/// Local tag the remote image is stored under
pub const LOCAL_IMAGE: &str = "klaude-image";

/// Repository used for the local build remediation hint
pub const IMAGE_SOURCE_REPO: &str = "https://github.com/alfredtm/klaude.git";

/// Secrets manager tag marking items klaude may forward
pub const SECRETS_TAG: &str = "klaude";

/// Environment toggle that disables the secrets manager lookup
pub const NO_1PASSWORD_ENV: &str = "KLAUDE_NO_1PASSWORD";

/// Container name prefix, also used to find leftover containers
pub const CONTAINER_PREFIX: &str = "klaude";

/// Paths and identity inside the sandbox
pub const SANDBOX_HOSTNAME: &str = "klaude";
pub const SANDBOX_USER: &str = "claude";
pub const SANDBOX_HOME: &str = "/home/claude";
pub const SANDBOX_WORKSPACE: &str = "/workspace";
pub const SANDBOX_CONFIG_DIR: &str = "/home/claude/.config/claude";
pub const SANDBOX_KUBECONFIG: &str = "/home/claude/.kube/config";
pub const SANDBOX_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Wrapped tool and the flag that grants it full access inside the sandbox
pub const TOOL_COMMAND: &str = "claude";
pub const TOOL_FULL_ACCESS_FLAG: &str = "--dangerously-skip-permissions";

/// File inside the credential directory that marks a saved login
pub const SAVED_AUTH_FILE: &str = ".credentials.json";

/// Marker written at the workspace root on every session start
pub const SESSION_MARKER: &str = ".klaude-session";

/// Launch configuration for one sandboxed session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxSpec {
    /// Container name (unique per invocation)
    pub name: String,

    /// Hostname seen inside the container
    pub hostname: String,

    /// Image to run
    pub image: String,

    /// Run with extended privileges
    pub privileged: bool,

    /// Attach stdin and a TTY
    pub interactive: bool,

    /// Remove the container once it exits
    pub auto_remove: bool,

    /// Directories and files to bind mount into the sandbox
    pub bind_mounts: Vec<BindMount>,

    /// Working directory inside the sandbox
    pub workdir: PathBuf,

    /// Environment variables to set
    pub environment: Vec<(String, String)>,

    /// Environment variables whose values must stay out of argv and logs
    #[serde(skip)]
    pub secret_environment: SecretEnv,

    /// Unprivileged identity the wrapped tool runs as
    pub user: String,

    /// Tool argv, executed as `user` once the entry script is done
    pub tool_command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindMount {
    pub source: PathBuf,
    pub target: PathBuf,
    pub readonly: bool,
}

/// Secret environment entries; `Debug` prints names only
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretEnv(Vec<(String, String)>);

impl SecretEnv {
    /// Set `key`, replacing any earlier value
    pub fn set(&mut self, key: String, value: String) {
        self.0.retain(|(k, _)| *k != key);
        self.0.push((key, value));
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

impl fmt::Debug for SecretEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}

#[cfg(test)]
impl SandboxSpec {
    /// Look up a secret environment variable set for the sandbox
    pub fn secret_env(&self, key: &str) -> Option<&str> {
        self.secret_environment.get(key)
    }

    /// Look up an environment variable set for the sandbox
    pub fn env(&self, key: &str) -> Option<&str> {
        self.environment
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Find the mount targeting `target`
    pub fn mount_for(&self, target: &str) -> Option<&BindMount> {
        self.bind_mounts
            .iter()
            .find(|m| m.target == Path::new(target))
    }
}

impl Default for SandboxSpec {
    fn default() -> Self {
        Self {
            name: String::from(CONTAINER_PREFIX),
            hostname: String::from(SANDBOX_HOSTNAME),
            image: String::from(LOCAL_IMAGE),
            privileged: true,
            interactive: true,
            auto_remove: true,
            bind_mounts: Vec::new(),
            workdir: PathBuf::from(SANDBOX_WORKSPACE),
            environment: Vec::new(),
            secret_environment: SecretEnv::default(),
            user: String::from(SANDBOX_USER),
            tool_command: vec![
                TOOL_COMMAND.to_string(),
                TOOL_FULL_ACCESS_FLAG.to_string(),
            ],
        }
    }
}

/// User settings, loaded from `~/.config/klaude/config.json` and the environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Image pulled on every session start
    pub remote_image: String,

    /// Local tag used to run the sandbox and as the offline fallback
    pub local_image: String,

    /// Persistent credential directory (defaults to ~/.config/klaude-auth)
    pub auth_dir: Option<PathBuf>,

    /// Tag used to find items in the secrets manager
    pub secrets_tag: String,

    /// Skip the secrets manager entirely
    pub disable_secrets_manager: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            remote_image: String::from(REMOTE_IMAGE),
            local_image: String::from(LOCAL_IMAGE),
            auth_dir: None,
            secrets_tag: String::from(SECRETS_TAG),
            disable_secrets_manager: false,
        }
    }
}

impl Settings {
    /// Load the config file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut settings = match config_file_path() {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        settings.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Read settings from a JSON file; a missing file yields the defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            KlaudeError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            KlaudeError::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup(NO_1PASSWORD_ENV) {
            if value.trim().eq_ignore_ascii_case("true") {
                self.disable_secrets_manager = true;
            }
        }
        if let Some(image) = lookup("KLAUDE_IMAGE").filter(|v| !v.is_empty()) {
            self.remote_image = image;
        }
        if let Some(dir) = lookup("KLAUDE_AUTH_DIR").filter(|v| !v.is_empty()) {
            self.auth_dir = Some(PathBuf::from(dir));
        }
    }

    /// Resolve the persistent credential directory
    pub fn auth_dir(&self) -> Result<PathBuf> {
        match &self.auth_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(config_base_dir()?.join("klaude-auth")),
        }
    }
}

/// XDG_CONFIG_HOME, or ~/.config
pub fn config_base_dir() -> Result<PathBuf> {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !config_home.is_empty() {
            return Ok(PathBuf::from(config_home));
        }
    }
    let home = std::env::var("HOME")
        .map_err(|_| KlaudeError::Config("HOME environment variable not set".to_string()))?;
    Ok(PathBuf::from(home).join(".config"))
}

fn config_file_path() -> Result<PathBuf> {
    Ok(config_base_dir()?.join("klaude").join("config.json"))
}
