use crate::config::{BindMount, SandboxSpec};
use std::path::PathBuf;

/// `$0` for the entry script
pub const ENTRY_SCRIPT_NAME: &str = "klaude-entry";

/// Runs as root inside the sandbox, then drops to the unprivileged user.
///
/// Positional parameters: `$1` is the user, the rest is the tool argv. The
/// script contains no interpolated values; forwarded secrets are only read
/// from the environment.
pub const ENTRY_SCRIPT: &str = r#"
user="$1"
shift

echo "📁 Workspace: $PWD"

if [ -f "$CLAUDE_CONFIG_DIR/.credentials.json" ]; then
    echo '🔑 Using saved Klaude authentication'
else
    echo '🔑 First run - you will need to login once'
fi

mkdir -p "$HOME/.config" "$CLAUDE_CONFIG_DIR" "$HOME/.kube"
chown -R "$user:$user" "$HOME/.config" 2>/dev/null || true
chmod 755 "$CLAUDE_CONFIG_DIR"

if [ -f "$HOME/.kube/config" ]; then
    chown "$user:$user" "$HOME/.kube"
    chmod 600 "$HOME/.kube/config" 2>/dev/null || true
    echo '☸️  Kubectl configured from 1Password'
else
    echo '☸️  No kubectl config'
fi

if [ -n "${GITHUB_TOKEN:-}" ]; then
    echo '🔑 GitHub token available from 1Password'
else
    echo '🔑 No GitHub token'
fi

find "$CLAUDE_CONFIG_DIR" -type f -exec chmod 644 {} \; 2>/dev/null || true

echo '✅ Container ready! Starting Claude Code in YOLO mode...'
echo '    (Authentication will persist after first login)'
echo ''

exec su -c 'exec "$0" "$@"' -- "$user" "$@"
"#;

/// Builder for sandbox launch configurations
#[derive(Clone)]
pub struct SandboxBuilder {
    spec: SandboxSpec,
}

impl SandboxBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            spec: SandboxSpec {
                name: name.into(),
                ..Default::default()
            },
        }
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.spec.image = image.into();
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.spec.hostname = hostname.into();
        self
    }

    pub fn bind_mount(
        mut self,
        source: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
        readonly: bool,
    ) -> Self {
        self.spec.bind_mounts.push(BindMount {
            source: source.into(),
            target: target.into(),
            readonly,
        });
        self
    }

    /// Set an environment variable, replacing any earlier value for `key`
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.spec.environment.retain(|(k, _)| *k != key);
        self.spec.environment.push((key, value.into()));
        self
    }

    /// Set an environment variable whose value is only handed to the
    /// runtime through its own environment
    pub fn secret_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.spec.environment.retain(|(k, _)| *k != key);
        self.spec.secret_environment.set(key, value.into());
        self
    }

    pub fn workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.spec.workdir = workdir.into();
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.spec.user = user.into();
        self
    }

    pub fn tool_command(mut self, argv: Vec<String>) -> Self {
        self.spec.tool_command = argv;
        self
    }

    pub fn build(self) -> SandboxSpec {
        self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_builder() {
        let spec = SandboxBuilder::new("klaude-test-1")
            .image("alpine:latest")
            .env("TEST", "value")
            .bind_mount("/src", "/workspace", false)
            .bind_mount("/tmp/kube", "/home/claude/.kube/config", true)
            .build();

        assert_eq!(spec.name, "klaude-test-1");
        assert_eq!(spec.image, "alpine:latest");
        assert_eq!(spec.env("TEST"), Some("value"));
        assert_eq!(spec.bind_mounts.len(), 2);
        assert!(spec.mount_for("/home/claude/.kube/config").unwrap().readonly);
        assert!(!spec.mount_for("/workspace").unwrap().readonly);
    }

    #[test]
    fn test_entry_script_drops_privileges_last() {
        let last = ENTRY_SCRIPT.trim_end().lines().last().unwrap();
        assert_eq!(last, r#"exec su -c 'exec "$0" "$@"' -- "$user" "$@""#);
        assert!(ENTRY_SCRIPT.contains("$CLAUDE_CONFIG_DIR"));
        assert!(!ENTRY_SCRIPT.contains("ghp_"));
        assert!(!ENTRY_SCRIPT.contains("GITHUB_TOKEN="));
    }

    #[test]
    fn test_secret_env_is_kept_apart() {
        let spec = SandboxBuilder::new("n")
            .env("GITHUB_TOKEN", "plain")
            .secret_env("GITHUB_TOKEN", "ghp_x")
            .build();

        assert_eq!(spec.env("GITHUB_TOKEN"), None);
        assert_eq!(spec.secret_env("GITHUB_TOKEN"), Some("ghp_x"));
    }

    #[test]
    fn test_env_replaces_existing_key() {
        let spec = SandboxBuilder::new("n")
            .env("HOME", "/root")
            .env("HOME", "/home/claude")
            .build();

        assert_eq!(spec.environment.len(), 1);
        assert_eq!(spec.env("HOME"), Some("/home/claude"));
    }
}
