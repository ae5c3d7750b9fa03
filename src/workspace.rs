use crate::config::SESSION_MARKER;
use crate::error::{KlaudeError, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Version control lookup used to infer the default workspace
pub trait VersionControl: Send + Sync {
    /// Root of the repository containing `dir`, if any
    fn show_toplevel(&self, dir: &Path) -> Option<PathBuf>;
}

pub struct Git;

impl VersionControl for Git {
    fn show_toplevel(&self, dir: &Path) -> Option<PathBuf> {
        let output = std::process::Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(["rev-parse", "--show-toplevel"])
            .output();

        match output {
            Ok(output) if output.status.success() => {
                let git_root = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !git_root.is_empty() {
                    let path = PathBuf::from(git_root);
                    if path.exists() {
                        info!("Found git root: {}", path.display());
                        return Some(path);
                    }
                }
            }
            _ => {
                // Not a git repository or git command failed
            }
        }

        None
    }
}

/// Pick the workspace: explicit argument, else repository root, else `cwd`
pub fn resolve_workspace(
    explicit: Option<PathBuf>,
    cwd: &Path,
    vcs: &dyn VersionControl,
) -> PathBuf {
    if let Some(path) = explicit {
        debug!("Using explicit workspace {}", path.display());
        return path;
    }
    vcs.show_toplevel(cwd).unwrap_or_else(|| cwd.to_path_buf())
}

/// Fail before anything is mounted if the workspace is not a directory
pub fn ensure_workspace_exists(workspace: &Path) -> Result<()> {
    if workspace.is_dir() {
        Ok(())
    } else {
        Err(KlaudeError::WorkspaceNotFound(workspace.display().to_string()))
    }
}

/// Directory name used for the banner and the container name
pub fn project_name(workspace: &Path) -> String {
    let abs_path = workspace
        .canonicalize()
        .unwrap_or_else(|_| workspace.to_path_buf());
    abs_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("workspace")
        .to_string()
}

/// Content of the marker left by the previous session, if any
pub fn previous_session(workspace: &Path) -> Option<String> {
    std::fs::read_to_string(workspace.join(SESSION_MARKER))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Record the session start time at the workspace root.
///
/// The marker is informational, so failures are logged and ignored.
pub fn mark_session(workspace: &Path, now: DateTime<Local>) {
    let path = workspace.join(SESSION_MARKER);
    let line = format!("{}\n", now.format("%Y-%m-%d %H:%M"));
    if let Err(e) = std::fs::write(&path, line) {
        warn!("Failed to write session marker {}: {}", path.display(), e);
    }
}
