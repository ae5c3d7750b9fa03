//! Owner-only temporary files for secrets fetched at runtime.
//!
//! The file is deleted when the [`EphemeralSecret`] is dropped, so holding it
//! in the session scope ties its lifetime to the session. Signals are turned
//! into ordinary returns by the session, which lets the drop run on
//! interruption too.

use crate::error::{KlaudeError, Result};
use std::io::Write;
use std::path::Path;
use tempfile::TempPath;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct EphemeralSecret {
    path: TempPath,
}

impl EphemeralSecret {
    /// Write `contents` to a new uniquely named file in `dir`
    pub fn create_in(dir: &Path, prefix: &str, contents: &[u8]) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .rand_bytes(6)
            .tempfile_in(dir)
            .map_err(|e| {
                KlaudeError::Config(format!(
                    "Failed to create temporary secret file in {}: {}",
                    dir.display(),
                    e
                ))
            })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600))?;
        }

        file.write_all(contents)?;
        file.as_file().sync_all()?;

        let path = file.into_temp_path();
        debug!("Staged ephemeral secret at {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now, reporting failures instead of ignoring them
    pub fn close(self) -> Result<()> {
        let shown = self.path.display().to_string();
        self.path.close().map_err(|e| {
            warn!("Failed to remove ephemeral secret {}: {}", shown, e);
            KlaudeError::Io(e)
        })
    }
}
