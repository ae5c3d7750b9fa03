use crate::config::CONTAINER_PREFIX;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "klaude", version, args_conflicts_with_subcommands = true)]
#[command(
    about = "Claude Code in Docker - YOLO mode containerized AI coding assistant",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Project directory to mount (default: git root, else current directory)
    pub path: Option<PathBuf>,

    /// Skip the 1Password lookup (same as KLAUDE_NO_1PASSWORD=true)
    #[arg(long = "no-1password", global = true)]
    pub no_1password: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pull the latest klaude image and retag it locally
    Update,

    /// Remove all klaude containers and the local image
    Nuke,

    /// Delete the saved klaude login
    ResetCredentials {
        /// Delete without confirmation
        #[arg(short, long)]
        force: bool,
    },
}

impl Commands {
    /// Container name for a session: sanitized workspace name plus the process id
    pub fn generate_session_name(workspace: &Path, pid: u32) -> String {
        let dir_name = crate::workspace::project_name(workspace);

        // Sanitize directory name (replace non-alphanumeric with hyphen)
        let sanitized_name: String = dir_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();

        format!("{}-{}-{}", CONTAINER_PREFIX, sanitized_name, pid)
    }
}
