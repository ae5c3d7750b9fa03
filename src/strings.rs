/// User-facing strings for klaude
///
/// Status lines printed around a session. Templates take one argument through
/// [`format_string`].
/// ANSI colors
pub const GREEN: &str = "\x1b[0;32m";
pub const YELLOW: &str = "\x1b[1;33m";
pub const BLUE: &str = "\x1b[0;34m";
pub const RED: &str = "\x1b[0;31m";
pub const RESET: &str = "\x1b[0m";

/// Preconditions
pub const DOCKER_NOT_RUNNING: &str = "❌ Docker is not running. Please start Docker Desktop first.";
pub const PULLING_IMAGE: &str = "📦 Pulling latest Klaude image from GitHub Container Registry...";
pub const PULL_SUCCEEDED: &str = "✅ Successfully pulled latest image";
pub const PULL_FAILED_CHECKING_LOCAL: &str = "⚠️  Could not pull from GHCR, checking for local image...";
pub const USING_LOCAL_IMAGE: &str = "ℹ️  Using existing local image";
pub const NO_LOCAL_IMAGE: &str =
    "❌ No local image found. Please check your internet connection or build locally.";
pub const BUILD_LOCALLY_HINT: &str = "To build locally, run: docker build -t {}";

/// Credentials
pub const SECRETS_DISABLED: &str = "⚠️  1Password integration disabled (KLAUDE_NO_1PASSWORD=true)";
pub const SECRETS_SIGNED_OUT: &str =
    "ℹ️  1Password CLI found but not signed in (run 'op signin' first)";
pub const NO_TAGGED_ITEMS: &str = "ℹ️  No 1Password items tagged with '{}' found";
pub const TAG_ITEMS_HINT: &str =
    "    Tag your GitHub token and/or kubeconfig items with '{}' to use them";
pub const NO_MATCHING_CREDENTIALS: &str =
    "ℹ️  No GitHub token or kubectl config found in items tagged '{}'";
pub const FOUND_GITHUB_TOKEN: &str = "  ✓ Found GitHub token";
pub const FOUND_KUBECONFIG: &str = "  ✓ Found kubectl config";
pub const SAVED_AUTH_FOUND: &str = "🔑 Found saved Klaude authentication";
pub const SAVED_AUTH_MISSING: &str = "🔑 No saved auth found - will need to login once";

/// Session banner
pub const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";
pub const BANNER_TITLE: &str = "🚀 Klaude YOLO Mode (Containerized)";
pub const BANNER_PROJECT: &str = "📁 Project: {}";
pub const BANNER_CONTAINER: &str = "🔧 Container: {}";
pub const PREVIOUS_SESSION: &str = "📚 Previous session: {}";
pub const STARTING_CONTAINER: &str = "Starting container...";
pub const SESSION_ENDED: &str = "✨ Session ended. Project intact at: {}";
pub const SESSION_INTERRUPTED: &str = "⚠️  Session interrupted, temporary credentials removed";

/// Maintenance commands
pub const UPDATING_IMAGE: &str = "🔄 Updating Klaude Docker image...";
pub const UPDATE_FAILED: &str = "❌ Failed to pull latest image from GHCR";
pub const UPDATED_IMAGE: &str = "✅ Updated to latest Klaude image!";
pub const NUKING: &str = "☢️  Nuking all Klaude containers and images...";
pub const NUKED: &str = "✨ All Klaude containers and images cleared!";
pub const RESET_CONFIRM: &str = "Delete saved Klaude login at {}? [y/N] ";
pub const RESET_DONE: &str = "🗑️  Removed saved Klaude login at {}";
pub const RESET_NOTHING: &str = "ℹ️  No saved Klaude login at {}";
pub const ABORTED: &str = "Aborted";

/// Helper function for single argument formatting
pub fn format_string(template: &str, arg: &dyn std::fmt::Display) -> String {
    template.replace("{}", &arg.to_string())
}

/// Wrap a line in an ANSI color
pub fn paint(color: &str, line: &str) -> String {
    format!("{}{}{}", color, line, RESET)
}
