use crate::backend::ContainerRuntime;
use crate::config::{CONTAINER_PREFIX, IMAGE_SOURCE_REPO};
use crate::error::{KlaudeError, Result};
use crate::strings::{self, paint, BLUE, GREEN, RED, YELLOW};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

fn pull_spinner(image: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb.set_message(format!("Pulling {}...", image));
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Make `local` runnable: pull `remote` and retag it, falling back to a
/// cached `local` image when the pull fails.
pub async fn ensure_image(
    runtime: &dyn ContainerRuntime,
    remote: &str,
    local: &str,
    verbose: bool,
) -> Result<()> {
    println!("{}", paint(YELLOW, strings::PULLING_IMAGE));

    let spinner = (!verbose).then(|| pull_spinner(remote));
    let pulled = runtime.pull(remote).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    match pulled {
        Ok(()) => {
            println!("{}", paint(GREEN, strings::PULL_SUCCEEDED));
            if let Err(e) = runtime.tag(remote, local).await {
                warn!("Failed to tag {} as {}: {}", remote, local, e);
            }
            return Ok(());
        }
        Err(e) => {
            debug!("Pull failed: {}", e);
            println!("{}", paint(YELLOW, strings::PULL_FAILED_CHECKING_LOCAL));
        }
    }

    if !runtime.image_exists(local).await? {
        let build_hint = format!("{} {}", local, IMAGE_SOURCE_REPO);
        println!("{}", paint(RED, strings::NO_LOCAL_IMAGE));
        println!(
            "{}",
            paint(YELLOW, &strings::format_string(strings::BUILD_LOCALLY_HINT, &build_hint))
        );
        return Err(KlaudeError::ImageUnavailable(format!(
            "could not pull {} and no local {} image exists; build it with: docker build -t {}",
            remote, local, build_hint
        )));
    }

    println!("{}", paint(BLUE, strings::USING_LOCAL_IMAGE));
    Ok(())
}

/// Replace the local image with a fresh pull
pub async fn update_image(runtime: &dyn ContainerRuntime, remote: &str, local: &str) -> Result<()> {
    println!("{}", strings::UPDATING_IMAGE);

    if let Err(e) = runtime.remove_image(local).await {
        debug!("Nothing to remove: {}", e);
    }

    if let Err(e) = runtime.pull(remote).await {
        println!("{}", paint(RED, strings::UPDATE_FAILED));
        return Err(e);
    }
    runtime.tag(remote, local).await?;

    println!("{}", paint(GREEN, strings::UPDATED_IMAGE));
    Ok(())
}

/// Remove every klaude container and the local image, ignoring failures
pub async fn nuke(runtime: &dyn ContainerRuntime, local: &str) -> Result<()> {
    println!("{}", strings::NUKING);

    if let Err(e) = runtime.remove_containers(CONTAINER_PREFIX).await {
        debug!("Removing containers failed: {}", e);
    }
    if let Err(e) = runtime.remove_image(local).await {
        debug!("Removing image failed: {}", e);
    }

    println!("{}", paint(GREEN, strings::NUKED));
    Ok(())
}
