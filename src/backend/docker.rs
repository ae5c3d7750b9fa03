use super::{run_command, ContainerRuntime};
use crate::config::SandboxSpec;
use crate::error::{KlaudeError, Result};
use crate::sandbox::{ENTRY_SCRIPT, ENTRY_SCRIPT_NAME};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// docker exits with 125 when the daemon rejects the run options.
///
/// A wrapped tool that itself exits 125 is indistinguishable from this and
/// is reported as a launch failure too. docker's 126 and 127 (container
/// command not executable or not found) are passed through as tool statuses.
const DOCKER_RUN_REJECTED: i32 = 125;

pub struct DockerRuntime;

impl DockerRuntime {
    pub fn new() -> Self {
        Self
    }

    fn build_run_args(&self, spec: &SandboxSpec) -> Vec<String> {
        let mut args = vec!["run".to_string()];

        if spec.interactive {
            args.push("-it".to_string());
        }
        if spec.auto_remove {
            args.push("--rm".to_string());
        }

        args.push("--name".to_string());
        args.push(spec.name.clone());
        args.push("--hostname".to_string());
        args.push(spec.hostname.clone());

        if spec.privileged {
            args.push("--privileged".to_string());
        }

        // Bind mounts
        for mount in &spec.bind_mounts {
            let bind_arg = if mount.readonly {
                format!("{}:{}:ro", mount.source.display(), mount.target.display())
            } else {
                format!("{}:{}", mount.source.display(), mount.target.display())
            };
            args.push("-v".to_string());
            args.push(bind_arg);
        }

        args.push("-w".to_string());
        args.push(spec.workdir.display().to_string());

        // Environment variables
        for (key, value) in &spec.environment {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }

        // Secret values are read by docker from its own environment
        for key in spec.secret_environment.keys() {
            args.push("-e".to_string());
            args.push(key.to_string());
        }

        args.push(spec.image.clone());

        // Entry script, then the identity and tool argv as positional parameters
        args.push("bash".to_string());
        args.push("-c".to_string());
        args.push(ENTRY_SCRIPT.to_string());
        args.push(ENTRY_SCRIPT_NAME.to_string());
        args.push(spec.user.clone());
        args.extend(spec.tool_command.iter().cloned());

        args
    }

    fn run_command_for(&self, spec: &SandboxSpec) -> Command {
        let mut cmd = Command::new("docker");
        cmd.args(self.build_run_args(spec))
            .envs(spec.secret_environment.iter())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }
}

/// Map the `docker run` client status onto the session outcome
fn run_status(name: &str, code: Option<i32>) -> Result<i32> {
    match code {
        Some(DOCKER_RUN_REJECTED) => Err(KlaudeError::SandboxLaunch(format!(
            "docker rejected the run configuration for {} (status {})",
            name, DOCKER_RUN_REJECTED
        ))),
        Some(code) => Ok(code),
        None => Err(KlaudeError::Interrupted),
    }
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<()> {
        let mut cmd = Command::new("docker");
        cmd.arg("info");

        run_command(&mut cmd)
            .await
            .map(|_| ())
            .map_err(|e| KlaudeError::EnvironmentUnavailable(e.to_string()))
    }

    async fn pull(&self, image: &str) -> Result<()> {
        info!("Pulling image: {}", image);

        let mut cmd = Command::new("docker");
        cmd.arg("pull").arg(image);

        run_command(&mut cmd)
            .await
            .map_err(|e| KlaudeError::ImageUnavailable(format!("Failed to pull {}: {}", image, e)))?;
        Ok(())
    }

    async fn tag(&self, source: &str, target: &str) -> Result<()> {
        let mut cmd = Command::new("docker");
        cmd.arg("tag").arg(source).arg(target);

        run_command(&mut cmd).await?;
        debug!("Tagged {} as {}", source, target);
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        let mut cmd = Command::new("docker");
        cmd.arg("images").arg("--quiet").arg(image);

        match run_command(&mut cmd).await {
            Ok(output) => Ok(!output.trim().is_empty()),
            Err(_) => Ok(false),
        }
    }

    async fn remove_image(&self, image: &str) -> Result<()> {
        info!("Removing image: {}", image);

        let mut cmd = Command::new("docker");
        cmd.arg("rmi").arg(image);

        run_command(&mut cmd).await?;
        Ok(())
    }

    async fn remove_containers(&self, name_filter: &str) -> Result<usize> {
        let mut cmd = Command::new("docker");
        cmd.arg("ps")
            .arg("-aq")
            .arg("--filter")
            .arg(format!("name={}", name_filter));

        let output = run_command(&mut cmd).await?;
        let ids: Vec<&str> = output.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

        if ids.is_empty() {
            debug!("No containers matching {}", name_filter);
            return Ok(0);
        }

        let mut rm = Command::new("docker");
        rm.arg("rm").arg("-f").args(&ids);
        run_command(&mut rm).await?;

        info!("Removed {} container(s) matching {}", ids.len(), name_filter);
        Ok(ids.len())
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        let mut cmd = Command::new("docker");
        cmd.arg("rm").arg("-f").arg(name);

        match run_command(&mut cmd).await {
            Ok(_) => {
                info!("Removed container {}", name);
                Ok(())
            }
            Err(e) if e.to_string().contains("No such container") => {
                debug!("Container {} already gone", name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn run(&self, spec: &SandboxSpec) -> Result<i32> {
        info!("Starting sandbox: {}", spec.name);

        debug!(
            "Running container {} with {} mount(s), {} env var(s) and {} secret(s)",
            spec.name,
            spec.bind_mounts.len(),
            spec.environment.len(),
            spec.secret_environment.len()
        );

        // Interactive mode: inherit stdio for direct user interaction
        let mut cmd = self.run_command_for(spec);
        let status = cmd.status().await.map_err(|e| {
            KlaudeError::SandboxLaunch(format!("Failed to execute docker run: {}", e))
        })?;

        run_status(&spec.name, status.code())
    }
}
