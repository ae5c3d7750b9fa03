//! Session bootstrap: preconditions, workspace, credentials, sandbox launch.
//!
//! [`SessionBootstrapper::run_until`] drives one invocation through
//! [`SessionState`]. Ephemeral secret files are owned by locals of the
//! session future, so they are deleted when the session returns, fails, or is
//! cut short by the shutdown future.

use crate::backend::ContainerRuntime;
use crate::cli::Commands;
use crate::config::{
    SandboxSpec, Settings, SANDBOX_CONFIG_DIR, SANDBOX_HOME, SANDBOX_HOSTNAME, SANDBOX_KUBECONFIG,
    SANDBOX_PATH, SANDBOX_USER, SANDBOX_WORKSPACE, TOOL_COMMAND, TOOL_FULL_ACCESS_FLAG,
};
use crate::credentials::{resolve_credentials, CredentialOptions, CredentialResolution};
use crate::error::{KlaudeError, Result};
use crate::image;
use crate::sandbox::SandboxBuilder;
use crate::secrets::SecretsManager;
use crate::strings::{self, paint, BLUE, GREEN, RED, YELLOW};
use crate::workspace::{self, VersionControl};
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    PreconditionsChecked,
    WorkspaceResolved,
    CredentialsResolved,
    SandboxLaunched,
    Completed,
    Failed,
}

impl SessionState {
    fn successor(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::PreconditionsChecked),
            Self::PreconditionsChecked => Some(Self::WorkspaceResolved),
            Self::WorkspaceResolved => Some(Self::CredentialsResolved),
            Self::CredentialsResolved => Some(Self::SandboxLaunched),
            Self::SandboxLaunched => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Move to `to`, which must be the next state or `Failed`
    pub fn advance(&mut self, to: Self) -> Result<()> {
        let allowed = if to == Self::Failed {
            !self.is_terminal()
        } else {
            self.successor() == Some(to)
        };
        if !allowed {
            return Err(KlaudeError::InvalidTransition {
                from: format!("{:?}", self),
                to: format!("{:?}", to),
            });
        }
        debug!("Session state {:?} -> {:?}", self, to);
        *self = to;
        Ok(())
    }
}

/// Per-invocation inputs
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub explicit_workspace: Option<PathBuf>,
    pub cwd: PathBuf,
    pub settings: Settings,
    /// Where ephemeral secret files are staged
    pub temp_dir: PathBuf,
    pub pid: u32,
    pub verbose: bool,
}

impl SessionOptions {
    pub fn from_env(
        explicit_workspace: Option<PathBuf>,
        settings: Settings,
        verbose: bool,
    ) -> Result<Self> {
        Ok(Self {
            explicit_workspace,
            cwd: std::env::current_dir()?,
            settings,
            temp_dir: std::env::temp_dir(),
            pid: std::process::id(),
            verbose,
        })
    }
}

pub struct SessionBootstrapper<'a> {
    runtime: &'a dyn ContainerRuntime,
    secrets: &'a dyn SecretsManager,
    vcs: &'a dyn VersionControl,
    state: SessionState,
    /// Container that may outlive the docker client if the session is cut short
    container: Option<String>,
}

impl<'a> SessionBootstrapper<'a> {
    pub fn new(
        runtime: &'a dyn ContainerRuntime,
        secrets: &'a dyn SecretsManager,
        vcs: &'a dyn VersionControl,
    ) -> Self {
        Self {
            runtime,
            secrets,
            vcs,
            state: SessionState::Idle,
            container: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run one session; resolving `shutdown` aborts it with `Interrupted`.
    ///
    /// Returns the wrapped tool's exit status (always 0 on `Ok`; non-zero
    /// statuses surface as `ToolExit`).
    pub async fn run_until<F>(&mut self, opts: &SessionOptions, shutdown: F) -> Result<i32>
    where
        F: Future<Output = ()>,
    {
        let result = tokio::select! {
            // A pending signal wins over a stage that is ready in the same poll
            biased;

            _ = shutdown => {
                warn!("Shutdown signal received, aborting session");
                println!("{}", paint(YELLOW, strings::SESSION_INTERRUPTED));
                Err(KlaudeError::Interrupted)
            }
            result = self.run_stages(opts) => result,
        };

        // The stage future and its secret files are gone at this point
        if matches!(result, Err(KlaudeError::Interrupted)) {
            if let Some(name) = self.container.take() {
                if let Err(e) = self.runtime.remove_container(&name).await {
                    warn!("Failed to remove container {}: {}", name, e);
                }
            }
        }

        let terminal = match result {
            Ok(_) => SessionState::Completed,
            Err(_) => SessionState::Failed,
        };
        if let Err(e) = self.state.advance(terminal) {
            error!("{}", e);
        }
        result
    }

    async fn run_stages(&mut self, opts: &SessionOptions) -> Result<i32> {
        self.check_preconditions(opts).await?;
        self.state.advance(SessionState::PreconditionsChecked)?;

        let workspace = self.resolve_workspace(opts)?;
        self.state.advance(SessionState::WorkspaceResolved)?;

        let credential_opts = CredentialOptions {
            disable_secrets_manager: opts.settings.disable_secrets_manager,
            tag: opts.settings.secrets_tag.clone(),
            auth_dir: opts.settings.auth_dir()?,
            temp_dir: opts.temp_dir.clone(),
        };
        let credentials = resolve_credentials(&credential_opts, self.secrets).await?;
        self.state.advance(SessionState::CredentialsResolved)?;
        report_credentials(&credentials);
        debug!(
            "Resolved credentials {:?} from {:?}, staged files {:?}",
            credentials,
            credentials.sources(),
            credentials.ephemeral_paths()
        );

        let name = Commands::generate_session_name(&workspace, opts.pid);
        let mount_source = workspace.canonicalize()?;
        let spec = build_sandbox_spec(
            &name,
            &opts.settings.local_image,
            &mount_source,
            &credentials,
        );

        print_banner(&workspace, &spec.name);

        self.state.advance(SessionState::SandboxLaunched)?;
        self.container = Some(spec.name.clone());
        let status = self.runtime.run(&spec).await;
        if !matches!(status, Err(KlaudeError::Interrupted)) {
            // --rm has taken care of it
            self.container = None;
        }

        if let Some(kubeconfig) = credentials.kubeconfig {
            if let Err(e) = kubeconfig.close() {
                warn!("Ephemeral kubeconfig cleanup failed: {}", e);
            }
        }
        let status = status?;

        println!(
            "{}",
            paint(
                GREEN,
                &strings::format_string(strings::SESSION_ENDED, &workspace.display())
            )
        );

        if status != 0 {
            info!("Wrapped tool exited with status {}", status);
            return Err(KlaudeError::ToolExit(status));
        }
        Ok(status)
    }

    async fn check_preconditions(&self, opts: &SessionOptions) -> Result<()> {
        if let Err(e) = self.runtime.ping().await {
            println!("{}", paint(RED, strings::DOCKER_NOT_RUNNING));
            return Err(e);
        }

        image::ensure_image(
            self.runtime,
            &opts.settings.remote_image,
            &opts.settings.local_image,
            opts.verbose,
        )
        .await
    }

    fn resolve_workspace(&self, opts: &SessionOptions) -> Result<PathBuf> {
        let workspace =
            workspace::resolve_workspace(opts.explicit_workspace.clone(), &opts.cwd, self.vcs);
        workspace::ensure_workspace_exists(&workspace)?;
        info!("Workspace: {}", workspace.display());
        Ok(workspace)
    }
}

/// Assemble the launch configuration from the resolved inputs
pub fn build_sandbox_spec(
    name: &str,
    image: &str,
    workspace: &Path,
    credentials: &CredentialResolution,
) -> SandboxSpec {
    let mut builder = SandboxBuilder::new(name)
        .image(image)
        .hostname(SANDBOX_HOSTNAME)
        .bind_mount(workspace, SANDBOX_WORKSPACE, false);

    if let Some(local_auth) = &credentials.local_auth {
        builder = builder.bind_mount(&local_auth.dir, SANDBOX_CONFIG_DIR, false);
    }

    if let Some(kubeconfig) = &credentials.kubeconfig {
        builder = builder.bind_mount(kubeconfig.path(), SANDBOX_KUBECONFIG, true);
    }

    builder = builder
        .workdir(SANDBOX_WORKSPACE)
        .env("PATH", SANDBOX_PATH)
        .env("CLAUDE_CONFIG_DIR", SANDBOX_CONFIG_DIR)
        .env("HOME", SANDBOX_HOME)
        .env("USER", SANDBOX_USER);

    if let Some(token) = &credentials.github_token {
        builder = builder
            .secret_env("GITHUB_TOKEN", token.as_str())
            .secret_env("GH_TOKEN", token.as_str());
    }

    builder
        .user(SANDBOX_USER)
        .tool_command(vec![
            TOOL_COMMAND.to_string(),
            TOOL_FULL_ACCESS_FLAG.to_string(),
        ])
        .build()
}

fn report_credentials(credentials: &CredentialResolution) {
    for note in &credentials.notes {
        println!("{}", paint(YELLOW, note));
    }
    if credentials.github_token.is_some() {
        println!("{}", paint(GREEN, strings::FOUND_GITHUB_TOKEN));
    }
    if credentials.kubeconfig.is_some() {
        println!("{}", paint(GREEN, strings::FOUND_KUBECONFIG));
    }
    match &credentials.local_auth {
        Some(auth) if auth.has_saved_auth => {
            println!("{}", paint(GREEN, strings::SAVED_AUTH_FOUND))
        }
        _ => println!("{}", paint(YELLOW, strings::SAVED_AUTH_MISSING)),
    }
}

fn print_banner(workspace: &Path, container: &str) {
    println!("{}", paint(BLUE, strings::RULE));
    println!("{}", paint(BLUE, strings::BANNER_TITLE));
    println!(
        "{}",
        paint(
            YELLOW,
            &strings::format_string(strings::BANNER_PROJECT, &workspace.display())
        )
    );
    println!(
        "{}",
        paint(
            GREEN,
            &strings::format_string(strings::BANNER_CONTAINER, &container)
        )
    );
    println!("{}", paint(BLUE, strings::RULE));

    if let Some(previous) = workspace::previous_session(workspace) {
        println!(
            "{}",
            paint(
                YELLOW,
                &strings::format_string(strings::PREVIOUS_SESSION, &previous)
            )
        );
    }
    workspace::mark_session(workspace, chrono::Local::now());

    println!("{}", paint(GREEN, strings::STARTING_CONTAINER));
    println!();
}

/// Resolves on SIGINT, SIGTERM or SIGHUP
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let wait_for = |kind: SignalKind| async move {
            match signal(kind) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    warn!("Failed to install signal handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {}
            _ = wait_for(SignalKind::terminate()) => {}
            _ = wait_for(SignalKind::hangup()) => {}
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
