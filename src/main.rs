mod backend;
mod cli;
mod config;
mod credentials;
mod ephemeral;
mod error;
mod image;
mod sandbox;
mod secrets;
mod session;
mod strings;
mod workspace;

#[cfg(test)]
mod test_support;

use backend::docker::DockerRuntime;
use clap::Parser;
use cli::{Cli, Commands};
use config::Settings;
use secrets::onepassword::OnePassword;
use session::{SessionBootstrapper, SessionOptions};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workspace::Git;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "klaude=debug,info"
    } else {
        "klaude=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Everything the session owns, secret files included, is dropped inside
    // `run`, so exiting afterwards cannot leave them behind.
    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            match &e {
                error::KlaudeError::ToolExit(_) | error::KlaudeError::Interrupted => {
                    info!("{}", e)
                }
                _ => {
                    error!("Error: {}", e);
                    eprintln!("{}", strings::paint(strings::RED, &format!("Error: {}", e)));
                }
            }
            e.exit_code()
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> error::Result<()> {
    let mut settings = Settings::load()?;
    if cli.no_1password {
        settings.disable_secrets_manager = true;
    }

    let runtime = DockerRuntime::new();

    match cli.command {
        None => {
            let secrets = OnePassword::new();
            let vcs = Git;
            let opts = SessionOptions::from_env(cli.path, settings, cli.verbose)?;

            let mut bootstrapper = SessionBootstrapper::new(&runtime, &secrets, &vcs);
            bootstrapper
                .run_until(&opts, session::shutdown_signal())
                .await?;
        }
        Some(command) => match command {
            Commands::Update => {
                image::update_image(&runtime, &settings.remote_image, &settings.local_image)
                    .await?;
            }

            Commands::Nuke => {
                image::nuke(&runtime, &settings.local_image).await?;
            }

            Commands::ResetCredentials { force } => {
                let auth_dir = settings.auth_dir()?;

                if !auth_dir.exists() {
                    println!(
                        "{}",
                        strings::format_string(strings::RESET_NOTHING, &auth_dir.display())
                    );
                    return Ok(());
                }

                if !force {
                    use std::io::{self, BufRead, Write};
                    print!(
                        "{}",
                        strings::format_string(strings::RESET_CONFIRM, &auth_dir.display())
                    );
                    io::stdout().flush()?;
                    let stdin = io::stdin();
                    let mut line = String::new();
                    stdin.lock().read_line(&mut line)?;
                    if !line.trim().eq_ignore_ascii_case("y") {
                        println!("{}", strings::ABORTED);
                        return Ok(());
                    }
                }

                credentials::reset_local_auth(&auth_dir)?;
                println!(
                    "{}",
                    strings::format_string(strings::RESET_DONE, &auth_dir.display())
                );
            }
        },
    }

    Ok(())
}
