mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use plughost_core::kernel::bootstrap::Application;
use plughost_core::kernel::error::Result;
use plughost_core::plugin_system::{DefaultPluginManager, PluginManager};

/// Plughost: lifecycle manager for optional plugins and their client apps
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Print "pong" and exit
    #[arg(long)]
    ping: bool,

    /// Base installation directory, substituted for $BASE
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// Configuration directory holding plugins/ and plugins.config, substituted for $CONFIG
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Host settings file, relative to the config directory; format follows the extension
    #[arg(long, default_value = "host.json")]
    settings: PathBuf,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start every enabled plugin and run until interrupted
    Run,
    /// Manage plugins
    Plugin {
        #[command(subcommand)]
        command: PluginCommand,
    },
}

#[derive(Subcommand, Debug)]
enum PluginCommand {
    /// List installed plugins
    List,
    /// Start a plugin's client apps, webapps and console link.
    /// Runs until the plugin has nothing left running or Ctrl-C is pressed.
    Start { name: String },
    /// Stop a plugin
    Stop { name: String },
    /// Run a plugin's uninstall actions and remove it
    Delete { name: String },
    /// Start the plugin on load (persisted)
    Enable { name: String },
    /// Do not start the plugin on load (persisted)
    Disable { name: String },
    /// Report whether a plugin is running
    Status { name: String },
    /// List signing keys declared by installed plugins
    Keys,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if args.ping {
        println!("pong");
        return ExitCode::SUCCESS;
    }

    if let Err(e) = logging::init(&args.log_level) {
        eprintln!("{}", e);
    }

    let mut app = match Application::with_settings_file(
        args.base_dir.clone(),
        args.config_dir.clone(),
        Some(args.settings.clone()),
    ) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to initialize application: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::debug!(command = ?args.command, "Dispatching command");
    let result = match args.command {
        Some(Commands::Plugin { command }) => run_plugin_command(&app, command).await,
        Some(Commands::Run) | None => {
            println!("Starting plugins, press Ctrl-C to stop...");
            let result = app.run_until(shutdown_signal()).await;
            println!("Shutting down application...");
            result
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
    }
}

async fn run_plugin_command(app: &Application, command: PluginCommand) -> Result<()> {
    app.initialize().await?;
    let manager = app.plugin_manager();

    match command {
        PluginCommand::List => {
            let plugins = manager.plugins();
            if plugins.is_empty() {
                println!("No plugins installed.");
            }
            for plugin in plugins {
                let status = if plugin.enabled { "Enabled" } else { "Disabled" };
                println!("  - Name: {}, Status: {}", plugin.name, status);
            }
        }
        PluginCommand::Start { name } => {
            manager.start_plugin(&name).await?;
            println!("Started plugin '{}'.", name);
            // Threads and queued jobs die with the process
            if manager.is_plugin_running(&name) {
                println!("Plugin '{}' is running, press Ctrl-C to stop...", name);
                tokio::select! {
                    _ = wait_until_stopped(&manager, &name) => println!("Plugin '{}' is no longer running.", name),
                    _ = shutdown_signal() => {
                        manager.stop_plugin(&name).await?;
                        println!("Stopped plugin '{}'.", name);
                    }
                }
            }
        }
        PluginCommand::Stop { name } => {
            manager.stop_plugin(&name).await?;
            println!("Stopped plugin '{}'.", name);
        }
        PluginCommand::Delete { name } => {
            manager.delete_plugin(&name).await?;
            println!("Deleted plugin '{}'.", name);
        }
        PluginCommand::Enable { name } => {
            manager.set_plugin_enabled(&name, true)?;
            println!("Plugin '{}' will start on load.", name);
        }
        PluginCommand::Disable { name } => {
            manager.set_plugin_enabled(&name, false)?;
            println!("Plugin '{}' will not start on load.", name);
        }
        PluginCommand::Status { name } => {
            let state = if manager.is_plugin_running(&name) { "running" } else { "stopped" };
            println!("{}: {}", name, state);
        }
        PluginCommand::Keys => {
            let keys = manager.plugin_keys();
            if keys.is_empty() {
                println!("No signing keys declared.");
            }
            for (key, signer) in keys {
                println!("{} {}", signer, key);
            }
        }
    }
    Ok(())
}

async fn wait_until_stopped(manager: &DefaultPluginManager, name: &str) {
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    loop {
        ticker.tick().await;
        if !manager.is_plugin_running(name) {
            return;
        }
    }
}
