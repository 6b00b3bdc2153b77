use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use crate::config::Config;
use crate::init::{self, InitKind, InitManager};

pub const USAGE: &str = r#"initmgr - Query and control system services

Usage:
    initmgr [--config PATH] <command>

Commands:
    backend               Show which init system is in use
    list [PATTERN] [--json]
                          List services, optionally filtered by a glob
    status <name>         Exit 0 if the service is running, 3 otherwise
    enabled <name>        Exit 0 if the service starts at boot, 1 otherwise
    start <name>          Start a service
    stop <name>           Stop a service
    enable <name>         Enable a service at boot (and start it on systemd)
    disable <name>        Disable a service at boot (stops it first on systemd)
    reload                Reload service definitions
    help                  Show this help message

Examples:
    initmgr list 'ssh*'
    initmgr start nginx.service
    RUST_LOG=debug initmgr --config ./initmgr.toml enabled sshd
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Backend,
    List { pattern: String, json: bool },
    Status(String),
    Enabled(String),
    Start(String),
    Stop(String),
    Enable(String),
    Disable(String),
    Reload,
    Help,
}

impl Command {
    /// Whether the command changes service state.
    pub fn mutates(&self) -> bool {
        matches!(
            self,
            Command::Start(_)
                | Command::Stop(_)
                | Command::Enable(_)
                | Command::Disable(_)
                | Command::Reload
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub config: Option<PathBuf>,
    pub command: Command,
}

/// Parse arguments, program name excluded.
pub fn parse(args: &[String]) -> Result<Invocation> {
    let mut config = None;
    let mut rest = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = iter.next().context("--config requires a path")?;
                config = Some(PathBuf::from(path));
            }
            _ => rest.push(arg.as_str()),
        }
    }

    let command = match rest.as_slice() {
        [] | ["help" | "--help" | "-h"] => Command::Help,
        ["backend"] => Command::Backend,
        ["list", flags @ ..] => {
            let json = flags.contains(&"--json");
            let patterns: Vec<_> = flags.iter().filter(|f| **f != "--json").collect();
            let pattern = match patterns.as_slice() {
                [] => String::new(),
                [pattern] => pattern.to_string(),
                _ => bail!("list takes at most one pattern"),
            };
            Command::List { pattern, json }
        }
        ["status", name] => Command::Status(name.to_string()),
        ["enabled", name] => Command::Enabled(name.to_string()),
        ["start", name] => Command::Start(name.to_string()),
        ["stop", name] => Command::Stop(name.to_string()),
        ["enable", name] => Command::Enable(name.to_string()),
        ["disable", name] => Command::Disable(name.to_string()),
        ["reload"] => Command::Reload,
        [cmd, ..] => bail!("Unknown command or wrong arguments: {}", cmd),
    };

    Ok(Invocation { config, command })
}

pub fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Config::discover().context("Failed to load config"),
    }
}

/// Run a command and return the process exit code.
pub fn run(invocation: &Invocation) -> Result<i32> {
    if invocation.command == Command::Help {
        print!("{}", USAGE);
        return Ok(0);
    }

    let config = load_config(invocation.config.as_ref())?;

    if invocation.command.mutates() && !nix::unistd::Uid::effective().is_root() {
        tracing::warn!("Not running as root; the init system may refuse this request");
    }

    if invocation.command == Command::Backend {
        println!("{}", InitKind::detect(&config.systemd_marker));
        return Ok(0);
    }

    let manager = init::select(&config);
    execute(manager.as_ref(), &invocation.command)
}

fn execute(manager: &dyn InitManager, command: &Command) -> Result<i32> {
    match command {
        Command::List { pattern, json } => {
            let services = manager
                .list_services(pattern)
                .context("Failed to list services")?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&services)?);
            } else {
                for service in &services {
                    let state = if service.running { "running" } else { "stopped" };
                    println!("{:<40} {}", service.name, state);
                }
            }
            Ok(0)
        }
        Command::Status(name) => {
            let running = manager
                .is_service_running(name)
                .with_context(|| format!("Failed to get status of {}", name))?;
            println!("{}: {}", name, if running { "running" } else { "stopped" });
            Ok(if running { 0 } else { 3 })
        }
        Command::Enabled(name) => {
            let enabled = manager
                .is_service_enabled(name)
                .with_context(|| format!("Failed to check {}", name))?;
            println!("{}: {}", name, if enabled { "enabled" } else { "disabled" });
            Ok(if enabled { 0 } else { 1 })
        }
        Command::Start(name) => {
            manager
                .start_service(name)
                .with_context(|| format!("Failed to start {}", name))?;
            println!("✓ Started {}", name);
            Ok(0)
        }
        Command::Stop(name) => {
            manager
                .stop_service(name)
                .with_context(|| format!("Failed to stop {}", name))?;
            println!("✓ Stopped {}", name);
            Ok(0)
        }
        Command::Enable(name) => {
            manager
                .enable_service(name)
                .with_context(|| format!("Failed to enable {}", name))?;
            println!("✓ Enabled {}", name);
            Ok(0)
        }
        Command::Disable(name) => {
            manager
                .disable_service(name)
                .with_context(|| format!("Failed to disable {}", name))?;
            println!("✓ Disabled {}", name);
            Ok(0)
        }
        Command::Reload => {
            manager.reload().context("Failed to reload init system")?;
            println!("✓ Reloaded {}", manager.name());
            Ok(0)
        }
        Command::Backend | Command::Help => Ok(0),
    }
}
