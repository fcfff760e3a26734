//! Identity service CLI server
//!
//! ```sh
//! # Run with default config (~/.config/identity-service/config.toml)
//! identity-cli
//!
//! # Custom config path and port
//! identity-cli --config /etc/identity-service/config.toml --api-port 9090
//!
//! # Validate config without starting
//! identity-cli --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use identity_service::config::{AppConfig, CONFIG_ENV_VAR};
use identity_service::server::{init_tracing, ServerHandle, ServerOptions};

/// User registration and login service issuing JWT bearer tokens.
#[derive(Parser, Debug)]
#[command(
    name = "identity-cli",
    version,
    about = "User registration, login and role management over HTTP",
    long_about = "Identity service: REST API for registering users, signing them in \
                  with JWT bearer tokens and managing their roles.\n\n\
                  Default config: ~/.config/identity-service/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Override the REST API listen port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,

    /// Skip creating the default admin user.
    #[arg(long)]
    no_admin: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .unwrap_or_else(identity_service::default_config_path);

    let loaded = AppConfig::load(&config_path);
    if cli.check {
        // --check reports a broken file instead of falling back to defaults
        let mut config = loaded?;
        apply_overrides(&mut config, cli.api_port, cli.log_level.as_deref());
        print_summary(&config_path, &config);
        return Ok(());
    }

    let (mut config, load_error) = match loaded {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    apply_overrides(&mut config, cli.api_port, cli.log_level.as_deref());

    init_tracing(&config);
    match load_error {
        None => info!("Configuration loaded from {}", config_path.display()),
        Some(e) => {
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
        }
    }

    let handle = ServerHandle::start(ServerOptions {
        config,
        auto_migrate: !cli.no_migrate,
        create_default_admin: !cli.no_admin,
    })
    .await?;

    handle.install_signal_handler();
    info!("Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    Ok(())
}

fn apply_overrides(config: &mut AppConfig, api_port: Option<u16>, log_level: Option<&str>) {
    if let Some(port) = api_port {
        config.server.api_port = port;
    }
    if let Some(level) = log_level {
        config.logging.level = level.to_string();
    }
}

fn print_summary(path: &std::path::Path, config: &AppConfig) {
    println!("Configuration is valid");
    println!("   Config file : {}", path.display());
    println!("   API address : {}", config.api_address());
    println!("   Database    : {}", config.database.url);
    println!("   Roles       : {}", config.roles.seed.join(", "));
    let admin = if config.admin.enabled {
        config.admin.email.as_str()
    } else {
        "disabled"
    };
    println!("   Admin       : {}", admin);
    println!("   Log level   : {}", config.logging.level);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse_and_override() {
        let cli = Cli::parse_from(["identity-cli", "--api-port", "9090", "-l", "debug", "--no-admin"]);
        assert!(cli.no_admin);
        assert!(!cli.no_migrate);

        let mut config = AppConfig::default();
        apply_overrides(&mut config, cli.api_port, cli.log_level.as_deref());
        assert_eq!(config.server.api_port, 9090);
        assert_eq!(config.logging.level, "debug");
    }
}
