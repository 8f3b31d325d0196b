// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Nexus - multi-tenant message bridge.
//!
//! This is the binary entry point. It loads configuration, then either runs
//! the bridge service or one of the operator checks.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod factory;
mod serve;
mod shutdown;
mod tenants;
mod workspace;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use nexus_config::model::NexusConfig;
use nexus_core::{Credentials, NexusError, Platform, TenantId};
use nexus_vault::CredentialVault;

/// Nexus - multi-tenant message bridge.
#[derive(Parser, Debug)]
#[command(name = "nexus", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the webhook server, dispatcher and replay sweep.
    Serve {
        /// Load this file instead of the standard search path.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
    /// Credential vault checks.
    Vault {
        #[command(subcommand)]
        action: VaultCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate configuration and print a summary.
    Check {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum VaultCommand {
    /// Seal and reopen a probe credential with the configured secret.
    EncryptTest {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<NexusConfig, ExitCode> {
    let loaded = match path {
        Some(path) => nexus_config::load_and_validate_path(path),
        None => nexus_config::load_and_validate(),
    };
    loaded.map_err(|errors| {
        nexus_config::render_errors(&errors);
        ExitCode::FAILURE
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { config }) => {
            let config = match load_config(config.as_ref()) {
                Ok(config) => config,
                Err(code) => return code,
            };
            match serve::run_serve(config).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("error: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Some(Commands::Config {
            action: ConfigCommand::Check { config },
        }) => match load_config(config.as_ref()) {
            Ok(config) => {
                print!("{}", config_summary(&config));
                ExitCode::SUCCESS
            }
            Err(code) => code,
        },
        Some(Commands::Vault {
            action: VaultCommand::EncryptTest { config },
        }) => {
            let config = match load_config(config.as_ref()) {
                Ok(config) => config,
                Err(code) => return code,
            };
            match vault_probe(&config) {
                Ok(version) => {
                    println!("vault: ok (encryption_version={version})");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("vault: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        None => {
            println!("nexus: use --help for available commands");
            ExitCode::SUCCESS
        }
    }
}

/// One line per setting an operator usually wants to double-check.
fn config_summary(config: &NexusConfig) -> String {
    let workspace = match &config.workspace.base_url {
        Some(url) => format!("http ({url})"),
        None => "log".to_string(),
    };
    let mut out = String::new();
    out.push_str(&format!("service:   {}\n", config.service.name));
    out.push_str(&format!("database:  {}\n", config.storage.database_path));
    out.push_str(&format!(
        "gateway:   {}:{} (management auth {})\n",
        config.gateway.host,
        config.gateway.port,
        if config.gateway.bearer_token.is_some() { "on" } else { "off" }
    ));
    out.push_str(&format!(
        "dispatch:  {} workers, queue {}\n",
        config.bridge.workers, config.bridge.queue_capacity
    ));
    out.push_str(&format!(
        "vault:     {}\n",
        if config.vault.secret.is_some() { "configured" } else { "locked (no secret)" }
    ));
    out.push_str(&format!("workspace: {workspace}\n"));
    out.push_str(&format!("tenants:   {}\n", config.tenants.len()));
    out
}

/// Seals a throwaway credential map and opens it again.
fn vault_probe(config: &NexusConfig) -> Result<&'static str, NexusError> {
    let vault = CredentialVault::from_config(&config.vault)?;
    if !vault.is_available() {
        return Err(NexusError::credential_unavailable(
            "vault.secret is not set (NEXUS_VAULT_SECRET)",
        ));
    }
    let tenant = TenantId::from("vault-probe");
    let probe = Credentials::new()
        .with("bot_token", "probe-token")
        .with("bot_username", "probe_bot");
    let sealed = vault.encrypt(&tenant, Platform::Telegram, &probe)?;
    let opened = vault.decrypt(&sealed)?;
    if opened.get("bot_token") != Some("probe-token") {
        return Err(NexusError::Internal("vault probe did not round-trip".into()));
    }
    Ok(vault.encryption_version())
}
