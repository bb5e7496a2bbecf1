// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod provision;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::config::model::ProvisionerConfig;
use crate::exec::{ConsoleSink, DryRunCommunicator, SharedSink, SshCommunicator};
use crate::provision::Provisioner;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and validation (plus `--host` override)
/// - the communicator (ssh, or the dry-run printer)
/// - the provisioning sequence, with output going to stdout
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path, args.host.as_deref())?;
    debug!(path = %config_path.display(), "configuration loaded");

    if args.check {
        print_summary(&cfg);
        return Ok(());
    }

    let sink: SharedSink = Arc::new(ConsoleSink);

    let outcome = if args.dry_run {
        let comm = DryRunCommunicator::new(
            cfg.connection.host.clone(),
            Arc::clone(&sink),
            cfg.connection.timeout,
        );
        Provisioner::new(&cfg, &comm, sink).run().await
    } else {
        info!(host = %cfg.connection.host, "provisioning host");
        let comm = SshCommunicator::new(cfg.connection.clone());
        Provisioner::new(&cfg, &comm, sink).run().await
    };

    outcome.into_result()?;
    Ok(())
}

/// `--check` output: the validated config, one setting per line.
fn print_summary(cfg: &ProvisionerConfig) {
    println!("habprov check: configuration is valid");
    println!("  connection.host = {}", cfg.connection.host);
    if let Some(user) = &cfg.connection.user {
        println!("  connection.user = {user}");
    }
    if let Some(port) = cfg.connection.port {
        println!("  connection.port = {port}");
    }
    println!("  connection.timeout = {:?}", cfg.connection.timeout);
    println!("  connection.retry_interval = {:?}", cfg.connection.retry_interval);
    println!(
        "  version = {}",
        cfg.version.as_deref().unwrap_or("latest")
    );
    println!("  skip_install = {}", cfg.skip_install);
    println!("  use_sudo = {}", cfg.use_sudo);
    println!("  service_type = {}", cfg.service_type);
    println!();

    println!("services ({}):", cfg.services.len());
    for spec in &cfg.services {
        println!("  - {}", spec.ident);
        if let Some(strategy) = spec.strategy {
            println!("      strategy: {strategy}");
        }
        if let Some(topology) = spec.topology {
            println!("      topology: {topology}");
        }
        if let Some(channel) = &spec.channel {
            println!("      channel: {channel}");
        }
        if let Some(group) = &spec.group {
            println!("      group: {group}");
        }
        if let Some(url) = &spec.url {
            println!("      url: {url}");
        }
        for bind in &spec.binds {
            println!("      bind: {bind}");
        }
        if spec.user_toml.is_some() {
            println!("      user.toml: provided");
        }
    }
}
