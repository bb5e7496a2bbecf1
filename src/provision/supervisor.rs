// src/provision/supervisor.rs

//! Installing and launching the Habitat supervisor.
//!
//! Two launch strategies exist, picked by `service_type`:
//! - `unmanaged`: background `hab sup run` under `setsid`, logging to
//!   [`SUP_LOG`];
//! - `systemd`: upload a unit file and start it with `systemctl`.

use tracing::info;

use super::command::{ShellCommand, shell_quote};
use super::service::remove_staged;
use crate::config::{ProvisionerConfig, SupervisorSettings};
use crate::errors::Result;
use crate::exec::{Communicator, Session};
use crate::types::ServiceType;

pub const SUP_DIR: &str = "/hab/sup/default";
pub const SUP_LOG: &str = "/hab/sup/default/sup.log";
pub const UNIT_NAME: &str = "hab-supervisor";
pub const UNIT_PATH: &str = "/etc/systemd/system/hab-supervisor.service";

/// Upload target for the unit file before it is moved into place.
const UNIT_STAGING: &str = ".habprov-hab-supervisor.service";

/// `hab install core/hab-sup[/version]`, non-interactive.
pub fn install_command(cfg: &ProvisionerConfig) -> ShellCommand {
    let ident = match &cfg.version {
        Some(version) => format!("core/hab-sup/{version}"),
        None => "core/hab-sup".to_string(),
    };
    ShellCommand::new("hab")
        .arg("install")
        .arg(ident)
        .env("HAB_NONINTERACTIVE", "true")
        .sudo_preserve_env(cfg.use_sudo)
}

/// Options for `hab sup run`, in a fixed order.
pub fn supervisor_args(settings: &SupervisorSettings) -> Vec<String> {
    ShellCommand::new("hab")
        .flag_if("-I", settings.permanent_peer)
        .opt("--listen-gossip", settings.listen_gossip.as_deref())
        .opt("--listen-http", settings.listen_http.as_deref())
        .opt("--peer", settings.peer.as_deref())
        .opt("--ring", settings.ring_key.as_deref())
        .arguments()
        .to_vec()
}

fn sup_run(settings: &SupervisorSettings) -> ShellCommand {
    ShellCommand::new("hab")
        .args(["sup", "run"])
        .args(supervisor_args(settings))
}

/// Commands for the `unmanaged` strategy, as shell text.
pub fn unmanaged_commands(cfg: &ProvisionerConfig) -> Vec<String> {
    let run = sup_run(&cfg.supervisor).sudo(cfg.use_sudo);
    vec![
        ShellCommand::new("mkdir")
            .args(["-p", SUP_DIR])
            .sudo(cfg.use_sudo)
            .render(),
        ShellCommand::new("chmod")
            .args(["o+w", SUP_DIR])
            .sudo(cfg.use_sudo)
            .render(),
        format!(
            "(setsid {} > {} 2>&1 < /dev/null &) ; sleep 1",
            run.render(),
            shell_quote(SUP_LOG)
        ),
    ]
}

/// The systemd unit that runs the supervisor with the configured options.
pub fn systemd_unit(settings: &SupervisorSettings) -> String {
    let exec_start = ShellCommand::new("/bin/hab")
        .args(["sup", "run"])
        .args(supervisor_args(settings))
        .render();
    format!(
        "[Unit]\n\
         Description=Habitat Supervisor\n\
         \n\
         [Service]\n\
         ExecStart={exec_start}\n\
         Restart=on-failure\n\
         \n\
         [Install]\n\
         WantedBy=default.target\n"
    )
}

/// Moves the uploaded unit file into place.
fn place_unit_command(cfg: &ProvisionerConfig) -> ShellCommand {
    ShellCommand::new("install")
        .args(["-m", "0644", UNIT_STAGING, UNIT_PATH])
        .sudo(cfg.use_sudo)
}

/// Commands run once the unit file is in place.
pub fn systemd_commands(cfg: &ProvisionerConfig) -> Vec<ShellCommand> {
    vec![
        ShellCommand::new("systemctl")
            .arg("daemon-reload")
            .sudo(cfg.use_sudo),
        ShellCommand::new("systemctl")
            .args(["start", UNIT_NAME])
            .sudo(cfg.use_sudo),
    ]
}

/// Install the supervisor package and launch it with the configured strategy.
pub async fn start_supervisor<C>(session: &Session<'_, C>, cfg: &ProvisionerConfig) -> Result<()>
where
    C: Communicator + ?Sized,
{
    session.run(&install_command(cfg).render()).await?;

    info!(service_type = %cfg.service_type, "starting supervisor");
    match cfg.service_type {
        ServiceType::Unmanaged => {
            for cmd in unmanaged_commands(cfg) {
                session.run(&cmd).await?;
            }
        }
        ServiceType::Systemd => {
            let placed = match session
                .upload(UNIT_STAGING, &systemd_unit(&cfg.supervisor))
                .await
            {
                Ok(()) => session.run(&place_unit_command(cfg).render()).await,
                Err(err) => Err(err),
            };
            remove_staged(session, UNIT_STAGING, placed).await?;
            for cmd in systemd_commands(cfg) {
                session.run(&cmd.render()).await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionSection, RawProvisionerConfig};

    fn config(use_sudo: bool) -> ProvisionerConfig {
        let raw = RawProvisionerConfig {
            use_sudo,
            permanent_peer: true,
            listen_gossip: Some("0.0.0.0:9638".to_string()),
            peer: Some("10.0.0.10".to_string()),
            ring_key: Some("prod-ring".to_string()),
            connection: ConnectionSection {
                host: "h".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        ProvisionerConfig::try_from(raw).unwrap()
    }

    #[test]
    fn supervisor_options_follow_fixed_order() {
        assert_eq!(
            supervisor_args(&config(false).supervisor),
            vec![
                "-I",
                "--listen-gossip",
                "0.0.0.0:9638",
                "--peer",
                "10.0.0.10",
                "--ring",
                "prod-ring"
            ]
        );
        assert!(supervisor_args(&SupervisorSettings::default()).is_empty());
    }

    #[test]
    fn supervisor_install_is_pinned_to_version() {
        let mut cfg = config(true);
        cfg.version = Some("0.79.1".to_string());
        assert_eq!(
            install_command(&cfg).render(),
            "env HAB_NONINTERACTIVE=true sudo -E hab install core/hab-sup/0.79.1"
        );
    }

    #[test]
    fn unmanaged_launch_backgrounds_with_setsid() {
        let cmds = unmanaged_commands(&config(true));
        assert_eq!(cmds[0], "sudo mkdir -p /hab/sup/default");
        assert_eq!(cmds[1], "sudo chmod o+w /hab/sup/default");
        assert_eq!(
            cmds[2],
            "(setsid sudo hab sup run -I --listen-gossip 0.0.0.0:9638 --peer 10.0.0.10 \
             --ring prod-ring > /hab/sup/default/sup.log 2>&1 < /dev/null &) ; sleep 1"
        );
    }

    #[test]
    fn unit_file_runs_supervisor_with_options() {
        let unit = systemd_unit(&config(false).supervisor);
        assert!(unit.contains(
            "ExecStart=/bin/hab sup run -I --listen-gossip 0.0.0.0:9638 --peer 10.0.0.10 --ring prod-ring\n"
        ));
        assert!(unit.contains("Restart=on-failure"));
        assert!(unit.contains("WantedBy=default.target"));
    }
}
