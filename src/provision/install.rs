// src/provision/install.rs

//! Installing the `hab` runtime and its dedicated user.

use tracing::info;

use super::command::ShellCommand;
use crate::config::ProvisionerConfig;
use crate::errors::Result;
use crate::exec::{Communicator, Session};

pub const INSTALL_SCRIPT_URL: &str =
    "https://raw.githubusercontent.com/habitat-sh/habitat/master/components/hab/install.sh";

/// Installer location on the host, relative to the login directory.
const INSTALL_SCRIPT: &str = "install.sh";

/// Commands that install `hab`, in order.
pub fn runtime_install_commands(cfg: &ProvisionerConfig) -> Vec<ShellCommand> {
    let mut commands = vec![
        ShellCommand::new("curl")
            .args(["-fsSL", "-o", INSTALL_SCRIPT, INSTALL_SCRIPT_URL]),
        ShellCommand::new("bash")
            .arg(format!("./{INSTALL_SCRIPT}"))
            .opt("-v", cfg.version.as_deref())
            .sudo(cfg.use_sudo),
    ];
    commands.extend(hab_user_commands(cfg.use_sudo));
    commands.push(ShellCommand::new("rm").args(["-f", INSTALL_SCRIPT]));
    commands
}

/// Create the `hab` user the supervisor runs services as.
fn hab_user_commands(use_sudo: bool) -> Vec<ShellCommand> {
    vec![
        ShellCommand::new("hab")
            .args(["install", "core/busybox"])
            .sudo(use_sudo),
        ShellCommand::new("hab")
            .args(["pkg", "exec", "core/busybox", "adduser", "-D", "-g", "", "hab"])
            .sudo(use_sudo),
    ]
}

pub async fn install_runtime<C>(session: &Session<'_, C>, cfg: &ProvisionerConfig) -> Result<()>
where
    C: Communicator + ?Sized,
{
    info!(version = ?cfg.version, "installing hab");
    for cmd in runtime_install_commands(cfg) {
        session.run(&cmd.render()).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionSection, RawProvisionerConfig};

    fn config(version: Option<&str>, use_sudo: bool) -> ProvisionerConfig {
        let raw = RawProvisionerConfig {
            version: version.map(str::to_string),
            use_sudo,
            connection: ConnectionSection {
                host: "h".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        ProvisionerConfig::try_from(raw).unwrap()
    }

    #[test]
    fn installer_is_pinned_and_elevated_when_configured() {
        let rendered: Vec<_> = runtime_install_commands(&config(Some("0.79.1"), true))
            .iter()
            .map(ShellCommand::render)
            .collect();

        assert_eq!(
            rendered,
            vec![
                format!("curl -fsSL -o install.sh {INSTALL_SCRIPT_URL}"),
                "sudo bash ./install.sh -v 0.79.1".to_string(),
                "sudo hab install core/busybox".to_string(),
                "sudo hab pkg exec core/busybox adduser -D -g '' hab".to_string(),
                "rm -f install.sh".to_string(),
            ]
        );
    }

    #[test]
    fn latest_release_without_sudo() {
        let cmds = runtime_install_commands(&config(None, false));
        assert_eq!(cmds[1].render(), "bash ./install.sh");
        assert_eq!(cmds[2].render(), "hab install core/busybox");
    }
}
