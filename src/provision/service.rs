// src/provision/service.rs

//! Loading one declared service into the supervisor.

use tracing::{info, warn};

use super::command::ShellCommand;
use crate::config::{Bind, ServiceSpec};
use crate::errors::Result;
use crate::exec::{Communicator, Session};

/// Directory holding a service's `user.toml`.
pub fn service_dir(spec: &ServiceSpec) -> String {
    format!("/hab/svc/{}", spec.package_name())
}

/// `--bind alias:service.group`
pub fn bind_option(bind: &Bind) -> [String; 2] {
    ["--bind".to_string(), bind.to_string()]
}

pub fn install_command(spec: &ServiceSpec, use_sudo: bool) -> ShellCommand {
    ShellCommand::new("hab")
        .args(["pkg", "install", spec.ident.as_str()])
        .env("HAB_NONINTERACTIVE", "true")
        .sudo_preserve_env(use_sudo)
}

/// `hab sup start <ident>` with topology, strategy, channel, url, group and
/// binds, in that order.
pub fn start_command(spec: &ServiceSpec, use_sudo: bool) -> ShellCommand {
    let mut cmd = ShellCommand::new("hab")
        .args(["sup", "start", spec.ident.as_str()])
        .opt("--topology", spec.topology.map(|t| t.as_str()))
        .opt("--strategy", spec.strategy.map(|s| s.as_str()))
        .opt("--channel", spec.channel.as_deref())
        .opt("--url", spec.url.as_deref())
        .opt("--group", spec.group.as_deref());
    for bind in &spec.binds {
        cmd = cmd.args(bind_option(bind));
    }
    cmd.sudo(use_sudo)
}

fn staging_path(spec: &ServiceSpec) -> String {
    format!(".habprov-{}-user.toml", spec.package_name())
}

/// Moves the uploaded `user.toml` into the service directory.
fn place_user_toml_command(spec: &ServiceSpec, use_sudo: bool) -> ShellCommand {
    let target = format!("{}/user.toml", service_dir(spec));
    ShellCommand::new("install")
        .args(["-m", "0644", staging_path(spec).as_str(), target.as_str()])
        .sudo(use_sudo)
}

/// Upload `contents` to the staging path, move it into place, and remove the
/// staged copy whether or not that worked.
async fn write_user_toml<C>(
    session: &Session<'_, C>,
    spec: &ServiceSpec,
    contents: &str,
    use_sudo: bool,
) -> Result<()>
where
    C: Communicator + ?Sized,
{
    let staged = staging_path(spec);
    let placed = match session.upload(&staged, contents).await {
        Ok(()) => {
            session
                .run(&place_user_toml_command(spec, use_sudo).render())
                .await
        }
        Err(err) => Err(err),
    };
    remove_staged(session, &staged, placed).await
}

/// Run `rm -f staged`, keeping `outcome` as the result. A failed cleanup
/// only fails the step when everything before it succeeded.
pub(crate) async fn remove_staged<C>(
    session: &Session<'_, C>,
    staged: &str,
    outcome: Result<()>,
) -> Result<()>
where
    C: Communicator + ?Sized,
{
    let cleanup = session
        .run(&ShellCommand::new("rm").args(["-f", staged]).render())
        .await;
    match (outcome, cleanup) {
        (Err(err), Err(cleanup_err)) => {
            warn!(path = staged, error = %cleanup_err, "removing staged file failed");
            Err(err)
        }
        (Err(err), Ok(())) => Err(err),
        (Ok(()), cleanup) => cleanup,
    }
}

/// Install the package, lay down its `user.toml` (if any), then start it.
pub async fn register_service<C>(
    session: &Session<'_, C>,
    spec: &ServiceSpec,
    use_sudo: bool,
) -> Result<()>
where
    C: Communicator + ?Sized,
{
    info!(service = %spec.ident, "registering service");
    session.run(&install_command(spec, use_sudo).render()).await?;

    if let Some(user_toml) = &spec.user_toml {
        let mkdir = ShellCommand::new("mkdir")
            .args(["-p".to_string(), service_dir(spec)])
            .sudo(use_sudo);
        session.run(&mkdir.render()).await?;
        write_user_toml(session, spec, user_toml, use_sudo).await?;
    }

    session.run(&start_command(spec, use_sudo).render()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Topology, UpdateStrategy};

    fn spec() -> ServiceSpec {
        ServiceSpec {
            ident: "core/redis".to_string(),
            strategy: None,
            topology: None,
            channel: None,
            group: None,
            url: None,
            binds: Vec::new(),
            user_toml: None,
        }
    }

    #[test]
    fn bind_renders_as_option_fragment() {
        let bind = Bind::new("db", "postgres", "default");
        assert_eq!(bind_option(&bind).join(" "), "--bind db:postgres.default");
    }

    #[test]
    fn start_options_are_appended_in_order() {
        let mut spec = spec();
        spec.strategy = Some(UpdateStrategy::Rolling);
        spec.topology = Some(Topology::Leader);
        spec.channel = Some("stable".to_string());
        spec.url = Some("https://bldr.example.com".to_string());
        spec.group = Some("prod".to_string());
        spec.binds = vec![
            Bind::new("db", "postgres", "default"),
            Bind::new("cache", "redis", "prod"),
        ];

        assert_eq!(
            start_command(&spec, true).render(),
            "sudo hab sup start core/redis --topology leader --strategy rolling \
             --channel stable --url https://bldr.example.com --group prod \
             --bind db:postgres.default --bind cache:redis.prod"
        );
    }

    #[test]
    fn bare_start_has_no_options() {
        assert_eq!(start_command(&spec(), false).render(), "hab sup start core/redis");
    }

    #[test]
    fn install_is_non_interactive() {
        assert_eq!(
            install_command(&spec(), true).render(),
            "env HAB_NONINTERACTIVE=true sudo -E hab pkg install core/redis"
        );
    }

    #[test]
    fn user_toml_lands_in_the_service_directory() {
        let mut spec = spec();
        spec.ident = "core/redis/4.0.14".to_string();
        assert_eq!(
            place_user_toml_command(&spec, true).render(),
            "sudo install -m 0644 .habprov-redis-user.toml /hab/svc/redis/user.toml"
        );
    }
}
