// src/provision/command.rs

//! Typed construction of remote shell commands.
//!
//! Every provisioning step describes its command as a program plus argument
//! list; rendering quotes each argument, so values from the config (package
//! identifiers, peers, groups, URLs) can never change the shell structure.

use std::fmt;

/// How a command is elevated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elevation {
    /// `sudo <cmd>`
    Sudo,
    /// `sudo -E <cmd>`, keeping the caller's environment.
    SudoPreserveEnv,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    env: Vec<(String, String)>,
    elevation: Option<Elevation>,
    program: String,
    args: Vec<String>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            env: Vec::new(),
            elevation: None,
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append `flag value` when `value` is present.
    pub fn opt(self, flag: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.arg(flag).arg(v),
            None => self,
        }
    }

    /// Append `flag` when `enabled`.
    pub fn flag_if(self, flag: &str, enabled: bool) -> Self {
        if enabled { self.arg(flag) } else { self }
    }

    /// Set an environment variable through `env K=V` in front of the command.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Run through `sudo` when `enabled`.
    pub fn sudo(mut self, enabled: bool) -> Self {
        self.elevation = enabled.then_some(Elevation::Sudo);
        self
    }

    /// Run through `sudo -E` when `enabled`.
    pub fn sudo_preserve_env(mut self, enabled: bool) -> Self {
        self.elevation = enabled.then_some(Elevation::SudoPreserveEnv);
        self
    }

    /// Program arguments, without env or elevation prefixes.
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Full argument vector as it will run on the host.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::new();
        if !self.env.is_empty() {
            argv.push("env".to_string());
            argv.extend(self.env.iter().map(|(k, v)| format!("{k}={v}")));
        }
        match self.elevation {
            Some(Elevation::Sudo) => argv.push("sudo".to_string()),
            Some(Elevation::SudoPreserveEnv) => {
                argv.push("sudo".to_string());
                argv.push("-E".to_string());
            }
            None => {}
        }
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Shell text with every argument quoted as needed.
    pub fn render(&self) -> String {
        self.argv()
            .iter()
            .map(|a| shell_quote(a))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Quote `s` for a POSIX shell.
///
/// Plain words are returned unchanged; anything else is wrapped in single
/// quotes with embedded single quotes escaped.
pub fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '=' | '@' | '%' | '+' | ',')
        });
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_words_are_not_quoted() {
        assert_eq!(shell_quote("core/hab-sup/0.79.1"), "core/hab-sup/0.79.1");
        assert_eq!(shell_quote("HAB_NONINTERACTIVE=true"), "HAB_NONINTERACTIVE=true");
        assert_eq!(shell_quote("10.0.0.1:9638"), "10.0.0.1:9638");
    }

    #[test]
    fn metacharacters_are_quoted() {
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("$(reboot)"), "'$(reboot)'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }

    #[test]
    fn env_and_elevation_prefix_the_program() {
        let cmd = ShellCommand::new("hab")
            .args(["install", "core/hab-sup"])
            .env("HAB_NONINTERACTIVE", "true")
            .sudo_preserve_env(true);
        assert_eq!(
            cmd.render(),
            "env HAB_NONINTERACTIVE=true sudo -E hab install core/hab-sup"
        );
    }

    #[test]
    fn optional_arguments_are_skipped_when_absent() {
        let cmd = ShellCommand::new("hab")
            .arg("sup")
            .arg("run")
            .flag_if("-I", false)
            .opt("--peer", None)
            .opt("--ring", Some("prod ring"))
            .sudo(false);
        assert_eq!(cmd.render(), "hab sup run --ring 'prod ring'");
        assert_eq!(cmd.arguments(), ["sup", "run", "--ring", "prod ring"]);
    }
}
