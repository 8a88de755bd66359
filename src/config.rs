use std::path::PathBuf;
use thiserror::Error;

pub const HISTORY_ENV: &str = "JOBSH_HISTORY";
pub const LOG_ENV: &str = "JOBSH_LOG";
const HISTORY_FILE: &str = ".jobsh_history";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("unknown option: {0}")]
    UnknownOption(String),
    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShellConfig {
    /// Line-editor history file; `None` keeps history in memory only.
    pub history_path: Option<PathBuf>,
    /// Skip the startup banner.
    pub quiet: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CliAction {
    Run(ShellConfig),
    Help,
    Version,
}

impl ShellConfig {
    /// Build from command-line arguments (without the program name) and an
    /// environment lookup.
    pub fn from_args<I, F>(args: I, var: F) -> Result<CliAction, ConfigError>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ShellConfig {
            history_path: default_history_path(&var),
            quiet: false,
        };

        for arg in args {
            match arg.as_str() {
                "-h" | "--help" => return Ok(CliAction::Help),
                "-V" | "--version" => return Ok(CliAction::Version),
                "-q" | "--quiet" => config.quiet = true,
                "--no-history" => config.history_path = None,
                flag if flag.starts_with('-') => {
                    return Err(ConfigError::UnknownOption(flag.to_string()));
                }
                other => return Err(ConfigError::UnexpectedArgument(other.to_string())),
            }
        }

        Ok(CliAction::Run(config))
    }
}

fn default_history_path<F>(var: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = var(HISTORY_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    var("HOME").map(|home| PathBuf::from(home).join(HISTORY_FILE))
}

pub const USAGE: &str = "\
Usage: jobsh [OPTIONS]

Options:
  -q, --quiet      Do not print the startup banner
      --no-history Do not load or save line history
  -h, --help       Show this help
  -V, --version    Show version

Environment:
  JOBSH_HISTORY    History file (default: $HOME/.jobsh_history)
  JOBSH_LOG        Log filter for stderr diagnostics (default: warn)
";

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults_use_home() {
        let action = ShellConfig::from_args(args(&[]), env(&[("HOME", "/home/ana")])).unwrap();
        assert_eq!(
            action,
            CliAction::Run(ShellConfig {
                history_path: Some(PathBuf::from("/home/ana/.jobsh_history")),
                quiet: false,
            })
        );
    }

    #[test]
    fn test_history_env_wins() {
        let action = ShellConfig::from_args(
            args(&["-q"]),
            env(&[("HOME", "/home/ana"), (HISTORY_ENV, "/tmp/h")]),
        )
        .unwrap();
        let CliAction::Run(config) = action else {
            panic!("expected run");
        };
        assert_eq!(config.history_path, Some(PathBuf::from("/tmp/h")));
        assert!(config.quiet);
    }

    #[test]
    fn test_no_history() {
        let action =
            ShellConfig::from_args(args(&["--no-history"]), env(&[("HOME", "/root")])).unwrap();
        assert_eq!(action, CliAction::Run(ShellConfig::default()));
    }

    #[test]
    fn test_flags() {
        assert_eq!(
            ShellConfig::from_args(args(&["--help"]), env(&[])),
            Ok(CliAction::Help)
        );
        assert_eq!(
            ShellConfig::from_args(args(&["-V"]), env(&[])),
            Ok(CliAction::Version)
        );
        assert_eq!(
            ShellConfig::from_args(args(&["--bogus"]), env(&[])),
            Err(ConfigError::UnknownOption("--bogus".to_string()))
        );
        assert_eq!(
            ShellConfig::from_args(args(&["script.sh"]), env(&[])),
            Err(ConfigError::UnexpectedArgument("script.sh".to_string()))
        );
    }
}
