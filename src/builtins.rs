use crate::ast::BuiltinCommand;
use crate::state::ShellState;
use crate::terminal::Terminal;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuiltinError {
    #[error("cd: {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("cd: {0}: Not a directory")]
    NotADirectory(String),
    #[error("cd: HOME not set")]
    NoHome,
    #[error("ls: {path}: {source}")]
    List {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// A synchronous shell-internal command that only touches the shell's own
/// state. `fg` and `exit` act on jobs and are handled by the shell itself.
pub trait Builtin {
    fn execute(&self, state: &mut ShellState, out: &mut dyn Terminal) -> Result<(), BuiltinError>;
}

pub struct Cd {
    pub target: Option<String>,
}

impl Builtin for Cd {
    fn execute(&self, state: &mut ShellState, _out: &mut dyn Terminal) -> Result<(), BuiltinError> {
        let (shown, path) = match &self.target {
            Some(target) => (target.clone(), state.cwd.join(target)),
            None => {
                let home = state.home.clone().ok_or(BuiltinError::NoHome)?;
                (home.display().to_string(), home)
            }
        };

        // Resolves `.` and `..` and fails for paths that do not exist
        let resolved = fs::canonicalize(&path).map_err(|source| BuiltinError::Directory {
            path: shown.clone(),
            source,
        })?;
        if !resolved.is_dir() {
            return Err(BuiltinError::NotADirectory(shown));
        }
        state.set_cwd(resolved);
        Ok(())
    }
}

pub struct Pwd;

impl Builtin for Pwd {
    fn execute(&self, state: &mut ShellState, out: &mut dyn Terminal) -> Result<(), BuiltinError> {
        out.print_line(&state.cwd.display().to_string());
        Ok(())
    }
}

pub struct Ls {
    pub path: Option<String>,
}

impl Builtin for Ls {
    fn execute(&self, state: &mut ShellState, out: &mut dyn Terminal) -> Result<(), BuiltinError> {
        let dir: PathBuf = match &self.path {
            Some(path) => state.cwd.join(path),
            None => state.cwd.clone(),
        };
        let shown = self.path.clone().unwrap_or_else(|| ".".to_string());
        let list_err = |source| BuiltinError::List {
            path: shown.clone(),
            source,
        };

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir).map_err(list_err)? {
            let entry = entry.map_err(list_err)?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        for name in names {
            out.print_line(&name);
        }
        Ok(())
    }
}

pub struct Help;

pub const HELP_TEXT: &str = "\
######## Welcome to jobsh ########
Type help to get this text.

Working commands:
    cd <directory>           - changes current directory, . and .. work
    pwd                      - prints current working directory
    ls [path]                - lists all files and folders in the given path
    <path_to_binary> <args>  - spawns a new process of the given executable
    fg <pid>                 - brings the background process with pid to foreground
    exit                     - closes all spawned processes and exits the shell

    Ctrl + C                 - kills the foreground process
    Ctrl + Z                 - sends the foreground process to background and prints its pid
    Ctrl + D                 - quits immediately without cleaning up (use exit instead)
";

impl Builtin for Help {
    fn execute(&self, _state: &mut ShellState, out: &mut dyn Terminal) -> Result<(), BuiltinError> {
        out.print_line(HELP_TEXT);
        Ok(())
    }
}

/// The built-ins that need nothing but `ShellState`.
pub fn get_builtin(command: &BuiltinCommand) -> Option<Box<dyn Builtin>> {
    match command {
        BuiltinCommand::Cd(target) => Some(Box::new(Cd {
            target: target.clone(),
        })),
        BuiltinCommand::Pwd => Some(Box::new(Pwd)),
        BuiltinCommand::Ls(path) => Some(Box::new(Ls { path: path.clone() })),
        BuiltinCommand::Help => Some(Box::new(Help)),
        BuiltinCommand::Fg(_) | BuiltinCommand::Exit => None,
    }
}
