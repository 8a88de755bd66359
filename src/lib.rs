pub mod ast;
pub mod builtins;
pub mod config;
pub mod executor;
pub mod helper;
pub mod parser;
pub mod reader;
pub mod shell;
pub mod signals;
pub mod state;
pub mod supervisor;
pub mod terminal;

// Re-export commonly used items
pub use ast::{BuiltinCommand, Input};
pub use config::{CliAction, ShellConfig};
pub use executor::{ExecError, JobEvent, KillSignal, OsSpawner, Process, Spawner};
pub use parser::route;
pub use shell::{Flow, Shell};
pub use signals::Control;
pub use state::{ExitStatus, JobId, JobState, ShellState};
pub use supervisor::{JobError, Supervisor};
pub use terminal::{BufferTerminal, Terminal};
