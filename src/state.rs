use crate::executor::Process;
use std::env;
use std::fmt;
use std::path::PathBuf;

// --- Job Control ---

/// Process id of a tracked job, as assigned by the OS at spawn time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u32);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Foreground,
    Background,
    Terminated,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Foreground => write!(f, "Foreground"),
            JobState::Background => write!(f, "Background"),
            JobState::Terminated => write!(f, "Terminated"),
        }
    }
}

/// How a job's process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Code(i32),
    /// Killed by a signal, no exit code available.
    Signaled(i32),
    Unknown,
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Code(code) => write!(f, "code {}", code),
            ExitStatus::Signaled(sig) => write!(f, "signal {}", sig),
            ExitStatus::Unknown => write!(f, "unknown status"),
        }
    }
}

pub struct Job<P> {
    pub id: JobId,
    pub command: String,
    pub state: JobState,
    pub exit_status: Option<ExitStatus>,
    pub(crate) process: P,
}

impl<P: Process> Job<P> {
    pub fn new(command: String, process: P) -> Self {
        Self {
            id: process.pid(),
            command,
            state: JobState::Foreground,
            exit_status: None,
            process,
        }
    }

    pub fn is_live(&self) -> bool {
        self.state != JobState::Terminated
    }
}

impl<P> fmt::Debug for Job<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("state", &self.state)
            .field("exit_status", &self.exit_status)
            .finish_non_exhaustive()
    }
}

// --- Shell State ---

/// Everything the built-ins may touch. Jobs live in the supervisor.
#[derive(Debug, Clone)]
pub struct ShellState {
    // Working directory used by built-ins and handed to every spawn
    pub cwd: PathBuf,
    pub home: Option<PathBuf>,
}

impl ShellState {
    pub fn new() -> Self {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        let home = env::var_os("HOME").map(PathBuf::from);
        Self { cwd, home }
    }

    pub fn with_cwd(cwd: PathBuf) -> Self {
        Self { cwd, home: None }
    }

    pub fn set_cwd(&mut self, path: PathBuf) {
        self.cwd = path;
    }
}

impl Default for ShellState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(JobId(100).to_string(), "100");
        assert_eq!(JobState::Background.to_string(), "Background");
        assert_eq!(ExitStatus::Code(3).to_string(), "code 3");
        assert_eq!(ExitStatus::Signaled(9).to_string(), "signal 9");
    }

    #[test]
    fn test_with_cwd() {
        let state = ShellState::with_cwd(PathBuf::from("/var"));
        assert_eq!(state.cwd, PathBuf::from("/var"));
        assert!(state.home.is_none());
    }
}
