//! The job supervisor: owner of every spawned process.
//!
//! All job state lives here: the job table and the foreground slot. Nothing
//! else reads or writes it. Every method runs to completion on the event loop
//! thread, so no locking is involved; each one leaves these invariants intact:
//!
//! - at most one job is `Foreground`, and `foreground` names exactly that job;
//! - a job leaves the table in the same call that reports its termination;
//! - job output reaches the terminal only while that job is in the foreground.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::executor::{ExecError, JobEvent, KillSignal, Process, Spawner};
use crate::state::{ExitStatus, Job, JobId, JobState};
use crate::terminal::Terminal;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Could not start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: ExecError,
    },
    #[error("Process {0} died or doesn't exist")]
    NoSuchJob(String),
    #[error("Process {0} is already in the foreground")]
    AlreadyForeground(JobId),
}

pub struct Supervisor<S: Spawner, T> {
    spawner: S,
    terminal: T,
    jobs: BTreeMap<JobId, Job<S::Process>>,
    foreground: Option<JobId>,
    // Killed and already reported; their exit event is still in flight.
    // Kept so shutdown can signal them again if they outlived the kill.
    killed: BTreeMap<JobId, Job<S::Process>>,
}

impl<S: Spawner, T: Terminal> Supervisor<S, T> {
    pub fn new(spawner: S, terminal: T) -> Self {
        Self {
            spawner,
            terminal,
            jobs: BTreeMap::new(),
            foreground: None,
            killed: BTreeMap::new(),
        }
    }

    /// Start `command_line` as the new foreground job.
    ///
    /// Refuses while another job holds the foreground; that job would
    /// otherwise keep running with nobody reading its output.
    pub fn spawn(&mut self, command_line: &str, cwd: &Path) -> Result<JobId, JobError> {
        if let Some(current) = self.foreground {
            return Err(JobError::AlreadyForeground(current));
        }

        let process = self
            .spawner
            .spawn(command_line, cwd)
            .map_err(|source| JobError::Spawn {
                command: command_line.to_string(),
                source,
            })?;
        let job = Job::new(command_line.to_string(), process);
        let id = job.id;
        self.jobs.insert(id, job);
        self.foreground = Some(id);
        debug!(pid = %id, command = %command_line, "job started in foreground");
        Ok(id)
    }

    /// Write `line` to the foreground job. Returns false when there is no
    /// foreground job to receive it.
    pub fn forward_input(&mut self, line: &str) -> bool {
        let job = match self.foreground {
            Some(id) => self.jobs.get_mut(&id),
            None => None,
        };
        let Some(job) = job else {
            warn!("input forwarded with no foreground job");
            return false;
        };
        if let Err(e) = job.process.write_line(line) {
            warn!(pid = %job.id, "{}", e);
        }
        true
    }

    pub fn resume(&mut self, id: JobId) -> Result<(), JobError> {
        match self.jobs.get(&id).map(|job| job.state) {
            Some(JobState::Background) => {}
            _ => return Err(JobError::NoSuchJob(id.to_string())),
        }
        if let Some(current) = self.foreground {
            return Err(JobError::AlreadyForeground(current));
        }

        if let Some(job) = self.jobs.get_mut(&id) {
            job.state = JobState::Foreground;
        }
        self.foreground = Some(id);
        debug!(pid = %id, "job resumed");
        self.terminal
            .print_line(&format!("Brought process {} to foreground", id));
        Ok(())
    }

    /// `fg <arg>` with the argument still unparsed.
    pub fn resume_by_arg(&mut self, arg: Option<&str>) -> Result<(), JobError> {
        let raw = arg.unwrap_or_default();
        let id = raw
            .trim()
            .parse::<u32>()
            .map_err(|_| JobError::NoSuchJob(raw.to_string()))?;
        self.resume(JobId(id))
    }

    pub fn suspend_foreground(&mut self) {
        let Some(id) = self.foreground.take() else {
            self.terminal
                .print_line("No process running in foreground to send to background.");
            return;
        };
        if let Some(job) = self.jobs.get_mut(&id) {
            job.state = JobState::Background;
        }
        debug!(pid = %id, "job moved to background");
        self.terminal
            .print_line(&format!("Sent process with pid: {} to background.", id));
        self.terminal
            .print_line(&format!("    Use fg {} to bring it to foreground.", id));
    }

    /// Kill the foreground job. The job is reported and dropped right away;
    /// the process's own exit event is swallowed when it shows up.
    pub fn interrupt_foreground(&mut self) {
        let Some(id) = self.foreground.take() else {
            self.terminal.print_line(
                "No process running in foreground to kill. Use exit to quit jobsh.",
            );
            return;
        };
        if let Some(mut job) = self.jobs.remove(&id) {
            if let Err(e) = job.process.kill(KillSignal::Interrupt) {
                warn!(pid = %id, "{}", e);
            }
            job.state = JobState::Terminated;
            self.killed.insert(id, job);
        }
        self.terminal
            .print_line(&format!("Killed process with pid: {}", id));
    }

    /// Kill every tracked job, including interrupted jobs that have not
    /// exited yet. Returns the ids that were sent a kill request.
    pub fn terminate_all(&mut self) -> Vec<JobId> {
        self.foreground = None;
        for (id, mut job) in std::mem::take(&mut self.jobs) {
            if !job.is_live() {
                continue;
            }
            job.state = JobState::Terminated;
            self.killed.insert(id, job);
        }

        let mut sent = Vec::with_capacity(self.killed.len());
        for (id, job) in self.killed.iter_mut() {
            if let Err(e) = job.process.kill(KillSignal::Terminate) {
                warn!(pid = %id, "{}", e);
            }
            sent.push(*id);
        }
        debug!(count = sent.len(), "terminated all jobs");
        sent
    }

    pub fn handle_event(&mut self, event: JobEvent) {
        match event {
            JobEvent::Output { id, line } => {
                if self.foreground == Some(id) {
                    self.terminal.print_line(&line);
                } else {
                    trace!(pid = %id, "dropped output of background job");
                }
            }
            JobEvent::Exited { id, status } => self.on_exit(id, status),
        }
    }

    fn on_exit(&mut self, id: JobId, status: ExitStatus) {
        if self.killed.remove(&id).is_some() {
            trace!(pid = %id, "exit of killed job already reported");
            return;
        }
        let Some(mut job) = self.jobs.remove(&id) else {
            debug!(pid = %id, "exit event for untracked process");
            return;
        };
        job.state = JobState::Terminated;
        job.exit_status = Some(status);

        if self.foreground == Some(id) {
            self.foreground = None;
            self.terminal
                .print_line(&format!("Child process exited with {}", status));
        } else {
            debug!(pid = %id, command = %job.command, %status, "background job exited");
        }
    }

    pub fn foreground(&self) -> Option<JobId> {
        self.foreground
    }

    pub fn state_of(&self, id: JobId) -> Option<JobState> {
        self.jobs.get(&id).map(|job| job.state)
    }

    /// Killed jobs whose exit has not been observed yet.
    pub fn pending_kills(&self) -> Vec<JobId> {
        self.killed.keys().copied().collect()
    }

    pub fn job(&self, id: JobId) -> Option<&Job<S::Process>> {
        self.jobs.get(&id)
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        self.jobs.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    pub fn terminal_mut(&mut self) -> &mut T {
        &mut self.terminal
    }
}
