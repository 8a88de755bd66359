use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::ast::{BuiltinCommand, Input};
use crate::builtins::get_builtin;
use crate::executor::{JobEvent, Spawner};
use crate::parser::route;
use crate::reader::{Prompter, ReaderEvent};
use crate::signals::{self, Action, Control, OsSignals};
use crate::state::ShellState;
use crate::supervisor::Supervisor;
use crate::terminal::Terminal;

pub const FAREWELL: &str = "Exiting jobsh...";

/// What the event loop should do after handling one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Every job has been killed; leave with status 0.
    Exit,
    /// Leave immediately, jobs untouched.
    ForceQuit,
}

pub struct Shell<S: Spawner, T: Terminal> {
    pub state: ShellState,
    pub supervisor: Supervisor<S, T>,
}

impl<S: Spawner, T: Terminal> Shell<S, T> {
    pub fn new(state: ShellState, spawner: S, terminal: T) -> Self {
        Self {
            state,
            supervisor: Supervisor::new(spawner, terminal),
        }
    }

    pub fn handle_line(&mut self, line: &str) -> Flow {
        match route(line, self.supervisor.foreground().is_some()) {
            Input::ForegroundInput(text) => {
                self.supervisor.forward_input(&text);
                Flow::Continue
            }
            Input::Empty => Flow::Continue,
            Input::Spawn(command_line) => {
                if let Err(e) = self.supervisor.spawn(&command_line, &self.state.cwd) {
                    self.supervisor.terminal_mut().print_line(&e.to_string());
                }
                Flow::Continue
            }
            Input::Builtin(builtin) => self.run_builtin(builtin),
        }
    }

    fn run_builtin(&mut self, builtin: BuiltinCommand) -> Flow {
        debug!(builtin = builtin.name(), "running builtin");
        match builtin {
            BuiltinCommand::Exit => {
                let killed = self.supervisor.terminate_all();
                debug!(count = killed.len(), "shutting down");
                self.supervisor.terminal_mut().print_line(FAREWELL);
                Flow::Exit
            }
            BuiltinCommand::Fg(arg) => {
                if let Err(e) = self.supervisor.resume_by_arg(arg.as_deref()) {
                    self.supervisor.terminal_mut().print_line(&e.to_string());
                }
                Flow::Continue
            }
            other => {
                if let Some(cmd) = get_builtin(&other) {
                    let out = self.supervisor.terminal_mut();
                    if let Err(e) = cmd.execute(&mut self.state, &mut *out) {
                        out.print_line(&e.to_string());
                    }
                }
                Flow::Continue
            }
        }
    }

    pub fn handle_control(&mut self, control: Control) -> Flow {
        match signals::apply(control, &mut self.supervisor) {
            Action::Continue => Flow::Continue,
            Action::ForceQuit => Flow::ForceQuit,
        }
    }

    pub fn handle_job_event(&mut self, event: JobEvent) {
        self.supervisor.handle_event(event);
    }

    /// Print the ready line when a job transition changed it while the editor
    /// still shows the previous one.
    pub fn refresh_ready_line(&mut self, prompter: &mut Prompter) {
        let job_input = self.supervisor.foreground().is_some();
        if let Some(line) = prompter.refresh(self.prompt(), job_input) {
            self.supervisor.terminal_mut().print_line(line.trim_end());
        }
    }

    fn send_prompt(&self, prompter: &mut Prompter) -> bool {
        prompter.send(self.prompt(), self.supervisor.foreground().is_some())
    }

    /// Ready line: working directory when idle, the pid while a job runs.
    pub fn prompt(&self) -> String {
        match self.supervisor.foreground() {
            Some(id) => format!("jobsh > {} > ", id),
            None => format!("jobsh > {} $ ", self.state.cwd.display()),
        }
    }
}

/// The single event loop. Returns how the shell should end.
pub async fn run_loop<S: Spawner, T: Terminal>(
    shell: &mut Shell<S, T>,
    reader_events: &mut mpsc::UnboundedReceiver<ReaderEvent>,
    prompter: &mut Prompter,
    job_events: &mut mpsc::UnboundedReceiver<JobEvent>,
    os_signals: &mut OsSignals,
) -> Flow {
    if !shell.send_prompt(prompter) {
        return Flow::ForceQuit;
    }

    loop {
        tokio::select! {
            event = reader_events.recv() => {
                let Some(event) = event else {
                    warn!("line reader went away");
                    return Flow::ForceQuit;
                };
                let wants_prompt = event.wants_prompt();
                let flow = match event {
                    ReaderEvent::Line(line) => {
                        let flow = shell.handle_line(&line);
                        sync_process_cwd(&shell.state);
                        flow
                    }
                    ReaderEvent::Control(control) | ReaderEvent::Key(control) => {
                        shell.handle_control(control)
                    }
                };
                if flow != Flow::Continue {
                    return flow;
                }
                if !wants_prompt {
                    shell.refresh_ready_line(prompter);
                } else if !shell.send_prompt(prompter) {
                    return Flow::ForceQuit;
                }
            }
            Some(event) = job_events.recv() => {
                shell.handle_job_event(event);
                shell.refresh_ready_line(prompter);
            }
            control = os_signals.recv() => {
                let flow = shell.handle_control(control);
                if flow != Flow::Continue {
                    return flow;
                }
                shell.refresh_ready_line(prompter);
            }
        }
    }
}

// The editor's filename completion resolves against the process cwd
fn sync_process_cwd(state: &ShellState) {
    let current = std::env::current_dir().ok();
    if current.as_deref() != Some(state.cwd.as_path()) {
        if let Err(e) = std::env::set_current_dir(&state.cwd) {
            warn!(cwd = %state.cwd.display(), "failed to follow cd: {}", e);
        }
    }
}
