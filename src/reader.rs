//! Line reader: rustyline on a dedicated thread.
//!
//! The editor blocks, so it cannot live on the event loop. It owns nothing
//! but the editor and talks to the loop through two channels: events go out
//! on a tokio channel, and the prompt for the next line comes back on a std
//! channel. Every event that ends a `readline` call waits for that reply, so
//! the prompt always reflects the state after the previous line was handled.
//! A job transition while the editor waits (an exit, Ctrl-Z) is shown by
//! printing the new ready line above the old prompt.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use rustyline::config::{Config, EditMode};
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{
    Cmd, ConditionalEventHandler, Editor, Event, EventContext, EventHandler, ExternalPrinter,
    KeyEvent, RepeatCount,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::helper::ShellHelper;
use crate::signals::Control;

#[derive(Debug, Clone, PartialEq)]
pub enum ReaderEvent {
    Line(String),
    /// `readline` ended on a control key (Ctrl-C, Ctrl-D).
    Control(Control),
    /// Control key pressed mid-line; editing continues.
    Key(Control),
}

impl ReaderEvent {
    /// Whether the reader is blocked until a new prompt is sent back.
    pub fn wants_prompt(&self) -> bool {
        !matches!(self, ReaderEvent::Key(_))
    }
}

pub type Printer = Box<dyn ExternalPrinter + Send>;

/// The event loop's end of the prompt handshake.
pub struct Prompter {
    prompts: std_mpsc::Sender<String>,
    // Read by the editor's highlighter
    job_input: Arc<AtomicBool>,
    shown: String,
}

impl Prompter {
    pub fn new(prompts: std_mpsc::Sender<String>, job_input: Arc<AtomicBool>) -> Self {
        Self {
            prompts,
            job_input,
            shown: String::new(),
        }
    }

    /// Hand the reader its next prompt. False once the reader is gone.
    pub fn send(&mut self, prompt: String, job_owns_input: bool) -> bool {
        self.job_input.store(job_owns_input, Ordering::Relaxed);
        self.shown.clone_from(&prompt);
        self.prompts.send(prompt).is_ok()
    }

    /// Record the ready line for the current state while `readline` is still
    /// running. Returns it when it differs from what was last shown.
    pub fn refresh(&mut self, prompt: String, job_owns_input: bool) -> Option<String> {
        self.job_input.store(job_owns_input, Ordering::Relaxed);
        if prompt == self.shown {
            return None;
        }
        self.shown.clone_from(&prompt);
        Some(prompt)
    }
}

pub struct LineReader {
    pub events: mpsc::UnboundedReceiver<ReaderEvent>,
    pub prompter: Prompter,
    thread: JoinHandle<()>,
}

impl LineReader {
    /// Start the editor thread. Returns once the editor is ready, together
    /// with a printer that writes above the active prompt.
    pub fn spawn(history_path: Option<PathBuf>) -> Result<(Self, Printer)> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (prompt_tx, prompt_rx) = std_mpsc::channel::<String>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<Printer>>();
        let job_input = Arc::new(AtomicBool::new(false));
        let helper_flag = job_input.clone();

        let thread = thread::Builder::new()
            .name("line-reader".to_string())
            .spawn(move || {
                let mut rl = match build_editor(event_tx.clone(), helper_flag, history_path.as_ref()) {
                    Ok(rl) => rl,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let printer = rl
                    .create_external_printer()
                    .map(|p| Box::new(p) as Printer)
                    .context("Failed to create external printer");
                let ok = printer.is_ok();
                let _ = ready_tx.send(printer);
                if ok {
                    read_loop(&mut rl, &event_tx, &prompt_rx);
                    save_history(&mut rl, history_path.as_ref());
                }
            })
            .context("Failed to spawn line reader thread")?;

        let printer = ready_rx
            .recv()
            .context("Line reader thread exited during startup")??;

        let reader = Self {
            events: event_rx,
            prompter: Prompter::new(prompt_tx, job_input),
            thread,
        };
        Ok((reader, printer))
    }

    /// Wait for the reader to save history and stop. The reader stops once
    /// the prompt sender is gone.
    pub fn join(self) {
        let LineReader {
            events,
            prompter,
            thread,
        } = self;
        drop(prompter);
        drop(events);
        if thread.join().is_err() {
            warn!("line reader thread panicked");
        }
    }
}

struct SuspendKey {
    events: mpsc::UnboundedSender<ReaderEvent>,
}

impl ConditionalEventHandler for SuspendKey {
    fn handle(&self, _evt: &Event, _n: RepeatCount, _positive: bool, _ctx: &EventContext) -> Option<Cmd> {
        let _ = self.events.send(ReaderEvent::Key(Control::Suspend));
        Some(Cmd::Noop)
    }
}

fn build_editor(
    events: mpsc::UnboundedSender<ReaderEvent>,
    job_input: Arc<AtomicBool>,
    history_path: Option<&PathBuf>,
) -> Result<Editor<ShellHelper, FileHistory>> {
    let config = Config::builder()
        .edit_mode(EditMode::Emacs)
        .auto_add_history(false)
        .build();
    let mut rl = Editor::<ShellHelper, FileHistory>::with_config(config)
        .context("Failed to create line editor")?;
    rl.set_helper(Some(ShellHelper::new(job_input)));
    // Ctrl-Z must never stop the shell; it backgrounds the foreground job
    rl.bind_sequence(
        KeyEvent::ctrl('Z'),
        EventHandler::Conditional(Box::new(SuspendKey { events })),
    );

    if let Some(path) = history_path {
        if let Err(e) = rl.load_history(path) {
            let is_not_found = matches!(&e, ReadlineError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound);
            if !is_not_found {
                warn!("Failed to load history: {}", e);
            }
        }
    }
    Ok(rl)
}

fn read_loop(
    rl: &mut Editor<ShellHelper, FileHistory>,
    events: &mpsc::UnboundedSender<ReaderEvent>,
    prompts: &std_mpsc::Receiver<String>,
) {
    while let Ok(prompt) = prompts.recv() {
        let event = match rl.readline(&prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(e) = rl.add_history_entry(line.as_str()) {
                        warn!("Failed to add history entry: {}", e);
                    }
                }
                ReaderEvent::Line(line)
            }
            Err(ReadlineError::Interrupted) => ReaderEvent::Control(Control::Interrupt),
            Err(ReadlineError::Eof) => ReaderEvent::Control(Control::ForceQuit),
            Err(e) => {
                warn!("readline failed: {}", e);
                ReaderEvent::Control(Control::ForceQuit)
            }
        };
        if events.send(event).is_err() {
            break;
        }
    }
    debug!("line reader stopped");
}

fn save_history(rl: &mut Editor<ShellHelper, FileHistory>, history_path: Option<&PathBuf>) {
    let Some(path) = history_path else {
        return;
    };
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("Failed to create history directory: {}", e);
        }
    }
    if let Err(e) = rl.save_history(path) {
        warn!("Failed to save history: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wants_prompt() {
        assert!(ReaderEvent::Line("ls".into()).wants_prompt());
        assert!(ReaderEvent::Control(Control::Interrupt).wants_prompt());
        assert!(!ReaderEvent::Key(Control::Suspend).wants_prompt());
    }

    #[test]
    fn test_prompter_reports_changed_ready_line_once() {
        let (tx, rx) = std_mpsc::channel();
        let flag = Arc::new(AtomicBool::new(false));
        let mut prompter = Prompter::new(tx, flag.clone());

        assert!(prompter.send("jobsh > 7 > ".to_string(), true));
        assert_eq!(rx.recv().unwrap(), "jobsh > 7 > ");
        assert!(flag.load(Ordering::Relaxed));

        assert_eq!(prompter.refresh("jobsh > 7 > ".to_string(), true), None);
        assert_eq!(
            prompter.refresh("jobsh > / $ ".to_string(), false).as_deref(),
            Some("jobsh > / $ ")
        );
        assert_eq!(prompter.refresh("jobsh > / $ ".to_string(), false), None);
        assert!(!flag.load(Ordering::Relaxed));
        assert!(rx.try_recv().is_err());
    }
}
