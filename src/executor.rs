use crate::signals::kill_process;
use crate::state::{ExitStatus, JobId};
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse command line `{0}`: unbalanced quotes")]
    Syntax(String),
    #[error("`{0}` exited before reporting a pid")]
    NoPid(String),
    #[error("stdin of process {0} is closed")]
    StdinClosed(JobId),
    #[error("failed to signal process {pid}: {reason}")]
    Kill { pid: JobId, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a kill request should do to the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillSignal {
    /// Keyboard interrupt forwarded to the foreground job.
    Interrupt,
    /// Shell shutdown.
    Terminate,
}

/// Everything a running process reports back to the event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// One line of output, or the unterminated tail of a read such as an
    /// input prompt.
    Output { id: JobId, line: String },
    /// Sent once, after every output line of that process.
    Exited { id: JobId, status: ExitStatus },
}

/// A terminable process owned by the supervisor.
pub trait Process {
    fn pid(&self) -> JobId;
    /// Queue `line` plus a newline for the process's stdin. Never blocks.
    fn write_line(&mut self, line: &str) -> Result<(), ExecError>;
    fn kill(&mut self, signal: KillSignal) -> Result<(), ExecError>;
}

/// Creates processes whose output and exit arrive as `JobEvent`s.
pub trait Spawner {
    type Process: Process;

    fn spawn(&mut self, command_line: &str, cwd: &Path) -> Result<Self::Process, ExecError>;
}

// --- OS adapter ---

/// Spawns real child processes on the current tokio runtime.
pub struct OsSpawner {
    events: mpsc::UnboundedSender<JobEvent>,
}

impl OsSpawner {
    pub fn new(events: mpsc::UnboundedSender<JobEvent>) -> Self {
        Self { events }
    }
}

pub struct OsProcess {
    id: JobId,
    stdin: mpsc::UnboundedSender<Vec<u8>>,
}

impl Process for OsProcess {
    fn pid(&self) -> JobId {
        self.id
    }

    fn write_line(&mut self, line: &str) -> Result<(), ExecError> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.stdin
            .send(bytes)
            .map_err(|_| ExecError::StdinClosed(self.id))
    }

    fn kill(&mut self, signal: KillSignal) -> Result<(), ExecError> {
        kill_process(self.id, signal)
    }
}

impl Spawner for OsSpawner {
    type Process = OsProcess;

    fn spawn(&mut self, command_line: &str, cwd: &Path) -> Result<OsProcess, ExecError> {
        let args = shellwords::split(command_line)
            .map_err(|_| ExecError::Syntax(command_line.to_string()))?;
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| ExecError::Syntax(command_line.to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(rest)
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group: terminal-generated signals reach only the shell,
        // which decides what to forward.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            command: program.clone(),
            source,
        })?;
        let id = child
            .id()
            .map(JobId)
            .ok_or_else(|| ExecError::NoPid(program.clone()))?;
        debug!(pid = %id, command = %command_line, "spawned");

        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
        if let Some(stdin) = child.stdin.take() {
            tokio::spawn(write_stdin(id, stdin, stdin_rx));
        }

        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump_output(id, stdout, self.events.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump_output(id, stderr, self.events.clone())));
        }
        tokio::spawn(wait_child(id, child, pumps, self.events.clone()));

        Ok(OsProcess {
            id,
            stdin: stdin_tx,
        })
    }
}

async fn write_stdin(id: JobId, mut stdin: ChildStdin, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(bytes) = rx.recv().await {
        let written = match stdin.write_all(&bytes).await {
            Ok(()) => stdin.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            warn!(pid = %id, "stdin write failed: {}", e);
            break;
        }
    }
}

const READ_CHUNK: usize = 4096;

async fn pump_output<R>(id: JobId, mut stream: R, events: mpsc::UnboundedSender<JobEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    let mut pending = Vec::new();
    loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!(pid = %id, "output read failed: {}", e);
                break;
            }
        };
        pending.extend_from_slice(&chunk[..n]);
        if !drain_output(id, &mut pending, &events) {
            return;
        }
    }
    if !pending.is_empty() {
        send_output(id, &pending, &events);
    }
}

/// Send every complete line in `pending`, then the rest of it, so a prompt
/// without a newline shows up while the child waits for input. Only a
/// truncated UTF-8 sequence at the very end stays behind for the next read.
fn drain_output(id: JobId, pending: &mut Vec<u8>, events: &mpsc::UnboundedSender<JobEvent>) -> bool {
    while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
        let rest = pending.split_off(pos + 1);
        let line = std::mem::replace(pending, rest);
        if !send_output(id, &line, events) {
            return false;
        }
    }

    let keep = match std::str::from_utf8(pending.as_slice()) {
        Err(e) if e.error_len().is_none() => pending.len() - e.valid_up_to(),
        _ => 0,
    };
    if pending.len() == keep {
        return true;
    }
    let tail = pending.split_off(pending.len() - keep);
    let text = std::mem::replace(pending, tail);
    send_output(id, &text, events)
}

fn send_output(id: JobId, bytes: &[u8], events: &mpsc::UnboundedSender<JobEvent>) -> bool {
    let line = String::from_utf8_lossy(bytes)
        .trim_end_matches(['\n', '\r'])
        .to_string();
    events.send(JobEvent::Output { id, line }).is_ok()
}

// The exit event goes out only after both pumps hit EOF, so it can never
// overtake the job's own output on the channel.
async fn wait_child(
    id: JobId,
    mut child: Child,
    pumps: Vec<JoinHandle<()>>,
    events: mpsc::UnboundedSender<JobEvent>,
) {
    for pump in pumps {
        let _ = pump.await;
    }
    let status = match child.wait().await {
        Ok(status) => exit_status(status),
        Err(e) => {
            warn!(pid = %id, "wait failed: {}", e);
            ExitStatus::Unknown
        }
    };
    debug!(pid = %id, %status, "exited");
    let _ = events.send(JobEvent::Exited { id, status });
}

fn exit_status(status: std::process::ExitStatus) -> ExitStatus {
    if let Some(code) = status.code() {
        return ExitStatus::Code(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return ExitStatus::Signaled(sig);
        }
    }
    ExitStatus::Unknown
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    async fn collect(rx: &mut mpsc::UnboundedReceiver<JobEvent>, id: JobId) -> (Vec<String>, ExitStatus) {
        let mut lines = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                JobEvent::Output { id: from, line } if from == id => lines.push(line),
                JobEvent::Exited { id: from, status } if from == id => return (lines, status),
                _ => {}
            }
        }
        panic!("event channel closed before exit of {}", id);
    }

    #[tokio::test]
    async fn test_output_precedes_exit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut spawner = OsSpawner::new(tx);
        let process = spawner
            .spawn("sh -c 'echo one; echo two >&2; exit 3'", Path::new("/"))
            .unwrap();

        let (mut lines, status) = collect(&mut rx, process.pid()).await;
        lines.sort();
        assert_eq!(lines, vec!["one", "two"]);
        assert_eq!(status, ExitStatus::Code(3));
    }

    #[tokio::test]
    async fn test_write_line_reaches_stdin() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut spawner = OsSpawner::new(tx);
        let mut process = spawner.spawn("head -n 1", Path::new("/")).unwrap();
        process.write_line("hello there").unwrap();

        let (lines, status) = collect(&mut rx, process.pid()).await;
        assert_eq!(lines, vec!["hello there"]);
        assert_eq!(status, ExitStatus::Code(0));
    }

    fn drained(rx: &mut mpsc::UnboundedReceiver<JobEvent>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(JobEvent::Output { line, .. }) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_drain_output_sends_lines_and_partial_tail() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pending = b"one\r\ntwo\n[y/N] ".to_vec();
        assert!(drain_output(JobId(1), &mut pending, &tx));
        assert!(pending.is_empty());
        assert_eq!(drained(&mut rx), vec!["one", "two", "[y/N] "]);
    }

    #[test]
    fn test_drain_output_holds_split_utf8() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pending = vec![b'c', b'a', b'f', 0xC3];
        assert!(drain_output(JobId(1), &mut pending, &tx));
        assert_eq!(pending, vec![0xC3]);
        assert_eq!(drained(&mut rx), vec!["caf"]);

        pending.extend_from_slice(&[0xA9, b'\n']);
        assert!(drain_output(JobId(1), &mut pending, &tx));
        assert_eq!(drained(&mut rx), vec!["é"]);
    }

    #[tokio::test]
    async fn test_unterminated_prompt_arrives_before_input() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut spawner = OsSpawner::new(tx);
        let mut process = spawner
            .spawn("sh -c 'printf \"Name: \"; read n; echo hi $n'", Path::new("/"))
            .unwrap();

        let first = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("prompt was held back")
            .unwrap();
        assert_eq!(
            first,
            JobEvent::Output {
                id: process.pid(),
                line: "Name: ".to_string()
            }
        );

        process.write_line("Ana").unwrap();
        let (lines, status) = collect(&mut rx, process.pid()).await;
        assert_eq!(lines, vec!["hi Ana"]);
        assert_eq!(status, ExitStatus::Code(0));
    }

    #[tokio::test]
    async fn test_spawn_missing_command() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut spawner = OsSpawner::new(tx);
        let err = spawner
            .spawn("definitely-not-a-real-command-xyz", Path::new("/"))
            .err()
            .unwrap();
        assert!(matches!(err, ExecError::Spawn { .. }));
        assert!(err.to_string().contains("definitely-not-a-real-command-xyz"));
    }

    #[tokio::test]
    async fn test_spawn_unbalanced_quotes() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut spawner = OsSpawner::new(tx);
        let err = spawner.spawn("echo 'oops", Path::new("/")).err().unwrap();
        assert!(matches!(err, ExecError::Syntax(_)));
    }

    #[tokio::test]
    async fn test_interrupt_kills_process() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut spawner = OsSpawner::new(tx);
        let mut process = spawner.spawn("sleep 30", Path::new("/")).unwrap();
        process.kill(KillSignal::Interrupt).unwrap();

        let (_, status) = collect(&mut rx, process.pid()).await;
        assert_eq!(status, ExitStatus::Signaled(nix::libc::SIGINT));
    }
}
