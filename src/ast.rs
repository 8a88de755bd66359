// Classified shell input. Every completed line becomes exactly one `Input`.

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    // Any line typed while a job owns the foreground: "y", "quit", ""
    ForegroundInput(String),
    // A shell-internal command: "cd /tmp", "fg 1234"
    Builtin(BuiltinCommand),
    // Anything else: "sleep 10", "./server --port 80"
    Spawn(String),
    // Blank line with nothing in the foreground
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinCommand {
    Cd(Option<String>),
    Pwd,
    Ls(Option<String>),
    // Raw argument; validated when the job is looked up
    Fg(Option<String>),
    Exit,
    Help,
}

impl BuiltinCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinCommand::Cd(_) => "cd",
            BuiltinCommand::Pwd => "pwd",
            BuiltinCommand::Ls(_) => "ls",
            BuiltinCommand::Fg(_) => "fg",
            BuiltinCommand::Exit => "exit",
            BuiltinCommand::Help => "help",
        }
    }
}
