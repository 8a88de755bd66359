use rustyline::Context;
use rustyline::Helper;
use rustyline::Result;
use rustyline::completion::{Completer, FilenameCompleter, Pair};
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::Hinter;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::parser::parse_builtin;

pub struct ShellHelper {
    pub completer: FilenameCompleter,
    /// Set while a foreground job receives every typed line.
    job_input: Arc<AtomicBool>,
}

impl ShellHelper {
    pub fn new(job_input: Arc<AtomicBool>) -> Self {
        Self {
            completer: FilenameCompleter::new(),
            job_input,
        }
    }
}

impl Default for ShellHelper {
    fn default() -> Self {
        Self::new(Arc::new(AtomicBool::new(false)))
    }
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Result<(usize, Vec<Pair>)> {
        self.completer.complete(line, pos, ctx)
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<String> {
        None
    }
}

impl Validator for ShellHelper {
    fn validate(&self, _ctx: &mut ValidationContext) -> Result<ValidationResult> {
        // One line is always one command
        Ok(ValidationResult::Valid(None))
    }

    fn validate_while_typing(&self) -> bool {
        false
    }
}

impl Helper for ShellHelper {}

impl Highlighter for ShellHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        // The job gets the line verbatim; nothing here is a built-in
        if self.job_input.load(Ordering::Relaxed) {
            return Cow::Borrowed(line);
        }
        match highlight_builtin(line) {
            Some(colored) => Cow::Owned(colored),
            None => Cow::Borrowed(line),
        }
    }

    fn highlight_char(&self, line: &str, _pos: usize, _kind: CmdKind) -> bool {
        !line.is_empty()
    }
}

/// Built-in names are shown in green; everything else is left alone.
fn highlight_builtin(line: &str) -> Option<String> {
    parse_builtin(line)?;
    let start = line.len() - line.trim_start().len();
    let end = line[start..]
        .find(char::is_whitespace)
        .map_or(line.len(), |i| start + i);

    let mut highlighted = String::with_capacity(line.len() + 9);
    highlighted.push_str(&line[..start]);
    highlighted.push_str("\x1b[32m");
    highlighted.push_str(&line[start..end]);
    highlighted.push_str("\x1b[0m");
    highlighted.push_str(&line[end..]);
    Some(highlighted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_builtin() {
        assert_eq!(
            highlight_builtin("  cd /tmp").as_deref(),
            Some("  \x1b[32mcd\x1b[0m /tmp")
        );
        assert_eq!(highlight_builtin("exit").as_deref(), Some("\x1b[32mexit\x1b[0m"));
        assert_eq!(highlight_builtin("sleep 3"), None);
        assert_eq!(highlight_builtin(""), None);
    }

    #[test]
    fn test_no_builtin_color_while_job_owns_input() {
        let flag = Arc::new(AtomicBool::new(false));
        let helper = ShellHelper::new(flag.clone());
        assert_eq!(helper.highlight("exit", 4), "\x1b[32mexit\x1b[0m");

        flag.store(true, Ordering::Relaxed);
        assert!(matches!(helper.highlight("exit", 4), Cow::Borrowed("exit")));
    }
}
