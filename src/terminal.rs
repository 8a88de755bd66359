use rustyline::ExternalPrinter;

/// Line sink for everything the shell shows the user.
pub trait Terminal {
    fn print_line(&mut self, line: &str);
}

/// Prints through the line editor so output lands above an active prompt
/// instead of inside it.
pub struct PrinterTerminal {
    printer: Box<dyn ExternalPrinter + Send>,
}

impl PrinterTerminal {
    pub fn new(printer: Box<dyn ExternalPrinter + Send>) -> Self {
        Self { printer }
    }
}

impl Terminal for PrinterTerminal {
    fn print_line(&mut self, line: &str) {
        // Outside raw mode the printer writes the message as-is
        let mut msg = String::with_capacity(line.len() + 1);
        msg.push_str(line);
        if !msg.ends_with('\n') {
            msg.push('\n');
        }
        if let Err(e) = self.printer.print(msg) {
            tracing::warn!("external printer failed: {}", e);
            println!("{}", line.trim_end_matches('\n'));
        }
    }
}

/// Keeps every printed line in memory.
#[derive(Debug, Default)]
pub struct BufferTerminal {
    lines: Vec<String>,
}

impl BufferTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }
}

impl Terminal for BufferTerminal {
    fn print_line(&mut self, line: &str) {
        // Multi-line messages are stored line by line
        self.lines.extend(line.lines().map(str::to_string));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl ExternalPrinter for Recorder {
        fn print(&mut self, msg: String) -> rustyline::Result<()> {
            self.0.lock().unwrap().push(msg);
            Ok(())
        }
    }

    #[test]
    fn test_printer_terminal_ends_every_message_with_newline() {
        let recorder = Recorder::default();
        let mut term = PrinterTerminal::new(Box::new(recorder.clone()));
        term.print_line("a.txt");
        term.print_line("b.txt");
        term.print_line("already terminated\n");
        term.print_line("");

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec!["a.txt\n", "b.txt\n", "already terminated\n", "\n"]
        );
    }

    #[test]
    fn test_buffer_terminal_splits_lines() {
        let mut term = BufferTerminal::new();
        term.print_line("one\ntwo");
        assert_eq!(term.take(), vec!["one", "two"]);
        assert!(term.lines().is_empty());
    }
}
