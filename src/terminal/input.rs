use std::io::{self, BufRead, Write};
use anyhow::Result;
use tokio::sync::mpsc;

use crate::core::options::PasteTerminator;

/// One event from standard input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Line(String),
    Eof,
}

/// Read stdin on a dedicated thread so the async loop can select on it
/// alongside Ctrl-C.
pub fn spawn_stdin_reader() -> mpsc::Receiver<InputEvent> {
    let (tx, rx) = mpsc::channel(100);

    std::thread::spawn(move || {
        let stdin = io::stdin();
        let mut handle = stdin.lock();

        loop {
            let mut line = String::new();
            let event = match handle.read_line(&mut line) {
                Ok(0) => InputEvent::Eof,
                Ok(_) => InputEvent::Line(line.trim_end_matches(['\r', '\n']).to_string()),
                Err(e) => {
                    log::warn!("Failed to read from stdin: {}", e);
                    InputEvent::Eof
                }
            };

            // Keep delivering EOF: a terminal can reopen after Ctrl-D
            if tx.blocking_send(event).is_err() {
                break;
            }
        }
    });

    rx
}

/// Accumulates pasted output until its terminator is seen.
#[derive(Debug)]
pub struct PasteCollector {
    terminator: PasteTerminator,
    lines: Vec<String>,
    trailing_blank: usize,
}

impl PasteCollector {
    pub fn new(terminator: PasteTerminator) -> Self {
        Self {
            terminator,
            lines: Vec::new(),
            trailing_blank: 0,
        }
    }

    /// Feed one event; returns `true` once the paste is complete.
    pub fn push(&mut self, event: InputEvent) -> bool {
        match event {
            InputEvent::Eof => true,
            InputEvent::Line(line) => {
                if line.trim().is_empty() {
                    self.trailing_blank += 1;
                } else {
                    self.trailing_blank = 0;
                }
                self.lines.push(line);

                match self.terminator {
                    PasteTerminator::BlankLines(count) => self.trailing_blank >= count,
                    PasteTerminator::EndOfInput => false,
                }
            }
        }
    }

    /// The collected text without the terminating blank lines.
    pub fn finish(self) -> String {
        let mut lines = self.lines;
        while lines.last().map_or(false, |line| line.trim().is_empty()) {
            lines.pop();
        }
        lines.join("\n")
    }
}

pub fn prompt(text: &str) -> Result<()> {
    let mut stdout = io::stdout();
    print!("{}", text);
    stdout.flush()?;
    Ok(())
}

/// Yes/no answer; anything but `y`/`yes` is a no.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> InputEvent {
        InputEvent::Line(text.to_string())
    }

    #[test]
    fn blank_line_terminator_stops_after_two_blanks() {
        let mut collector = PasteCollector::new(PasteTerminator::BlankLines(2));
        assert!(!collector.push(line("PORT   STATE SERVICE")));
        assert!(!collector.push(line("")));
        assert!(!collector.push(line("22/tcp open  ssh")));
        assert!(!collector.push(line("")));
        assert!(collector.push(line("")));
        assert_eq!(collector.finish(), "PORT   STATE SERVICE\n\n22/tcp open  ssh");
    }

    #[test]
    fn end_of_input_terminator_keeps_blank_lines() {
        let mut collector = PasteCollector::new(PasteTerminator::EndOfInput);
        assert!(!collector.push(line("a")));
        assert!(!collector.push(line("")));
        assert!(!collector.push(line("")));
        assert!(!collector.push(line("b")));
        assert!(collector.push(InputEvent::Eof));
        assert_eq!(collector.finish(), "a\n\n\nb");
    }

    #[test]
    fn immediate_eof_is_empty_output() {
        let mut collector = PasteCollector::new(PasteTerminator::BlankLines(2));
        assert!(collector.push(InputEvent::Eof));
        assert_eq!(collector.finish(), "");
    }

    #[test]
    fn affirmative_answers() {
        assert!(is_affirmative("y"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative(""));
    }
}
