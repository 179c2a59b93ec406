// file: src/cli/prompt.rs
// version: 1.0.0
// guid: prompt01-2345-6789-abcd-ef0123456789

//! Operator questions before a run

use crate::Result;
use std::io::{self, BufRead, Write};

/// Source of operator answers
pub trait Prompter {
    fn confirm(&mut self, question: &str, default: bool) -> Result<bool>;

    /// Free-form answer; an empty reply means `default`
    fn ask(&mut self, question: &str, default: &str) -> Result<String>;
}

/// Answers every question with its default
#[derive(Debug, Default)]
pub struct UnattendedPrompter;

impl Prompter for UnattendedPrompter {
    fn confirm(&mut self, _question: &str, default: bool) -> Result<bool> {
        Ok(default)
    }

    fn ask(&mut self, _question: &str, default: &str) -> Result<String> {
        Ok(default.to_string())
    }
}

/// Line-based prompts on any reader and writer, stdin/stdout by default
pub struct TerminalPrompter<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_answer(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{} ", prompt)?;
        self.output.flush()?;
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let answer = self.read_answer(&format!("{} {}", question, hint))?;
            match answer.to_ascii_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "Please answer y or n.")?,
            }
        }
    }

    fn ask(&mut self, question: &str, default: &str) -> Result<String> {
        let answer = self.read_answer(&format!("{} [{}]", question, default))?;
        Ok(if answer.is_empty() {
            default.to_string()
        } else {
            answer
        })
    }
}
