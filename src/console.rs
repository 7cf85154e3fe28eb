use std::collections::VecDeque;
use std::sync::Arc;

use crate::completion::CompletionRequest;
use crate::runtime::{CompletionTarget, ScriptRuntime};

pub const CONSOLE_CAPACITY: usize = 200;
pub const HISTORY_CAPACITY: usize = 64;

const HELP: &str = "\
:complete <text>  list completions for a script expression
:jsp <args>       list completions for a registered command
:load <path>      load a script through the module cache
:help             show this message
anything else is evaluated with every global in scope";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleEntryKind {
    Input,
    Output,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleEntry {
    pub kind: ConsoleEntryKind,
    pub text: String,
}

/// Line-oriented front end over a [`ScriptRuntime`] with bounded scrollback and history.
pub struct ScriptConsole {
    runtime: Arc<ScriptRuntime>,
    scrollback: VecDeque<ConsoleEntry>,
    history: VecDeque<String>,
    scrollback_capacity: usize,
    history_capacity: usize,
}

impl ScriptConsole {
    pub fn new(runtime: Arc<ScriptRuntime>) -> Self {
        Self::with_capacity(runtime, CONSOLE_CAPACITY, HISTORY_CAPACITY)
    }

    pub fn with_capacity(runtime: Arc<ScriptRuntime>, scrollback: usize, history: usize) -> Self {
        Self {
            runtime,
            scrollback: VecDeque::new(),
            history: VecDeque::new(),
            scrollback_capacity: scrollback.max(1),
            history_capacity: history.max(1),
        }
    }

    pub fn runtime(&self) -> &Arc<ScriptRuntime> {
        &self.runtime
    }

    pub fn scrollback(&self) -> impl Iterator<Item = &ConsoleEntry> {
        self.scrollback.iter()
    }

    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    /// Runs one line of input and returns the entries it produced, newest last.
    pub fn execute(&mut self, line: &str) -> Vec<ConsoleEntry> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        self.append_history(trimmed);
        let mut produced = vec![ConsoleEntry { kind: ConsoleEntryKind::Input, text: format!("> {trimmed}") }];
        produced.extend(self.dispatch(trimmed));
        for entry in &produced {
            self.push(entry.clone());
        }
        produced
    }

    fn dispatch(&self, line: &str) -> Vec<ConsoleEntry> {
        let (directive, rest) = match line.split_once(' ') {
            Some((head, rest)) => (head, rest),
            None => (line, ""),
        };
        match directive {
            ":help" => vec![output(HELP)],
            ":complete" => {
                let request = CompletionRequest::from_input(rest);
                let candidates =
                    self.runtime.tab_complete(&request.line, &request.last_token, CompletionTarget::GeneralEval);
                vec![output(candidates.join("\n"))]
            }
            ":jsp" => {
                let candidates = self.runtime.tab_complete(rest, "", CompletionTarget::RegisteredCommand);
                vec![output(candidates.join("\n"))]
            }
            ":load" => {
                if rest.trim().is_empty() {
                    return vec![error(":load needs a path")];
                }
                match self.runtime.load(rest.trim(), true) {
                    Ok(Some(value)) => vec![output(value.to_string())],
                    Ok(None) => vec![error(format!("{} did not load", rest.trim()))],
                    Err(err) => vec![error(format!("{err:#}"))],
                }
            }
            _ if directive.starts_with(':') => {
                vec![error(format!("Unknown console command '{directive}'. Try :help."))]
            }
            _ => match self.runtime.eval(line) {
                Ok(value) if value.is_unit() => Vec::new(),
                Ok(value) => vec![output(value.to_string())],
                Err(err) => vec![error(err.to_string())],
            },
        }
    }

    fn push(&mut self, entry: ConsoleEntry) {
        self.scrollback.push_back(entry);
        while self.scrollback.len() > self.scrollback_capacity {
            self.scrollback.pop_front();
        }
    }

    fn append_history(&mut self, command: &str) {
        if self.history.back().map(String::as_str) == Some(command) {
            return;
        }
        self.history.push_back(command.to_string());
        while self.history.len() > self.history_capacity {
            self.history.pop_front();
        }
    }
}

fn output(text: impl Into<String>) -> ConsoleEntry {
    ConsoleEntry { kind: ConsoleEntryKind::Output, text: text.into() }
}

fn error(text: impl Into<String>) -> ConsoleEntry {
    ConsoleEntry { kind: ConsoleEntryKind::Error, text: text.into() }
}
