//! Multi-session read-eval-print loop
//!
//! Every session owns its own concept graph. Lines beginning with `:/` are
//! handled here and never reach a session; anything else is interpreted by
//! the current session.

use crate::config::DefinerConfig;
use crate::error::{CliError, CliResult};
use crate::output::{format_error, format_prompt, render, OutputFormat};
use definer_core::{expand, flatten_bounded, ConceptId, Expansion, Flattened};
use definer_interpreter::Session;
use serde::Serialize;
use std::fmt;
use std::io::{BufRead, Write};
use tracing::{debug, warn};

const META_PREFIX: &str = ":/";

const META_HELP: &[(&str, &str)] = &[
    ("list", "list sessions, marking the current one"),
    ("switch N", "make session N current"),
    ("create", "start a new session"),
    ("finish", "close the current session"),
    ("show_expanded [IDX|:]...", "print the expansion of the current concept or a child"),
    ("flatten [IDX]...", "print every token sequence the concept stands for"),
    ("help", "show this help"),
    ("quit", "leave the front end"),
];

enum Flow {
    Continue,
    Quit,
}

/// The front end's session list and the loop driving it.
pub struct Repl {
    sessions: Vec<Session>,
    current: Option<usize>,
    config: DefinerConfig,
    format: OutputFormat,
}

impl Repl {
    /// Create a front end with one fresh session.
    pub fn new(config: DefinerConfig, format: OutputFormat) -> CliResult<Self> {
        let mut repl = Self {
            sessions: Vec::new(),
            current: None,
            config,
            format,
        };
        repl.create_session()?;
        repl.current = Some(0);
        Ok(repl)
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Read lines until end of input, `:/quit`, or every session is finished.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, out: &mut W) -> CliResult<()> {
        let mut line = String::new();
        while let Some(index) = self.current {
            self.show_header(index, out)?;
            line.clear();
            if input.read_line(&mut line)? == 0 {
                writeln!(out)?;
                break;
            }
            let trimmed = line.trim_end_matches(['\r', '\n']);
            match self.evaluate(trimmed, out)? {
                Flow::Continue => {}
                Flow::Quit => break,
            }
        }
        out.flush()?;
        Ok(())
    }

    fn evaluate<W: Write>(&mut self, line: &str, out: &mut W) -> CliResult<Flow> {
        if let Some(meta) = line.trim_start().strip_prefix(META_PREFIX) {
            return self.meta_command(meta, out);
        }
        let Some(session) = self.current_session_mut() else {
            return Ok(Flow::Quit);
        };
        if let Err(e) = session.interpret(line) {
            warn!(error = %e, "input line discarded");
            writeln!(out, "{}", format_error(&e.to_string()))?;
        }
        Ok(Flow::Continue)
    }

    fn show_header<W: Write>(&mut self, index: usize, out: &mut W) -> CliResult<()> {
        let prompt_text = self.config.repl.prompt.clone();
        let session = self
            .sessions
            .get_mut(index)
            .ok_or_else(|| CliError::InvalidArgument(format!("no session {}", index)))?;
        writeln!(out, "===")?;
        writeln!(out, "{}", session.state().current_label())?;
        for prompt in session.take_prompts() {
            writeln!(out, "{}", format_prompt(&prompt))?;
        }
        writeln!(out, "===")?;
        write!(out, "{}", prompt_text)?;
        out.flush()?;
        Ok(())
    }

    // ── Meta commands ────────────────────────────────────────────────

    fn meta_command<W: Write>(&mut self, meta: &str, out: &mut W) -> CliResult<Flow> {
        let mut words = meta.split_whitespace();
        let name = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();
        debug!(command = name, args = ?args, "meta command");

        let result = match name {
            "list" => self.list(out),
            "switch" => self.switch(&args, out),
            "create" => self.create(out),
            "finish" => self.finish(out),
            "show_expanded" => self.show_expanded(&args, out),
            "flatten" => self.flatten(&args, out),
            "help" | "" => self.help(out),
            "quit" | "exit" => return Ok(Flow::Quit),
            other => Err(CliError::InvalidArgument(format!(
                "unknown meta command ':/{}' (try ':/help')",
                other
            ))),
        };

        match result {
            Ok(()) => {}
            Err(CliError::Io(e)) => return Err(CliError::Io(e)),
            Err(e) => writeln!(out, "{}", format_error(&e.to_string()))?,
        }
        Ok(Flow::Continue)
    }

    fn list<W: Write>(&self, out: &mut W) -> CliResult<()> {
        for (i, session) in self.sessions.iter().enumerate() {
            let marker = if Some(i) == self.current { " *" } else { "  " };
            writeln!(out, "{}{}: {}", i, marker, session.state().current_label())?;
        }
        Ok(())
    }

    fn switch<W: Write>(&mut self, args: &[&str], out: &mut W) -> CliResult<()> {
        let [arg] = args else {
            return Err(CliError::InvalidArgument(
                ":/switch takes one session index".into(),
            ));
        };
        let index = self.session_index(arg)?;
        self.current = Some(index);
        writeln!(out, "switched to session {}", index)?;
        Ok(())
    }

    fn create<W: Write>(&mut self, out: &mut W) -> CliResult<()> {
        let index = self.create_session()?;
        writeln!(out, "created session {}", index)?;
        Ok(())
    }

    fn finish<W: Write>(&mut self, out: &mut W) -> CliResult<()> {
        let Some(index) = self.current else {
            return Ok(());
        };
        if index < self.sessions.len() {
            self.sessions.remove(index);
        }
        debug!(session = index, remaining = self.sessions.len(), "session finished");
        self.current = match self.sessions.len() {
            0 => None,
            _ => Some(index.saturating_sub(1)),
        };
        writeln!(out, "finished session {}", index)?;
        Ok(())
    }

    fn show_expanded<W: Write>(&self, args: &[&str], out: &mut W) -> CliResult<()> {
        let session = self.current_session()?;
        let graph = session.graph();
        let (target, all_children) = self.navigate(session, args)?;
        let text = if all_children {
            let expansions = graph
                .children(target)
                .map_err(|e| CliError::InvalidArgument(e.to_string()))?
                .iter()
                .map(|child| expand(graph, *child))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
            render(&ExpansionList(expansions), self.format)?
        } else {
            let expansion =
                expand(graph, target).map_err(|e| CliError::InvalidArgument(e.to_string()))?;
            render(&expansion, self.format)?
        };
        writeln!(out, "{}", text)?;
        Ok(())
    }

    fn flatten<W: Write>(&self, args: &[&str], out: &mut W) -> CliResult<()> {
        let session = self.current_session()?;
        let (target, all_children) = self.navigate(session, args)?;
        if all_children {
            return Err(CliError::InvalidArgument(
                ":/flatten takes child indices only".into(),
            ));
        }
        let expansion = expand(session.graph(), target)
            .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
        let limit = session.state().settings.max_flattened_alternatives;
        let view = FlattenedView {
            limit,
            flattened: flatten_bounded(&expansion, limit),
        };
        writeln!(out, "{}", render(&view, self.format)?)?;
        Ok(())
    }

    fn help<W: Write>(&self, out: &mut W) -> CliResult<()> {
        writeln!(out, "meta commands:")?;
        for (usage, about) in META_HELP {
            writeln!(out, "  {}{:<26} {}", META_PREFIX, usage, about)?;
        }
        if let Ok(session) = self.current_session() {
            let names: Vec<&str> = session.registry().names().collect();
            writeln!(out, "concept commands: :{}", names.join(" :"))?;
        }
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn create_session(&mut self) -> CliResult<usize> {
        let session = Session::new(self.config.analyzers()?, self.config.session_settings())?;
        self.sessions.push(session);
        let index = self.sessions.len() - 1;
        debug!(session = index, "session created");
        Ok(index)
    }

    fn current_session(&self) -> CliResult<&Session> {
        self.current
            .and_then(|i| self.sessions.get(i))
            .ok_or_else(|| CliError::InvalidArgument("no current session".into()))
    }

    fn current_session_mut(&mut self) -> Option<&mut Session> {
        self.current.and_then(|i| self.sessions.get_mut(i))
    }

    fn session_index(&self, arg: &str) -> CliResult<usize> {
        arg.parse::<usize>()
            .ok()
            .filter(|i| *i < self.sessions.len())
            .ok_or_else(|| {
                CliError::InvalidArgument(format!(
                    "no session '{}' ({} open)",
                    arg,
                    self.sessions.len()
                ))
            })
    }

    /// Walk child indices from the current concept; a trailing `:` selects all children.
    fn navigate(&self, session: &Session, args: &[&str]) -> CliResult<(ConceptId, bool)> {
        let graph = session.graph();
        let mut target = session.current();
        for (pos, arg) in args.iter().enumerate() {
            if *arg == ":" {
                if pos + 1 != args.len() {
                    return Err(CliError::InvalidArgument("':' must come last".into()));
                }
                return Ok((target, true));
            }
            let children = graph
                .children(target)
                .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
            target = arg
                .parse::<usize>()
                .ok()
                .and_then(|i| children.get(i).copied())
                .ok_or_else(|| {
                    CliError::InvalidArgument(format!(
                        "no child '{}' under {} ({} children)",
                        arg,
                        graph.describe(target),
                        children.len()
                    ))
                })?;
        }
        Ok((target, false))
    }
}

#[derive(Serialize)]
#[serde(transparent)]
struct ExpansionList(Vec<Expansion>);

impl fmt::Display for ExpansionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, expansion) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", i, expansion)?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct FlattenedView {
    limit: usize,
    #[serde(flatten)]
    flattened: Flattened,
}

impl fmt::Display for FlattenedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, alternative) in self.flattened.alternatives.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", alternative.join(" "))?;
        }
        if self.flattened.truncated {
            write!(f, "\n... (stopped after {} alternatives)", self.limit)?;
        }
        Ok(())
    }
}
