//! Output formatting for CLI

use crate::error::CliResult;
use clap::ValueEnum;
use colored::*;
use definer_interpreter::{Prompt, PromptKind};
use serde::Serialize;
use std::fmt::Display;

/// Output format for structured REPL output (expansions, flattenings)
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Render a value: `Display` for text, serde for the structured formats.
pub fn render<T: Serialize + Display>(data: &T, format: OutputFormat) -> CliResult<String> {
    Ok(match format {
        OutputFormat::Text => data.to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::Yaml => serde_yaml::to_string(data)?.trim_end().to_string(),
    })
}

/// Render a prompt line the way the REPL shows it.
pub fn format_prompt(prompt: &Prompt) -> String {
    let marker = match prompt.kind {
        PromptKind::Info => "?>".blue(),
        PromptKind::Diagnostic => "?>".yellow(),
        _ => "?>".red(),
    };
    let body = match prompt.kind {
        PromptKind::Info => prompt.message.normal(),
        PromptKind::Diagnostic => prompt.message.yellow(),
        _ => prompt.to_string().red(),
    };
    format!("{} {}", marker, body)
}

/// Render an error that discarded an input line.
pub fn format_error(message: &str) -> String {
    format!("{} {}", "✗".red(), message.red())
}

#[cfg(test)]
mod tests {
    use super::*;
    use definer_core::Expansion;

    #[test]
    fn render_expansion_formats() {
        colored::control::set_override(false);
        let expr = Expansion::Choice(vec![
            Expansion::Leaf("a".into()),
            Expansion::Sequence(vec![Expansion::Leaf("b".into())]),
        ]);
        assert_eq!(render(&expr, OutputFormat::Text).unwrap(), "(a | <b>)");
        assert!(render(&expr, OutputFormat::Json)
            .unwrap()
            .contains("\"shape\": \"choice\""));
        assert!(render(&expr, OutputFormat::Yaml)
            .unwrap()
            .contains("shape: choice"));
    }

    #[test]
    fn prompt_lines_carry_kind() {
        colored::control::set_override(false);
        assert_eq!(format_prompt(&Prompt::info("entered [a b]")), "?> entered [a b]");
        assert_eq!(
            format_prompt(&Prompt::usage(":bind needs two arguments")),
            "?> usage: :bind needs two arguments"
        );
    }
}
