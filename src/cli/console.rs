use std::{
    io::{self, BufRead},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use dialoguer::{theme::ColorfulTheme, Select};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cli::output;
use crate::gateway::{value_to_text, PresentationGateway, Row};

/// Line source shared by the script loop and the disambiguation prompt, so a
/// script can answer a prompt on the line after the command that raised it.
pub struct ScriptInput {
    reader: Mutex<Box<dyn BufRead + Send>>,
}

impl ScriptInput {
    pub fn new(reader: Box<dyn BufRead + Send>) -> Self {
        Self {
            reader: Mutex::new(reader),
        }
    }

    pub fn stdin() -> Self {
        Self::new(Box::new(io::BufReader::new(io::stdin())))
    }

    /// Next line without its terminator, or `None` at end of input.
    pub fn next_line(&self) -> io::Result<Option<String>> {
        let mut reader = match self.reader.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Presentation gateway that renders to the terminal.
pub struct ConsoleGateway {
    script: Option<Arc<ScriptInput>>,
}

impl ConsoleGateway {
    pub fn interactive() -> Self {
        Self { script: None }
    }

    pub fn scripted(input: Arc<ScriptInput>) -> Self {
        Self {
            script: Some(input),
        }
    }

    fn choose_scripted(input: &ScriptInput, count: usize) -> Option<usize> {
        let answer = match input.next_line() {
            Ok(Some(line)) => line,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "failed to read selection");
                return None;
            }
        };
        let answer = answer.trim();
        if answer.is_empty() || answer.eq_ignore_ascii_case("cancel") {
            return None;
        }
        match answer.parse::<usize>() {
            Ok(choice) if (1..=count).contains(&choice) => Some(choice - 1),
            _ => {
                output::warning(format!("`{}` is not a choice between 1 and {}", answer, count));
                None
            }
        }
    }

    fn choose_interactive(title: &str, labels: &[String]) -> Option<usize> {
        let theme = ColorfulTheme::default();
        match Select::with_theme(&theme)
            .with_prompt(title)
            .items(labels)
            .default(0)
            .interact_opt()
        {
            Ok(choice) => choice,
            Err(err) => {
                warn!(error = %err, "selection prompt failed");
                None
            }
        }
    }
}

#[async_trait]
impl PresentationGateway for ConsoleGateway {
    fn show_error(&self, message: &str) {
        output::error(message);
    }

    fn show_message(&self, message: &str) {
        output::info(message);
    }

    fn focus(&self, field: &str) {
        debug!(field, "focus moved");
    }

    async fn show_disambiguation(&self, title: &str, rows: &[Row]) -> Option<Row> {
        let labels: Vec<String> = rows.iter().map(row_label).collect();
        let choice = match &self.script {
            Some(input) => {
                output::section(title);
                for (idx, label) in labels.iter().enumerate() {
                    println!("  {}. {}", idx + 1, label);
                }
                Self::choose_scripted(input, labels.len())
            }
            None => Self::choose_interactive(title, &labels),
        };
        choice.and_then(|idx| rows.get(idx).cloned())
    }
}

/// One-line rendering of a result row.
pub(crate) fn row_label(row: &Row) -> String {
    match row {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| format!("{}={}", key, value_to_text(value)))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join(" | "),
        other => value_to_text(other),
    }
}
