use std::{io, sync::Arc};

use strsim::levenshtein;
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};
use tracing::info;

use crate::cli::console::{ConsoleGateway, ScriptInput};
use crate::cli::output;
use crate::cli::view::render_fields;
use crate::config::{ConfigError, ConfigManager};
use crate::errors::FormError;
use crate::form::{
    parse_key_chord, Direction, FormController, FormMode, KeyOutcome, LovOutcome, QueryOutcome,
};
use crate::gateway::PresentationGateway;
use crate::utils::build_info;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Readline(#[from] rustyline::error::ReadlineError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dialoguer(#[from] dialoguer::Error),
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    InvalidArguments(String),
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliMode {
    Interactive,
    Script,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopControl {
    Continue,
    Exit,
}

type CommandResult = Result<LoopControl, CommandError>;

pub(crate) struct CommandSpec {
    pub name: &'static str,
    pub usage: &'static str,
    pub summary: &'static str,
}

pub(crate) const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "set",
        usage: "set <field> [value...]",
        summary: "Type a value into a field",
    },
    CommandSpec {
        name: "focus",
        usage: "focus <field>",
        summary: "Move the cursor to a field",
    },
    CommandSpec {
        name: "key",
        usage: "key <chord>",
        summary: "Press a key, e.g. tab, shift+tab, f7, f8, f9, f10, esc",
    },
    CommandSpec {
        name: "next",
        usage: "next",
        summary: "Move to the next field",
    },
    CommandSpec {
        name: "prev",
        usage: "prev",
        summary: "Move to the previous field",
    },
    CommandSpec {
        name: "query",
        usage: "query",
        summary: "Enter query mode, or run the query when already in it",
    },
    CommandSpec {
        name: "execute",
        usage: "execute",
        summary: "Run the query built from the filled-in fields",
    },
    CommandSpec {
        name: "cancel",
        usage: "cancel",
        summary: "Leave query mode without querying",
    },
    CommandSpec {
        name: "save",
        usage: "save",
        summary: "Validate and save the current record",
    },
    CommandSpec {
        name: "clear",
        usage: "clear",
        summary: "Empty the form and start a new record",
    },
    CommandSpec {
        name: "lov",
        usage: "lov",
        summary: "Open the list of values for the focused field",
    },
    CommandSpec {
        name: "show",
        usage: "show",
        summary: "Print every field with its value and status",
    },
    CommandSpec {
        name: "init",
        usage: "init",
        summary: "Write the demo form definition and sample data",
    },
    CommandSpec {
        name: "version",
        usage: "version",
        summary: "Print build information",
    },
    CommandSpec {
        name: "help",
        usage: "help [command]",
        summary: "List commands or describe one",
    },
    CommandSpec {
        name: "exit",
        usage: "exit",
        summary: "Leave the shell",
    },
];

pub(crate) fn command_names() -> Vec<&'static str> {
    COMMANDS.iter().map(|spec| spec.name).collect()
}

/// Everything a shell session needs: the live form, its config and the
/// runtime used to drive the form's async operations.
pub struct ShellContext {
    pub(crate) mode: CliMode,
    pub(crate) running: bool,
    runtime: Runtime,
    config: ConfigManager,
    form: FormController,
}

impl ShellContext {
    pub fn new(
        mode: CliMode,
        form_name: &str,
        script: Option<Arc<ScriptInput>>,
    ) -> Result<Self, CliError> {
        let runtime = Builder::new_current_thread().build()?;
        let config = ConfigManager::new()?;
        let presentation: Arc<dyn PresentationGateway> = match script {
            Some(input) => Arc::new(ConsoleGateway::scripted(input)),
            None => Arc::new(ConsoleGateway::interactive()),
        };
        let definition = config.load_form(form_name)?;
        let form = definition.build(config.data_dir(), presentation)?;
        info!(form = form.name(), session = %form.session_id(), "form opened");

        Ok(Self {
            mode,
            running: true,
            runtime,
            config,
            form,
        })
    }

    pub fn form(&self) -> &FormController {
        &self.form
    }

    pub(crate) fn prompt(&self) -> String {
        let field = self.form.current_field().unwrap_or("-");
        match self.form.mode() {
            FormMode::Normal => format!("{}:{}> ", self.form.name(), field),
            FormMode::Query => format!("{}:{} [query]> ", self.form.name(), field),
        }
    }

    pub(crate) fn dispatch(&mut self, command: &str, raw: &str, args: &[&str]) -> CommandResult {
        match command {
            "set" => self.cmd_set(args),
            "focus" => self.cmd_focus(args),
            "key" => self.cmd_key(args),
            "next" => self.cmd_navigate(Direction::Forward),
            "prev" | "previous" => self.cmd_navigate(Direction::Backward),
            "query" => self.cmd_query(),
            "execute" => self.cmd_execute(),
            "cancel" => self.cmd_cancel(),
            "save" => self.cmd_save(),
            "clear" => self.cmd_clear(),
            "lov" => self.cmd_lov(),
            "show" => self.cmd_show(),
            "init" => self.cmd_init(),
            "version" => self.cmd_version(),
            "help" => self.cmd_help(args),
            "exit" | "quit" => Ok(LoopControl::Exit),
            _ => {
                self.suggest_command(raw);
                Ok(LoopControl::Continue)
            }
        }
    }

    fn cmd_set(&mut self, args: &[&str]) -> CommandResult {
        let Some((field, rest)) = args.split_first() else {
            return Err(CommandError::InvalidArguments(
                "usage: set <field> [value...]".into(),
            ));
        };
        let value = rest.join(" ");
        let change = self
            .runtime
            .block_on(self.form.on_field_changed(field, &value))?;
        if let Some(outcome) = change.lov {
            report_lov(&outcome);
        }
        Ok(LoopControl::Continue)
    }

    fn cmd_focus(&mut self, args: &[&str]) -> CommandResult {
        let [field] = args else {
            return Err(CommandError::InvalidArguments("usage: focus <field>".into()));
        };
        self.form.on_focus(field)?;
        Ok(LoopControl::Continue)
    }

    fn cmd_key(&mut self, args: &[&str]) -> CommandResult {
        let [chord] = args else {
            return Err(CommandError::InvalidArguments("usage: key <chord>".into()));
        };
        let (key, modifiers) = parse_key_chord(chord).map_err(CommandError::InvalidArguments)?;
        let outcome = self.runtime.block_on(self.form.on_key(key, modifiers))?;
        match outcome {
            KeyOutcome::Focused(field) => output::info(format!("Focus: {}", field)),
            KeyOutcome::QueryEntered => announce_query_mode(),
            KeyOutcome::Query(outcome) => report_query(&outcome),
            KeyOutcome::Save(_) => {}
            KeyOutcome::Lov(Some(outcome)) => report_lov(&outcome),
            KeyOutcome::Lov(None) => {}
            KeyOutcome::Cleared => output::info("Form cleared."),
            KeyOutcome::QueryCancelled(cancelled) => report_cancel(cancelled),
            KeyOutcome::Ignored => output::warning(format!("`{}` does nothing here.", chord)),
        }
        Ok(LoopControl::Continue)
    }

    fn cmd_navigate(&mut self, direction: Direction) -> CommandResult {
        let field = self.form.navigate(direction)?;
        output::info(format!("Focus: {}", field));
        Ok(LoopControl::Continue)
    }

    fn cmd_query(&mut self) -> CommandResult {
        match self.runtime.block_on(self.form.request_query())? {
            None => announce_query_mode(),
            Some(outcome) => report_query(&outcome),
        }
        Ok(LoopControl::Continue)
    }

    fn cmd_execute(&mut self) -> CommandResult {
        let outcome = self.runtime.block_on(self.form.execute_query())?;
        report_query(&outcome);
        Ok(LoopControl::Continue)
    }

    fn cmd_cancel(&mut self) -> CommandResult {
        report_cancel(self.form.cancel_query());
        Ok(LoopControl::Continue)
    }

    fn cmd_save(&mut self) -> CommandResult {
        // Outcomes are reported through the presentation gateway.
        self.runtime.block_on(self.form.request_save());
        Ok(LoopControl::Continue)
    }

    fn cmd_clear(&mut self) -> CommandResult {
        self.form.clear_form();
        output::info("Form cleared.");
        Ok(LoopControl::Continue)
    }

    fn cmd_lov(&mut self) -> CommandResult {
        if self.form.current_field().is_none() {
            output::warning("Focus a field first.");
            return Ok(LoopControl::Continue);
        }
        if let Some(outcome) = self.runtime.block_on(self.form.list_values())? {
            report_lov(&outcome);
        }
        Ok(LoopControl::Continue)
    }

    fn cmd_show(&mut self) -> CommandResult {
        println!("{}", render_fields(&self.form));
        Ok(LoopControl::Continue)
    }

    fn cmd_init(&mut self) -> CommandResult {
        let written = self.config.init_demo()?;
        if written.is_empty() {
            output::info("Demo form already initialized.");
        }
        for path in written {
            output::success(format!("Wrote {}", path.display()));
        }
        Ok(LoopControl::Continue)
    }

    fn cmd_version(&mut self) -> CommandResult {
        println!("{}", build_info::current().summary());
        Ok(LoopControl::Continue)
    }

    fn cmd_help(&mut self, args: &[&str]) -> CommandResult {
        match args.first() {
            Some(name) => match COMMANDS
                .iter()
                .find(|spec| spec.name.eq_ignore_ascii_case(name))
            {
                Some(spec) => println!("{}\n  {}", spec.usage, spec.summary),
                None => self.suggest_command(name),
            },
            None => {
                output::section("Commands");
                for spec in COMMANDS {
                    println!("  {:<24} {}", spec.usage, spec.summary);
                }
            }
        }
        Ok(LoopControl::Continue)
    }

    pub(crate) fn suggest_command(&self, input: &str) {
        output::warning(format!(
            "Unknown command `{}`. Type `help` to see available commands.",
            input
        ));

        let needle = input.to_ascii_lowercase();
        let best = COMMANDS
            .iter()
            .map(|spec| (levenshtein(spec.name, &needle), spec.name))
            .min_by_key(|(distance, _)| *distance);

        if let Some((distance, name)) = best {
            if distance <= 3 {
                output::info(format!("Suggestion: `{}`?", name));
            }
        }
    }

    pub(crate) fn confirm_exit(&self) -> Result<bool, CliError> {
        if self.mode == CliMode::Script {
            return Ok(true);
        }
        let theme = dialoguer::theme::ColorfulTheme::default();
        Ok(dialoguer::Confirm::with_theme(&theme)
            .with_prompt("Exit shell?")
            .default(false)
            .interact()?)
    }

    pub(crate) fn report_error(&self, err: CommandError) {
        match err {
            CommandError::InvalidArguments(message) => {
                output::error(message);
                output::info("Use `help <command>` for usage details.");
            }
            other => output::error(other),
        }
    }
}

fn announce_query_mode() {
    output::info("Query mode: fill in filters, then `execute` (F8) or `cancel` (Esc).");
}

fn report_query(outcome: &QueryOutcome) {
    if matches!(outcome, QueryOutcome::NotInQueryMode) {
        output::warning("Not in query mode. Use `query` (F7) first.");
    }
}

fn report_cancel(cancelled: bool) {
    if cancelled {
        output::info("Query cancelled.");
    } else {
        output::warning("Not in query mode.");
    }
}

fn report_lov(outcome: &LovOutcome) {
    match outcome {
        LovOutcome::Applied(fields) => output::success(format!("Filled {}", fields.join(", "))),
        LovOutcome::NoMatch => output::warning("No matching values."),
        LovOutcome::Cancelled => output::info("Selection cancelled."),
        // Already reported by the form.
        LovOutcome::Failed(_) => {}
    }
}
