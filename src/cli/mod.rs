mod console;
mod context;
pub mod output;
mod shell;
mod view;

pub use console::{ConsoleGateway, ScriptInput};
pub use context::{CliError, CliMode, CommandError, ShellContext};
pub use shell::{run_cli, SCRIPT_ENV};
pub use view::render_fields;
