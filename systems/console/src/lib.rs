#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command console shared by every mod.
//!
//! The console owns a bounded log and a registry of named commands. One line
//! of input is split on whitespace, the first token selects a command and the
//! remaining tokens are handed to its handler together with a caller supplied
//! context `C`. Nothing a handler does can take the console down: failures and
//! panics are caught at the dispatch boundary and recorded as error lines.

mod config;
mod log_buffer;

use std::{
    any::Any,
    collections::BTreeMap,
    fmt,
    panic::{self, AssertUnwindSafe},
};

use sandmod_core::{CommandError, LogEntry, LogSink, Severity};
use tracing::{debug, warn};

pub use config::{ConfigError, ConsoleConfig, DEFAULT_CAPACITY, DEFAULT_HOTKEYS};
pub use log_buffer::LogBuffer;

/// Built-in command that lists every registered command.
pub const HELP_COMMAND: &str = "help";
/// Built-in command that empties the log.
pub const CLEAR_COMMAND: &str = "clear";

const RESERVED_COMMANDS: [&str; 2] = [HELP_COMMAND, CLEAR_COMMAND];

/// Callback invoked when a command is dispatched.
pub type Handler<C> =
    Box<dyn FnMut(&mut C, &[&str], &mut dyn LogSink) -> Result<(), CommandError>>;

/// Number of arguments a command accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Arity {
    min: usize,
    max: Option<usize>,
}

impl Arity {
    /// Accepts no arguments.
    pub const NONE: Self = Self::exactly(0);
    /// Accepts any number of arguments.
    pub const ANY: Self = Self::at_least(0);

    /// Accepts exactly `count` arguments.
    #[must_use]
    pub const fn exactly(count: usize) -> Self {
        Self {
            min: count,
            max: Some(count),
        }
    }

    /// Accepts between `min` and `max` arguments, inclusive.
    #[must_use]
    pub const fn between(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    /// Accepts `min` or more arguments.
    #[must_use]
    pub const fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    /// Reports whether `count` arguments satisfy the arity.
    #[must_use]
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }
}

/// Registry record describing one command.
pub struct CommandSpec<C> {
    name: String,
    description: String,
    usage: String,
    arity: Arity,
    handler: Handler<C>,
}

impl<C> CommandSpec<C> {
    /// Creates a command accepting any number of arguments.
    ///
    /// The usage string defaults to the bare command name.
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: FnMut(&mut C, &[&str], &mut dyn LogSink) -> Result<(), CommandError> + 'static,
    {
        let name = name.into();
        Self {
            usage: name.clone(),
            name,
            description: description.into(),
            arity: Arity::ANY,
            handler: Box::new(handler),
        }
    }

    /// Replaces the usage string reported on argument mismatches.
    #[must_use]
    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    /// Restricts the accepted argument count.
    #[must_use]
    pub fn with_arity(mut self, arity: Arity) -> Self {
        self.arity = arity;
        self
    }

    /// Unique command name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description shown by `help`.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Usage string shown on argument mismatches.
    #[must_use]
    pub fn usage(&self) -> &str {
        &self.usage
    }

    /// Accepted argument count.
    #[must_use]
    pub const fn arity(&self) -> Arity {
        self.arity
    }
}

impl<C> fmt::Debug for CommandSpec<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("usage", &self.usage)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// Reasons a command registration is refused.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    /// The name belongs to a built-in command.
    #[error("command '{0}' is reserved")]
    Reserved(String),
    /// Another command already uses the name.
    #[error("command '{0}' is already registered")]
    Duplicate(String),
    /// The name is empty or contains whitespace, so it could never be typed.
    #[error("command name '{0}' is not a single word")]
    InvalidName(String),
}

/// Result of dispatching one line of input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The line was blank.
    Ignored,
    /// A built-in command ran.
    Builtin,
    /// A registered handler completed successfully.
    Executed,
    /// No command with that name exists.
    Unknown,
    /// The arguments did not match the command's usage.
    Usage,
    /// The handler returned an error or panicked.
    Failed,
}

/// Whether the console panel is shown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Visibility {
    /// The panel is hidden; the log keeps accumulating.
    #[default]
    Closed,
    /// The panel is shown.
    Open,
}

/// Element holding keyboard focus when a key is pressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Focus {
    /// The simulation surface or any non-text element.
    Surface,
    /// A text input, where hotkeys must not interfere with typing.
    TextInput,
}

/// Console instance owning the log buffer and the command registry.
pub struct CommandConsole<C> {
    log: LogBuffer,
    commands: BTreeMap<String, CommandSpec<C>>,
    visibility: Visibility,
    hotkeys: Vec<String>,
    rendered_revision: Option<u64>,
}

impl<C> Default for CommandConsole<C> {
    fn default() -> Self {
        Self::new(&ConsoleConfig::default())
    }
}

impl<C> fmt::Debug for CommandConsole<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandConsole")
            .field("entries", &self.log.len())
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("visibility", &self.visibility)
            .finish_non_exhaustive()
    }
}

impl<C> CommandConsole<C> {
    /// Creates a closed console with an empty registry.
    #[must_use]
    pub fn new(config: &ConsoleConfig) -> Self {
        Self {
            log: LogBuffer::new(config.capacity),
            commands: BTreeMap::new(),
            visibility: Visibility::Closed,
            hotkeys: config.hotkeys.clone(),
            rendered_revision: None,
        }
    }

    /// Records a message.
    pub fn log(&mut self, message: impl Into<String>, severity: Severity) {
        self.log.push(message, severity);
    }

    /// Records an informational message.
    pub fn info(&mut self, message: impl Into<String>) {
        self.log(message, Severity::Info);
    }

    /// Read access to the retained log entries.
    #[must_use]
    pub fn log_buffer(&self) -> &LogBuffer {
        &self.log
    }

    /// Sink other mods use to write into this console.
    pub fn sink(&mut self) -> &mut dyn LogSink {
        &mut self.log
    }

    /// Retained entries from oldest to newest.
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &LogEntry> + ExactSizeIterator {
        self.log.iter()
    }

    /// Adds a command to the registry.
    ///
    /// Built-in names and names already in use are refused rather than
    /// overwritten; the refusal is also recorded as a warning line.
    pub fn register_command(&mut self, spec: CommandSpec<C>) -> Result<(), RegistrationError> {
        let name = spec.name.clone();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            self.log.push(
                format!("Command name '{name}' must be a single word."),
                Severity::Warning,
            );
            return Err(RegistrationError::InvalidName(name));
        }
        if RESERVED_COMMANDS.contains(&name.as_str()) {
            self.log.push(
                format!("Command '{name}' is built in and cannot be overridden."),
                Severity::Warning,
            );
            return Err(RegistrationError::Reserved(name));
        }
        if self.commands.contains_key(&name) {
            self.log.push(
                format!("Command '{name}' is already registered; keeping the existing handler."),
                Severity::Warning,
            );
            return Err(RegistrationError::Duplicate(name));
        }

        self.log.push(
            format!("Command registered: {name}: {}", spec.description),
            Severity::System,
        );
        let _ = self.commands.insert(name, spec);
        Ok(())
    }

    /// Reports whether a command with the name is registered.
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Registered commands in name order.
    pub fn commands(&self) -> impl Iterator<Item = &CommandSpec<C>> {
        self.commands.values()
    }

    /// Dispatches one line of input against the provided context.
    pub fn execute_command(&mut self, context: &mut C, line: &str) -> Outcome {
        let trimmed = line.trim();
        let mut tokens = trimmed.split_whitespace();
        let Some(name) = tokens.next() else {
            return Outcome::Ignored;
        };
        let args: Vec<&str> = tokens.collect();

        self.log.push(format!("> {trimmed}"), Severity::Command);
        debug!(command = name, ?args, "dispatching console command");

        match name {
            HELP_COMMAND => {
                self.print_help();
                return Outcome::Builtin;
            }
            CLEAR_COMMAND => {
                self.log.clear();
                self.log.push("Console cleared.", Severity::System);
                return Outcome::Builtin;
            }
            _ => {}
        }

        let Some(command) = self.commands.get_mut(name) else {
            self.log.push(
                format!("Unknown command: {name}. Type 'help' for available commands."),
                Severity::Error,
            );
            return Outcome::Unknown;
        };
        if !command.arity.accepts(args.len()) {
            self.log
                .push(format!("Usage: {}", command.usage), Severity::Error);
            return Outcome::Usage;
        }

        let sink: &mut dyn LogSink = &mut self.log;
        let handler = &mut command.handler;
        let result =
            panic::catch_unwind(AssertUnwindSafe(|| handler(context, args.as_slice(), sink)));

        match result {
            Ok(Ok(())) => Outcome::Executed,
            Ok(Err(CommandError::Usage { usage })) => {
                self.log.push(format!("Usage: {usage}"), Severity::Error);
                Outcome::Usage
            }
            Ok(Err(error)) => {
                warn!(command = name, %error, "console command failed");
                self.log.push(
                    format!("Error executing command '{name}': {error}"),
                    Severity::Error,
                );
                Outcome::Failed
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(command = name, %message, "console command panicked");
                self.log.push(
                    format!("Error executing command '{name}': {message}"),
                    Severity::Error,
                );
                Outcome::Failed
            }
        }
    }

    /// Handles a line submitted from the console's text field.
    pub fn submit_input(&mut self, context: &mut C, raw: &str) -> Outcome {
        let line = raw.trim();
        if line.is_empty() {
            return Outcome::Ignored;
        }
        self.execute_command(context, line)
    }

    fn print_help(&mut self) {
        self.log.push("Available commands:", Severity::Info);
        for command in self.commands.values() {
            self.log.push(
                format!("  {}: {}", command.name, command.description),
                Severity::Info,
            );
        }
    }

    /// Current panel visibility.
    #[must_use]
    pub const fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Reports whether the panel is shown.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.visibility == Visibility::Open
    }

    /// Shows the panel.
    pub fn open(&mut self) {
        self.visibility = Visibility::Open;
    }

    /// Hides the panel without discarding the log.
    pub fn close(&mut self) {
        self.visibility = Visibility::Closed;
        self.rendered_revision = None;
    }

    /// Flips the panel visibility.
    pub fn toggle(&mut self) {
        match self.visibility {
            Visibility::Open => self.close(),
            Visibility::Closed => self.open(),
        }
    }

    /// Reports whether the open panel shows stale content, marking it fresh.
    pub fn take_refresh(&mut self) -> bool {
        if !self.is_open() {
            return false;
        }
        let revision = self.log.revision();
        if self.rendered_revision == Some(revision) {
            return false;
        }
        self.rendered_revision = Some(revision);
        true
    }

    /// Toggles the panel when `key` is a configured hotkey.
    ///
    /// Keys pressed while a text input has focus are never consumed.
    pub fn handle_key(&mut self, key: &str, focus: Focus) -> bool {
        if focus == Focus::TextInput || !self.hotkeys.iter().any(|hotkey| hotkey == key) {
            return false;
        }
        self.toggle();
        true
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "command panicked".to_owned()
    }
}
