use anyhow::anyhow;
use sandmod_core::{CommandError, Severity};
use sandmod_system_console::{
    Arity, CommandConsole, CommandSpec, ConsoleConfig, Focus, Outcome, RegistrationError,
};

#[derive(Default)]
struct Counter {
    runs: u32,
}

fn console_with_commands() -> CommandConsole<Counter> {
    let mut console = CommandConsole::default();
    console
        .register_command(CommandSpec::new(
            "count",
            "Increments the counter",
            |counter: &mut Counter, _args: &[&str], _log: &mut dyn sandmod_core::LogSink| {
                counter.runs += 1;
                Ok(())
            },
        ))
        .expect("count registers");
    console
        .register_command(
            CommandSpec::new(
                "echo",
                "Repeats one word",
                |_counter: &mut Counter, args: &[&str], log: &mut dyn sandmod_core::LogSink| {
                    log.log(args[0].to_owned(), Severity::Info);
                    Ok(())
                },
            )
            .with_usage("echo <word>")
            .with_arity(Arity::exactly(1)),
        )
        .expect("echo registers");
    console
}

fn messages<C>(console: &CommandConsole<C>) -> Vec<String> {
    console.entries().map(|entry| entry.message.clone()).collect()
}

fn last_entry<C>(console: &CommandConsole<C>) -> (String, Severity) {
    let entry = console.log_buffer().latest().expect("log has entries");
    (entry.message.clone(), entry.severity)
}

#[test]
fn help_lists_each_command_exactly_once() {
    let mut console = console_with_commands();
    let mut counter = Counter::default();

    assert_eq!(console.execute_command(&mut counter, "help"), Outcome::Builtin);

    let lines = messages(&console);
    let header = lines
        .iter()
        .position(|line| line == "Available commands:")
        .expect("help header");
    assert_eq!(
        &lines[header + 1..],
        &[
            "  count: Increments the counter".to_owned(),
            "  echo: Repeats one word".to_owned(),
        ],
        "help should list commands in name order without duplicates",
    );
}

#[test]
fn clear_empties_the_log_even_when_already_empty() {
    let mut console = console_with_commands();
    let mut counter = Counter::default();

    assert_eq!(console.execute_command(&mut counter, "clear"), Outcome::Builtin);
    assert_eq!(messages(&console), vec!["Console cleared.".to_owned()]);

    assert_eq!(console.execute_command(&mut counter, "clear"), Outcome::Builtin);
    assert_eq!(messages(&console), vec!["Console cleared.".to_owned()]);
}

#[test]
fn unknown_command_logs_an_error_and_runs_nothing() {
    let mut console = console_with_commands();
    let mut counter = Counter::default();

    assert_eq!(console.execute_command(&mut counter, "frobnicate now"), Outcome::Unknown);

    assert_eq!(
        last_entry(&console),
        (
            "Unknown command: frobnicate. Type 'help' for available commands.".to_owned(),
            Severity::Error
        )
    );
    assert_eq!(counter.runs, 0);
}

#[test]
fn submitted_line_is_echoed_before_dispatch() {
    let mut console = console_with_commands();
    let mut counter = Counter::default();

    assert_eq!(console.submit_input(&mut counter, "  count  "), Outcome::Executed);
    assert_eq!(console.submit_input(&mut counter, "   "), Outcome::Ignored);

    let echoed: Vec<_> = console
        .entries()
        .filter(|entry| entry.severity == Severity::Command)
        .map(|entry| entry.message.clone())
        .collect();
    assert_eq!(echoed, vec!["> count".to_owned()]);
    assert_eq!(counter.runs, 1);
}

#[test]
fn arity_mismatch_reports_usage_without_running_handler() {
    let mut console = console_with_commands();
    let mut counter = Counter::default();

    assert_eq!(console.execute_command(&mut counter, "echo"), Outcome::Usage);
    assert_eq!(
        last_entry(&console),
        ("Usage: echo <word>".to_owned(), Severity::Error)
    );

    assert_eq!(console.execute_command(&mut counter, "echo hi"), Outcome::Executed);
    assert_eq!(last_entry(&console), ("hi".to_owned(), Severity::Info));
}

#[test]
fn failing_handler_is_logged_and_console_stays_usable() {
    let mut console = console_with_commands();
    let mut counter = Counter::default();
    console
        .register_command(CommandSpec::new(
            "explode",
            "Always fails",
            |_counter: &mut Counter, _args: &[&str], _log: &mut dyn sandmod_core::LogSink| {
                Err(CommandError::from(anyhow!("boom")))
            },
        ))
        .expect("explode registers");

    assert_eq!(console.execute_command(&mut counter, "explode"), Outcome::Failed);
    let (message, severity) = last_entry(&console);
    assert_eq!(severity, Severity::Error);
    assert!(message.contains("boom"), "unexpected error line: {message}");
    assert_eq!(message, "Error executing command 'explode': boom");

    assert_eq!(console.execute_command(&mut counter, "count"), Outcome::Executed);
    assert_eq!(counter.runs, 1);
}

#[test]
fn panicking_handler_is_contained() {
    let mut console = console_with_commands();
    let mut counter = Counter::default();
    console
        .register_command(CommandSpec::new(
            "crash",
            "Panics",
            |_counter: &mut Counter, _args: &[&str], _log: &mut dyn sandmod_core::LogSink| {
                panic!("handler went sideways")
            },
        ))
        .expect("crash registers");

    assert_eq!(console.execute_command(&mut counter, "crash"), Outcome::Failed);
    assert_eq!(
        last_entry(&console),
        (
            "Error executing command 'crash': handler went sideways".to_owned(),
            Severity::Error
        )
    );
    assert_eq!(console.execute_command(&mut counter, "count"), Outcome::Executed);
}

#[test]
fn reserved_and_duplicate_names_are_rejected_with_a_warning() {
    let mut console = console_with_commands();
    let mut counter = Counter::default();

    let reserved = console.register_command(CommandSpec::new(
        "help",
        "Hijacks help",
        |_counter: &mut Counter, _args: &[&str], _log: &mut dyn sandmod_core::LogSink| Ok(()),
    ));
    assert_eq!(reserved, Err(RegistrationError::Reserved("help".to_owned())));
    assert_eq!(last_entry(&console).1, Severity::Warning);

    let duplicate = console.register_command(CommandSpec::new(
        "count",
        "Second counter",
        |counter: &mut Counter, _args: &[&str], _log: &mut dyn sandmod_core::LogSink| {
            counter.runs += 100;
            Ok(())
        },
    ));
    assert_eq!(duplicate, Err(RegistrationError::Duplicate("count".to_owned())));
    assert_eq!(last_entry(&console).1, Severity::Warning);

    let _ = console.execute_command(&mut counter, "count");
    assert_eq!(counter.runs, 1, "the first handler must be kept");
    assert_eq!(console.commands().count(), 2);
}

#[test]
fn hotkey_is_ignored_while_typing() {
    let mut console: CommandConsole<Counter> = CommandConsole::default();

    assert!(!console.handle_key("`", Focus::TextInput));
    assert!(!console.is_open());
    assert!(!console.handle_key("a", Focus::Surface));
    assert!(console.handle_key("`", Focus::Surface));
    assert!(console.is_open());
    assert!(console.handle_key("F12", Focus::Surface));
    assert!(!console.is_open());
}

#[test]
fn refresh_is_only_pending_while_open() {
    let mut console: CommandConsole<Counter> = CommandConsole::default();
    console.info("before opening");
    assert!(!console.take_refresh());

    console.open();
    console.open();
    assert!(console.take_refresh());
    assert!(!console.take_refresh());

    console.info("while open");
    assert!(console.take_refresh());

    console.close();
    console.info("while closed");
    assert!(!console.take_refresh());
    assert_eq!(console.log_buffer().len(), 3, "closing never discards the log");
}

#[test]
fn configured_capacity_bounds_the_log() {
    let config = ConsoleConfig {
        capacity: 5,
        ..ConsoleConfig::default()
    };
    let mut console: CommandConsole<Counter> = CommandConsole::new(&config);
    for index in 0..20 {
        console.info(format!("line {index}"));
    }

    assert_eq!(
        messages(&console),
        (15..20).map(|index| format!("line {index}")).collect::<Vec<_>>()
    );
}

#[test]
fn entries_can_be_read_newest_first() {
    let mut console = console_with_commands();
    let mut counter = Counter::default();
    let _ = console.execute_command(&mut counter, "echo first");
    let _ = console.execute_command(&mut counter, "echo second");

    let newest: Vec<&str> = console
        .entries()
        .rev()
        .take(2)
        .map(|entry| entry.message.as_str())
        .collect();
    assert_eq!(newest, ["second", "> echo second"]);
    assert_eq!(console.entries().len(), console.log_buffer().len());
}
