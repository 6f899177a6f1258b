//! Line-oriented front end for the command console.

use std::io::{self, Write};

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use sandmod_core::{CommandError, GridCoord, LogEntry, LogSink, SandboxHost, Severity};
use sandmod_system_commands::{forward_events, register_all, Session};
use sandmod_system_console::{Arity, CommandConsole, CommandSpec, Focus};
use sandmod_system_selection::{CanvasBounds, PointerTarget};
use sandmod_system_souls::install;
use sandmod_world::World;
use tracing::{debug, info, warn};

use crate::config::AppConfig;

const TICK_USAGE: &str = "tick [frames]";
const CURSOR_USAGE: &str = "cursor [x y]";
const DRAG_USAGE: &str = "drag <x1> <y1> <x2> <y2> (screen units)";

/// Whether the read loop keeps going.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

/// Console, session and the bookkeeping needed to stream the log to a terminal.
pub(crate) struct Shell {
    console: CommandConsole<Session<World>>,
    session: Session<World>,
    printed: u64,
}

impl Shell {
    /// Installs the mods into `world` and opens the console.
    pub(crate) fn new(mut world: World, config: &AppConfig, seed: u64, cell_size: f32) -> Result<Self> {
        let mut boot_log: Vec<LogEntry> = Vec::new();
        let report = install(world.elements_mut(), &config.souls, &mut boot_log);
        if !report.missing.is_empty() {
            warn!(missing = ?report.missing, "soul mod installed partially");
        }

        let mut console = CommandConsole::new(&config.console);
        for entry in boot_log {
            console.log(entry.message, entry.severity);
        }
        register_all(&mut console).context("failed to register mod commands")?;
        register_shell_commands(&mut console, cell_size)
            .context("failed to register shell commands")?;
        console.open();
        info!(
            width = world.size().width(),
            height = world.size().height(),
            seed,
            "sandbox ready"
        );

        Ok(Self {
            console,
            session: Session::with_host(world, seed),
            printed: 0,
        })
    }

    /// Handles one line read from the terminal.
    ///
    /// Configured hotkeys toggle the console. Other input is dropped while
    /// the console is closed.
    pub(crate) fn handle_line(&mut self, line: &str) -> Flow {
        let line = line.trim();
        match line {
            "quit" | "exit" => return Flow::Quit,
            "toggle" => {
                self.console.toggle();
                return Flow::Continue;
            }
            _ => {}
        }
        if self.console.handle_key(line, Focus::Surface) {
            return Flow::Continue;
        }
        if !self.console.is_open() {
            debug!(line, "console closed, input dropped");
            return Flow::Continue;
        }

        let outcome = self.console.submit_input(&mut self.session, line);
        debug!(?outcome, line, "line handled");
        Flow::Continue
    }

    /// Writes log entries the terminal has not shown yet.
    pub(crate) fn flush(&mut self, out: &mut impl Write) -> io::Result<()> {
        if !self.console.take_refresh() {
            return Ok(());
        }
        let log = self.console.log_buffer();
        for entry in log.since(self.printed) {
            writeln!(out, "{:<8}{entry}", entry.severity.label())?;
        }
        self.printed = log.pushed();
        out.flush()
    }

    /// Reports whether the console panel is shown.
    pub(crate) fn is_open(&self) -> bool {
        self.console.is_open()
    }
}

fn register_shell_commands(
    console: &mut CommandConsole<Session<World>>,
    cell_size: f32,
) -> Result<(), sandmod_system_console::RegistrationError> {
    let commands = [
        CommandSpec::new("tick", "Advance the simulation", tick)
            .with_usage(TICK_USAGE)
            .with_arity(Arity::between(0, 1)),
        CommandSpec::new("cursor", "Move or hide the pointer", cursor)
            .with_usage(CURSOR_USAGE)
            .with_arity(Arity::between(0, 2)),
        CommandSpec::new("select", "Toggle the area selection tool", select)
            .with_arity(Arity::NONE),
        CommandSpec::new(
            "drag",
            "Drag the selection tool across the canvas",
            move |session: &mut Session<World>, args: &[&str], log: &mut dyn LogSink| {
                drag(session, args, log, cell_size)
            },
        )
        .with_usage(DRAG_USAGE)
        .with_arity(Arity::exactly(4)),
        CommandSpec::new(
            "highlight",
            "Show the on-screen selection rectangle",
            move |session: &mut Session<World>, _args: &[&str], log: &mut dyn LogSink| {
                highlight(session, log, cell_size)
            },
        )
        .with_arity(Arity::NONE),
    ];

    for command in commands {
        console.register_command(command)?;
    }
    Ok(())
}

fn tick(
    session: &mut Session<World>,
    args: &[&str],
    log: &mut dyn LogSink,
) -> Result<(), CommandError> {
    let frames: u32 = match args {
        [] => 1,
        [frames] => parse("frames", frames, "a whole number")?,
        _ => return Err(CommandError::usage(TICK_USAGE)),
    };
    let (world, rng) = session.host_and_rng()?;
    if world.paused() {
        log.log("Simulation is paused.".to_owned(), Severity::Warning);
        return Ok(());
    }

    let mut visited = 0;
    let mut reactions = 0;
    for _ in 0..frames {
        let summary = world.step(&mut *rng, &mut *log);
        visited += summary.visited;
        reactions += summary.reactions;
    }
    log.log(
        format!("Advanced {frames} frames: {visited} pixel updates, {reactions} reactions."),
        Severity::Info,
    );
    Ok(())
}

fn cursor(
    session: &mut Session<World>,
    args: &[&str],
    log: &mut dyn LogSink,
) -> Result<(), CommandError> {
    let world = session.host_mut()?;
    match args {
        [] => {
            world.set_cursor(None);
            log.log("Cursor hidden.".to_owned(), Severity::Info);
        }
        [x, y] => {
            let cell = GridCoord::new(
                parse("x", x, "an integer")?,
                parse("y", y, "an integer")?,
            );
            if !world.size().contains(cell) {
                return Err(anyhow!("{cell} lies outside the grid").into());
            }
            world.set_cursor(Some(cell));
            log.log(format!("Cursor at {cell}."), Severity::Info);
        }
        _ => return Err(CommandError::usage(CURSOR_USAGE)),
    }
    Ok(())
}

fn select(
    session: &mut Session<World>,
    _args: &[&str],
    log: &mut dyn LogSink,
) -> Result<(), CommandError> {
    let mut events = Vec::new();
    session.selection_mut().toggle_tool(&mut events);
    forward_events(events, log);
    Ok(())
}

fn drag(
    session: &mut Session<World>,
    args: &[&str],
    log: &mut dyn LogSink,
    cell_size: f32,
) -> Result<(), CommandError> {
    let [x1, y1, x2, y2] = args else {
        return Err(CommandError::usage(DRAG_USAGE));
    };
    let start = Vec2::new(parse("x1", x1, "a number")?, parse("y1", y1, "a number")?);
    let end = Vec2::new(parse("x2", x2, "a number")?, parse("y2", y2, "a number")?);
    let canvas = CanvasBounds::for_grid(Vec2::ZERO, session.host()?.size(), cell_size);

    let selection = session.selection_mut();
    let mut events = Vec::new();
    if selection.begin_selection(start, PointerTarget::Surface, &canvas, &mut events) {
        selection.update_selection(end);
        let _ = selection.commit_selection(end, &canvas, &mut events);
    } else if !selection.is_active() {
        log.log(
            "Selection tool is off; run 'select' first.".to_owned(),
            Severity::Warning,
        );
    }
    forward_events(events, log);
    Ok(())
}

fn highlight(
    session: &mut Session<World>,
    log: &mut dyn LogSink,
    cell_size: f32,
) -> Result<(), CommandError> {
    let canvas = CanvasBounds::for_grid(Vec2::ZERO, session.host()?.size(), cell_size);
    match session.selection().highlight(&canvas) {
        Some(rect) => log.log(
            format!("Highlight from {} to {}.", rect.min(), rect.max()),
            Severity::Info,
        ),
        None => log.log("Nothing highlighted.".to_owned(), Severity::Info),
    }
    Ok(())
}

fn parse<T: std::str::FromStr>(
    name: &'static str,
    value: &str,
    expected: &'static str,
) -> Result<T, CommandError> {
    value.parse().map_err(|_| CommandError::InvalidArgument {
        name,
        value: value.to_owned(),
        expected,
    })
}
