#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Console commands that manipulate the sandbox grid.
//!
//! Commands run against a [`Session`], which bundles the injected host, the
//! area selection tool and a seeded random source. The host is optional so
//! the console can come up before the game does; commands that need it fail
//! with [`CommandError::HostUnavailable`] until one is attached.

mod grid;
mod range;
mod spirits;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sandmod_core::{CommandError, GridCoord, LogSink, SandboxHost, SelectionRange};
use sandmod_system_console::{Arity, CommandConsole, CommandSpec, RegistrationError};
use sandmod_system_selection::{AreaSelection, SelectionEvent};
use tracing::debug;

/// Radius used by `possess` and `exorcise` when none is given.
pub const DEFAULT_SPIRIT_RADIUS: u32 = 5;

const HOST: &str = "sandbox host";

/// State shared by every mod command.
#[derive(Debug)]
pub struct Session<H> {
    host: Option<H>,
    selection: AreaSelection,
    rng: ChaCha8Rng,
}

impl<H: SandboxHost> Session<H> {
    /// Creates a session with no host attached.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            host: None,
            selection: AreaSelection::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Creates a session driving the provided host.
    #[must_use]
    pub fn with_host(host: H, seed: u64) -> Self {
        let mut session = Self::new(seed);
        session.host = Some(host);
        session
    }

    /// Attaches a host, returning the one it replaced.
    pub fn attach(&mut self, host: H) -> Option<H> {
        self.host.replace(host)
    }

    /// Detaches and returns the current host.
    pub fn detach(&mut self) -> Option<H> {
        self.host.take()
    }

    /// Attached host.
    pub fn host(&self) -> Result<&H, CommandError> {
        self.host
            .as_ref()
            .ok_or(CommandError::HostUnavailable { dependency: HOST })
    }

    /// Attached host, for modification.
    pub fn host_mut(&mut self) -> Result<&mut H, CommandError> {
        self.host
            .as_mut()
            .ok_or(CommandError::HostUnavailable { dependency: HOST })
    }

    /// Area selection tool.
    #[must_use]
    pub const fn selection(&self) -> &AreaSelection {
        &self.selection
    }

    /// Area selection tool, for modification.
    pub fn selection_mut(&mut self) -> &mut AreaSelection {
        &mut self.selection
    }

    /// Random source used by commands and by the host sweep.
    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Borrows the host together with the random source.
    pub fn host_and_rng(&mut self) -> Result<(&mut H, &mut ChaCha8Rng), CommandError> {
        let host = self
            .host
            .as_mut()
            .ok_or(CommandError::HostUnavailable { dependency: HOST })?;
        Ok((host, &mut self.rng))
    }
}

/// Writes selection events into the console log.
pub fn forward_events(events: impl IntoIterator<Item = SelectionEvent>, log: &mut dyn LogSink) {
    for event in events {
        debug!(?event, "selection event");
        log.log(event.to_string(), event.severity());
    }
}

/// Registers every grid, range and soul command on the console.
///
/// Registration stops at the first refused name; the console has already
/// logged the refusal.
pub fn register_all<H>(console: &mut CommandConsole<Session<H>>) -> Result<(), RegistrationError>
where
    H: SandboxHost + 'static,
{
    let commands = [
        CommandSpec::new(
            "spawn",
            "Spawn an element at the cursor, in the stored range or in a given rectangle",
            grid::spawn::<H>,
        )
        .with_usage(grid::SPAWN_USAGE)
        .with_arity(Arity::between(1, 5)),
        CommandSpec::new(
            "clear_area",
            "Delete pixels around the cursor or in the stored range",
            grid::clear_area::<H>,
        )
        .with_usage(grid::CLEAR_AREA_USAGE)
        .with_arity(Arity::between(0, 1)),
        CommandSpec::new(
            "clear_range",
            "Delete pixels in a given rectangle or the stored range",
            grid::clear_range::<H>,
        )
        .with_usage(grid::CLEAR_RANGE_USAGE)
        .with_arity(Arity::between(0, 4)),
        CommandSpec::new("list_elements", "List every registered element", grid::list_elements::<H>)
            .with_arity(Arity::NONE),
        CommandSpec::new("element_info", "Describe one element", grid::element_info::<H>)
            .with_usage("element_info <element>")
            .with_arity(Arity::exactly(1)),
        CommandSpec::new("pause", "Pause or resume the simulation", grid::pause::<H>)
            .with_arity(Arity::NONE),
        CommandSpec::new("reset", "Delete every pixel on the grid", grid::reset::<H>)
            .with_arity(Arity::NONE),
        CommandSpec::new("set_range", "Store a new range", range::set_range::<H>)
            .with_usage(range::SET_RANGE_USAGE)
            .with_arity(Arity::exactly(4)),
        CommandSpec::new("view_range", "Show the stored range", range::view_range::<H>)
            .with_arity(Arity::NONE),
        CommandSpec::new("canvas_range", "Show the full grid range", range::canvas_range::<H>)
            .with_arity(Arity::NONE),
        CommandSpec::new(
            "clear_selection",
            "Forget the stored range and hide its highlight",
            range::clear_selection::<H>,
        )
        .with_arity(Arity::NONE),
        CommandSpec::new(
            "possess",
            "Force possession of nearby body parts",
            spirits::possess::<H>,
        )
        .with_usage("possess [range]")
        .with_arity(Arity::between(0, 1)),
        CommandSpec::new("exorcise", "Remove nearby possessions", spirits::exorcise::<H>)
            .with_usage("exorcise [range]")
            .with_arity(Arity::between(0, 1)),
        CommandSpec::new("soul_count", "Count souls and possessions", spirits::soul_count::<H>)
            .with_arity(Arity::NONE),
    ];

    for command in commands {
        console.register_command(command)?;
    }
    Ok(())
}

fn focus<H: SandboxHost>(host: &H) -> GridCoord {
    host.cursor().unwrap_or_else(|| host.size().center())
}

fn parse_number<T: std::str::FromStr>(
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

fn parse_range(args: &[&str]) -> Result<SelectionRange, CommandError> {
    let [x1, y1, x2, y2] = args else {
        return Err(CommandError::usage("x1 y1 x2 y2"));
    };
    let coordinate = |value: &str| parse_number::<i32>("coordinate", value, "an integer");
    Ok(SelectionRange::new(
        coordinate(*x1)?,
        coordinate(*y1)?,
        coordinate(*x2)?,
        coordinate(*y2)?,
    ))
}
