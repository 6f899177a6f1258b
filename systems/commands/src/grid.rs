//! Commands that create, delete and inspect pixels.

use rand::seq::SliceRandom;
use sandmod_core::{CommandError, GridCoord, LogSink, SandboxHost, SelectionRange, Severity};

use crate::{focus, parse_number, parse_range, Session};

pub(crate) const SPAWN_USAGE: &str = "spawn <element> [amount | x1 y1 x2 y2]";
pub(crate) const CLEAR_AREA_USAGE: &str = "clear_area <size> (or select a range first)";
pub(crate) const CLEAR_RANGE_USAGE: &str = "clear_range [x1 y1 x2 y2]";

pub(crate) fn spawn<H: SandboxHost>(
    session: &mut Session<H>,
    args: &[&str],
    log: &mut dyn LogSink,
) -> Result<(), CommandError> {
    let Some((&element, rest)) = args.split_first() else {
        return Err(CommandError::usage(SPAWN_USAGE));
    };
    let stored = session.selection.stored_range();
    let (host, rng) = session.host_and_rng()?;
    if !host.elements().contains(element) {
        return Err(CommandError::UnknownElement(element.to_owned()));
    }

    let spawned = match rest {
        [] => match stored {
            Some(range) => fill(host, element, range)?,
            None => {
                let at = focus(host);
                host.create_pixel(element, at)?;
                1
            }
        },
        [amount] => {
            let amount: usize = parse_number("amount", amount, "a whole number")?;
            let area = stored.or_else(|| host.size().full_range());
            let mut candidates = empty_cells(host, area);
            candidates.shuffle(rng);
            candidates.truncate(amount);
            for cell in &candidates {
                host.create_pixel(element, *cell)?;
            }
            if candidates.len() < amount {
                log.log(
                    format!("Only {} empty cells were available.", candidates.len()),
                    Severity::Warning,
                );
            }
            candidates.len()
        }
        [_, _, _, _] => fill(host, element, parse_range(rest)?)?,
        _ => return Err(CommandError::usage(SPAWN_USAGE)),
    };

    log.log(format!("Spawned {spawned} {element}."), Severity::Success);
    Ok(())
}

pub(crate) fn clear_area<H: SandboxHost>(
    session: &mut Session<H>,
    args: &[&str],
    log: &mut dyn LogSink,
) -> Result<(), CommandError> {
    let stored = session.selection.stored_range();
    let host = session.host_mut()?;
    let range = match args {
        [] => stored.ok_or_else(|| CommandError::usage(CLEAR_AREA_USAGE))?,
        [size] => {
            let size: u32 = parse_number("size", size, "a whole number")?;
            SelectionRange::around(focus(host), size)
        }
        _ => return Err(CommandError::usage(CLEAR_AREA_USAGE)),
    };

    let removed = delete_in(host, range);
    log.log(
        format!("Cleared {removed} pixels in {range}."),
        Severity::Success,
    );
    Ok(())
}

pub(crate) fn clear_range<H: SandboxHost>(
    session: &mut Session<H>,
    args: &[&str],
    log: &mut dyn LogSink,
) -> Result<(), CommandError> {
    let range = match args {
        [] => session
            .selection
            .stored_range()
            .ok_or(CommandError::NoSelection)?,
        [_, _, _, _] => parse_range(args)?,
        _ => return Err(CommandError::usage(CLEAR_RANGE_USAGE)),
    };
    let host = session.host_mut()?;

    let removed = delete_in(host, range);
    log.log(
        format!("Cleared {removed} pixels in {range}."),
        Severity::Success,
    );
    Ok(())
}

pub(crate) fn list_elements<H: SandboxHost>(
    session: &mut Session<H>,
    _args: &[&str],
    log: &mut dyn LogSink,
) -> Result<(), CommandError> {
    let elements = session.host()?.elements();
    let names: Vec<&str> = elements.names().collect();
    log.log(
        format!("Elements ({}): {}", names.len(), names.join(", ")),
        Severity::Info,
    );
    Ok(())
}

pub(crate) fn element_info<H: SandboxHost>(
    session: &mut Session<H>,
    args: &[&str],
    log: &mut dyn LogSink,
) -> Result<(), CommandError> {
    let [name] = args else {
        return Err(CommandError::usage("element_info <element>"));
    };
    let definition = session
        .host()?
        .elements()
        .get(name)
        .ok_or_else(|| CommandError::UnknownElement((*name).to_owned()))?;

    log.log(
        format!(
            "{}: category {}, state {}, density {}, temperature {}",
            definition.name,
            definition.category,
            definition.state.label(),
            definition.density,
            definition.temperature,
        ),
        Severity::Info,
    );
    if !definition.description.is_empty() {
        log.log(definition.description.clone(), Severity::Info);
    }
    if !definition.reactions.is_empty() {
        let partners: Vec<&str> = definition
            .reactions
            .iter()
            .map(|reaction| reaction.partner.as_str())
            .collect();
        log.log(format!("Reacts with: {}", partners.join(", ")), Severity::Info);
    }
    if !definition.break_into.is_empty() {
        log.log(
            format!("Breaks into: {}", definition.break_into.join(", ")),
            Severity::Info,
        );
    }
    Ok(())
}

pub(crate) fn pause<H: SandboxHost>(
    session: &mut Session<H>,
    _args: &[&str],
    log: &mut dyn LogSink,
) -> Result<(), CommandError> {
    let host = session.host_mut()?;
    let paused = !host.paused();
    host.set_paused(paused);
    let message = if paused {
        "Simulation paused."
    } else {
        "Simulation resumed."
    };
    log.log(message.to_owned(), Severity::Info);
    Ok(())
}

pub(crate) fn reset<H: SandboxHost>(
    session: &mut Session<H>,
    _args: &[&str],
    log: &mut dyn LogSink,
) -> Result<(), CommandError> {
    let removed = session.host_mut()?.clear_pixels();
    log.log(
        format!("Reset complete: removed {removed} pixels."),
        Severity::Success,
    );
    Ok(())
}

fn fill<H: SandboxHost>(
    host: &mut H,
    element: &str,
    range: SelectionRange,
) -> Result<usize, CommandError> {
    let cells = empty_cells(host, Some(range));
    for cell in &cells {
        host.create_pixel(element, *cell)?;
    }
    Ok(cells.len())
}

fn empty_cells<H: SandboxHost>(host: &H, area: Option<SelectionRange>) -> Vec<GridCoord> {
    area.and_then(|range| range.clamp_to(host.size()))
        .map(|range| range.cells().filter(|cell| host.is_empty(*cell)).collect())
        .unwrap_or_default()
}

fn delete_in<H: SandboxHost>(host: &mut H, range: SelectionRange) -> usize {
    let Some(range) = range.clamp_to(host.size()) else {
        return 0;
    };
    range
        .cells()
        .filter(|cell| host.delete_pixel(*cell).is_some())
        .count()
}
