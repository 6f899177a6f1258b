//! Commands that read and edit the stored selection range.

use anyhow::anyhow;
use sandmod_core::{CommandError, LogSink, SandboxHost, Severity};

use crate::{parse_range, Session};

pub(crate) const SET_RANGE_USAGE: &str = "set_range x1 y1 x2 y2";

pub(crate) fn set_range<H: SandboxHost>(
    session: &mut Session<H>,
    args: &[&str],
    log: &mut dyn LogSink,
) -> Result<(), CommandError> {
    if args.len() != 4 {
        return Err(CommandError::usage(SET_RANGE_USAGE));
    }
    let range = parse_range(args)?;
    session.selection.set_range(range);
    log.log(format!("Stored range updated: {range}"), Severity::Success);
    Ok(())
}

pub(crate) fn view_range<H: SandboxHost>(
    session: &mut Session<H>,
    _args: &[&str],
    log: &mut dyn LogSink,
) -> Result<(), CommandError> {
    match session.selection.stored_range() {
        Some(range) => log.log(format!("Stored range: {range}"), Severity::Info),
        None => log.log("No range selected.".to_owned(), Severity::Warning),
    }
    Ok(())
}

pub(crate) fn canvas_range<H: SandboxHost>(
    session: &mut Session<H>,
    _args: &[&str],
    log: &mut dyn LogSink,
) -> Result<(), CommandError> {
    let range = session
        .host()?
        .size()
        .full_range()
        .ok_or_else(|| anyhow!("the grid has no cells"))?;
    log.log(format!("Canvas range: {range}"), Severity::Info);
    Ok(())
}

pub(crate) fn clear_selection<H: SandboxHost>(
    session: &mut Session<H>,
    _args: &[&str],
    log: &mut dyn LogSink,
) -> Result<(), CommandError> {
    match session.selection.clear_selection() {
        Some(_) => log.log("Stored range cleared.".to_owned(), Severity::Success),
        None => log.log("No range was stored.".to_owned(), Severity::Info),
    }
    Ok(())
}
