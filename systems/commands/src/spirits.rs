//! Commands backed by the soul possession mod.

use sandmod_core::{CommandError, LogSink, SandboxHost, Severity};
use sandmod_system_souls::{census, exorcise_area, possess_area};

use crate::{focus, parse_number, Session, DEFAULT_SPIRIT_RADIUS};

fn radius(args: &[&str]) -> Result<u32, CommandError> {
    match args.first() {
        Some(value) => parse_number("range", value, "a whole number"),
        None => Ok(DEFAULT_SPIRIT_RADIUS),
    }
}

pub(crate) fn possess<H: SandboxHost>(
    session: &mut Session<H>,
    args: &[&str],
    log: &mut dyn LogSink,
) -> Result<(), CommandError> {
    let radius = radius(args)?;
    let host = session.host_mut()?;
    let center = focus(host);
    let possessed = possess_area(host, center, radius);
    log.log(
        format!("Possessed {possessed} body parts in range {radius}"),
        Severity::Success,
    );
    Ok(())
}

pub(crate) fn exorcise<H: SandboxHost>(
    session: &mut Session<H>,
    args: &[&str],
    log: &mut dyn LogSink,
) -> Result<(), CommandError> {
    let radius = radius(args)?;
    let host = session.host_mut()?;
    let center = focus(host);
    let exorcised = exorcise_area(host, center, radius);
    log.log(
        format!("Exorcised {exorcised} possessions in range {radius}"),
        Severity::Success,
    );
    Ok(())
}

pub(crate) fn soul_count<H: SandboxHost>(
    session: &mut Session<H>,
    _args: &[&str],
    log: &mut dyn LogSink,
) -> Result<(), CommandError> {
    let counted = census(session.host()?);
    log.log(format!("Active souls: {}", counted.souls), Severity::Info);
    log.log(
        format!("Active possessions: {}", counted.possessions),
        Severity::Info,
    );
    Ok(())
}
