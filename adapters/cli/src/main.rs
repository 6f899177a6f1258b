#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Terminal front end that hosts the sandbox mods.
//!
//! Reads one command per line from standard input and streams the console
//! log to standard output. `RUST_LOG` controls diagnostic tracing on stderr.

mod config;
mod shell;

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use sandmod_core::GridSize;
use sandmod_world::World;

use crate::{
    config::AppConfig,
    shell::{Flow, Shell},
};

/// Command-line options.
#[derive(Parser, Debug)]
#[command(name = "sandmod", version, about = "Interactive sandbox with the console, selection and soul mods")]
struct Cli {
    /// Grid width in cells.
    #[arg(long, default_value_t = 160)]
    width: u32,
    /// Grid height in cells.
    #[arg(long, default_value_t = 90)]
    height: u32,
    /// Seed for every random decision.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Screen units per cell, used by `drag` and `highlight`.
    #[arg(long, default_value_t = 4.0)]
    cell_size: f32,
    /// TOML file with `[console]` and `[souls]` tables.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    if cli.width == 0 || cli.height == 0 {
        bail!("grid dimensions must be positive");
    }
    if !(cli.cell_size.is_finite() && cli.cell_size > 0.0) {
        bail!("cell size must be a positive number");
    }

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let world = World::with_size(GridSize::new(cli.width, cli.height));
    let mut shell = Shell::new(world, &config, cli.seed, cli.cell_size)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    shell.flush(&mut stdout).context("failed to write console output")?;
    prompt(&shell, &mut stdout)?;
    for line in stdin.lock().lines() {
        let line = line.context("failed to read input")?;
        let flow = shell.handle_line(&line);
        shell.flush(&mut stdout).context("failed to write console output")?;
        if flow == Flow::Quit {
            break;
        }
        prompt(&shell, &mut stdout)?;
    }
    Ok(())
}

fn prompt(shell: &Shell, out: &mut impl Write) -> Result<()> {
    let marker = if shell.is_open() { "> " } else { "(closed) " };
    write!(out, "{marker}")?;
    out.flush().context("failed to write prompt")
}
