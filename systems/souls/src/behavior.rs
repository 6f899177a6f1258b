//! Per-tick hooks for souls, ectoplasm, tombstones and possessed vessels.

use rand::{Rng, RngCore};
use sandmod_core::{
    roll, GridCoord, Removal, Rgb, SandboxHost, Severity, SoulStage, TickContext,
};

use crate::{SoulTuning, ECTOPLASM, FLASH, SOUL};

/// Tint applied to heads while a soul inhabits them.
pub const POSSESSED_HEAD_TINT: Rgb = Rgb::from_hex(0xb3d9ff);

/// Vessels a soul looks for when scanning its neighbours.
const SCAN_TARGETS: [&str; 2] = ["body", "head"];

/// Sides of a tombstone that may raise a soul: above, left and right.
const TOMBSTONE_SIDES: [(i32, i32); 3] = [(0, -1), (-1, 0), (1, 0)];

/// Stage decision for one soul tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StagePlan {
    /// Whether the stage's movement rule runs this tick.
    pub moves: bool,
    /// Stage to switch to after moving, if any.
    pub next: Option<SoulStage>,
}

/// Rolls the movement gate and stage advance for a soul in `stage`.
///
/// A drifting soul only advances on ticks where it also drifted, so its
/// effective advance rate is `drift_chance * drift_advance_chance`.
pub fn plan_stage<R>(stage: SoulStage, rng: &mut R, tuning: &SoulTuning) -> StagePlan
where
    R: RngCore + ?Sized,
{
    match stage {
        SoulStage::Drift => {
            let moves = roll(rng, tuning.drift_chance);
            let advances = moves && roll(rng, tuning.drift_advance_chance);
            StagePlan {
                moves,
                next: advances.then_some(SoulStage::Descend),
            }
        }
        SoulStage::Descend => StagePlan {
            moves: true,
            next: roll(rng, tuning.descend_advance_chance).then_some(SoulStage::Wander),
        },
        SoulStage::Wander => {
            let moves = roll(rng, tuning.wander_chance);
            let returns = roll(rng, tuning.wander_return_chance);
            StagePlan {
                moves,
                next: returns.then_some(SoulStage::Drift),
            }
        }
    }
}

pub(crate) fn soul_tick(
    tuning: &SoulTuning,
    context: &mut TickContext<'_>,
    coord: GridCoord,
) -> Option<GridCoord> {
    if coord.y() <= tuning.ceiling_row {
        let _ = context.host.delete_pixel(coord);
        return None;
    }

    let mut here = coord;
    if context.chance(tuning.rise_chance) {
        here = rise(context, here);
    }
    here = follow_stage(tuning, context, here)?;

    if context.chance(tuning.possess_scan_chance) && possess_neighbour(context, here) {
        let _ = context.host.delete_pixel(here);
        return None;
    }

    let glowing = context.host.pixel(here)?.glow;
    let glow = if glowing {
        !context.chance(tuning.glow_off_chance)
    } else {
        context.chance(tuning.glow_on_chance)
    };
    context.host.pixel_mut(here)?.glow = glow;

    let below = here.offset(0, 1);
    if context.chance(tuning.ectoplasm_chance) && context.host.is_empty(below) {
        let _ = context.host.create_pixel(ECTOPLASM, below);
    }

    if context.chance(tuning.flash_chance) {
        for neighbour in here.neighbours() {
            if !context.host.is_empty(neighbour) {
                continue;
            }
            if context.host.create_pixel(FLASH, neighbour).is_ok() {
                if let Some(flash) = context.host.pixel_mut(neighbour) {
                    flash.temperature = tuning.flash_temperature;
                }
            }
        }
    }

    Some(here)
}

fn rise(context: &mut TickContext<'_>, here: GridCoord) -> GridCoord {
    let above = here.offset(0, -1);
    if context.host.try_move(here, above) {
        return above;
    }
    let blocker_movable = context
        .host
        .pixel(above)
        .and_then(|pixel| context.host.elements().get(pixel.element()))
        .is_some_and(|definition| definition.movable);
    if blocker_movable && context.host.swap_pixels(here, above) {
        return above;
    }
    here
}

fn follow_stage(
    tuning: &SoulTuning,
    context: &mut TickContext<'_>,
    here: GridCoord,
) -> Option<GridCoord> {
    let pixel = context.host.pixel(here)?;
    let stage = pixel.soul_stage().unwrap_or_default();
    let dir = if pixel.flip_x { -1 } else { 1 };
    let plan = plan_stage(stage, &mut *context.rng, tuning);

    let mut position = here;
    if plan.moves {
        let target = match stage {
            SoulStage::Drift => {
                let climb = i32::from(context.chance(tuning.drift_climb_chance));
                here.offset(dir, -climb)
            }
            SoulStage::Descend => here.offset(dir, 1),
            SoulStage::Wander => {
                let dx = context.rng.gen_range(-1..=1);
                let dy = context.rng.gen_range(-1..=1);
                here.offset(dx, dy)
            }
        };
        if context.host.try_move(here, target) {
            position = target;
        } else if stage != SoulStage::Wander {
            let pixel = context.host.pixel_mut(here)?;
            pixel.flip_x = !pixel.flip_x;
        }
    }

    if let Some(next) = plan.next {
        let flip_x = context.rng.gen::<bool>();
        let pixel = context.host.pixel_mut(position)?;
        pixel.set_soul_stage(next);
        pixel.flip_x = flip_x;
    }
    Some(position)
}

fn possess_neighbour(context: &mut TickContext<'_>, here: GridCoord) -> bool {
    for neighbour in here.neighbours() {
        let Some(target) = context.host.pixel_mut(neighbour) else {
            continue;
        };
        if !SCAN_TARGETS.contains(&target.element()) || !target.possess(SOUL) {
            continue;
        }
        let message = format!("Soul possessed {} at {neighbour}", target.element());
        context.log.log(message, Severity::Success);
        return true;
    }
    false
}

pub(crate) fn ectoplasm_tick(
    tuning: &SoulTuning,
    context: &mut TickContext<'_>,
    coord: GridCoord,
) -> Option<GridCoord> {
    let ticks = context.host.pixel_ticks();
    let pixel = context.host.pixel(coord)?;
    let warm = pixel.temperature >= tuning.ectoplasm_decay_temperature;
    let old = ticks.saturating_sub(pixel.born_at) > tuning.ectoplasm_min_age;
    if warm && old && context.chance(tuning.ectoplasm_decay_chance) {
        let _ = context.host.delete_pixel(coord);
        return None;
    }
    Some(coord)
}

pub(crate) fn tombstone_tick(
    tuning: &SoulTuning,
    context: &mut TickContext<'_>,
    coord: GridCoord,
) -> Option<GridCoord> {
    for (dx, dy) in TOMBSTONE_SIDES {
        let side = coord.offset(dx, dy);
        if context.chance(tuning.tombstone_spawn_chance) && context.host.is_empty(side) {
            let _ = context.host.create_pixel(SOUL, side);
        }
    }
    Some(coord)
}

pub(crate) fn vessel_release_tick(
    tuning: &SoulTuning,
    context: &mut TickContext<'_>,
    coord: GridCoord,
) -> Option<GridCoord> {
    let possessed = context.host.pixel(coord)?.is_possessed();
    if !possessed || !context.chance(tuning.release_chance) {
        return Some(coord);
    }

    let pixel = context.host.pixel_mut(coord)?;
    let _ = pixel.release();
    let element = pixel.element().to_owned();
    context.log.log(
        format!("Soul released from {element} at {coord}"),
        Severity::Info,
    );
    let _ = context.host.release_element(coord, SOUL);
    Some(coord)
}

pub(crate) fn head_tint_tick(
    context: &mut TickContext<'_>,
    coord: GridCoord,
) -> Option<GridCoord> {
    let pixel = context.host.pixel_mut(coord)?;
    if pixel.is_possessed() {
        pixel.tint = Some(POSSESSED_HEAD_TINT);
    }
    Some(coord)
}


/// Frightens the neighbours of a removed head and frees the soul inside it.
///
/// A head converted into a soul already is one, so nothing is released.
pub(crate) fn head_removed(
    tuning: &SoulTuning,
    host: &mut dyn SandboxHost,
    coord: GridCoord,
    removal: &Removal,
) {
    for neighbour in coord.neighbours() {
        if let Some(pixel) = host.pixel_mut(neighbour) {
            pixel.add_panic(tuning.panic);
        }
    }
    if !matches!(removal, Removal::Converted(into) if into == SOUL) {
        let _ = host.release_element(coord, SOUL);
    }
}
