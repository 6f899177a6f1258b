//! Bulk possession operations over square areas of the grid.

use sandmod_core::{GridCoord, SandboxHost, SelectionRange};

use crate::SOUL;

/// Vessels the `possess` command may take over.
const POSSESSABLE: [&str; 2] = ["body", "head"];

/// Souls and possessions currently present on the grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SoulCensus {
    /// Live soul pixels.
    pub souls: usize,
    /// Vessels inhabited by a soul.
    pub possessions: usize,
}

fn cells_in_area(host: &dyn SandboxHost, center: GridCoord, radius: u32) -> Vec<GridCoord> {
    SelectionRange::around(center, radius)
        .clamp_to(host.size())
        .map(|range| range.cells().collect())
        .unwrap_or_default()
}

/// Possesses every vacant body and head within `radius` of `center`.
///
/// Returns how many vessels were taken over.
pub fn possess_area(host: &mut dyn SandboxHost, center: GridCoord, radius: u32) -> usize {
    let mut possessed = 0;
    for cell in cells_in_area(host, center, radius) {
        let Some(pixel) = host.pixel_mut(cell) else {
            continue;
        };
        if POSSESSABLE.contains(&pixel.element()) && pixel.possess(SOUL) {
            possessed += 1;
        }
    }
    possessed
}

/// Releases every possession within `radius` of `center`.
///
/// Each released vessel frees a soul into its first empty neighbour. Returns
/// how many possessions were lifted.
pub fn exorcise_area(host: &mut dyn SandboxHost, center: GridCoord, radius: u32) -> usize {
    let mut exorcised = 0;
    for cell in cells_in_area(host, center, radius) {
        let released = host
            .pixel_mut(cell)
            .and_then(|pixel| pixel.release())
            .is_some();
        if released {
            exorcised += 1;
            let _ = host.release_element(cell, SOUL);
        }
    }
    exorcised
}

/// Counts souls and possessed vessels across the whole grid.
#[must_use]
pub fn census(host: &dyn SandboxHost) -> SoulCensus {
    let mut census = SoulCensus::default();
    let Some(full) = host.size().full_range() else {
        return census;
    };
    for pixel in full.cells().filter_map(|cell| host.pixel(cell)) {
        if pixel.element() == SOUL {
            census.souls += 1;
        }
        if pixel.is_possessed() {
            census.possessions += 1;
        }
    }
    census
}
