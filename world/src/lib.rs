#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Reference falling-sand host used to run and test the mod toolkit.
//!
//! The world stores pixels in a dense grid, owns the element registry and
//! sweeps every live pixel once per frame, invoking the element's chained
//! tick hooks and consulting its declarative reaction table. It performs no
//! movement physics of its own: every movement comes from tick hooks.

use rand::{Rng, RngCore};
use sandmod_core::{
    roll, ElementDefinition, ElementKind, ElementRegistry, GridCoord, GridSize, HostError,
    LogSink, MatterState, Pixel, Reaction, RemoveFn, Removal, Rgb, SandboxHost, TickContext,
    TickFn, Transform, ADJACENT_OFFSETS,
};
use tracing::trace;

const DEFAULT_WIDTH: u32 = 160;
const DEFAULT_HEIGHT: u32 = 90;

/// Number of frames an energy pixel survives before fading.
const ENERGY_LIFETIME: u64 = 4;

/// Authoritative in-process host state.
#[derive(Debug)]
pub struct World {
    size: GridSize,
    cells: Vec<Option<Cell>>,
    elements: ElementRegistry,
    cursor: Option<GridCoord>,
    paused: bool,
    tick_index: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates a world of the default size populated with the base catalogue.
    #[must_use]
    pub fn new() -> Self {
        Self::with_size(GridSize::new(DEFAULT_WIDTH, DEFAULT_HEIGHT))
    }

    /// Creates a world of the provided size populated with the base catalogue.
    #[must_use]
    pub fn with_size(size: GridSize) -> Self {
        Self::with_elements(size, base_elements())
    }

    /// Creates a world of the provided size using a custom registry.
    #[must_use]
    pub fn with_elements(size: GridSize, elements: ElementRegistry) -> Self {
        let capacity_u64 = u64::from(size.width()) * u64::from(size.height());
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        let mut cells = Vec::with_capacity(capacity);
        cells.resize_with(capacity, || None);
        Self {
            size,
            cells,
            elements,
            cursor: None,
            paused: false,
            tick_index: 0,
        }
    }

    /// Moves the player's pointer to the provided cell.
    pub fn set_cursor(&mut self, cursor: Option<GridCoord>) {
        self.cursor = cursor.filter(|cell| self.size.contains(*cell));
    }

    /// Advances the simulation by one frame.
    ///
    /// Cells are swept bottom-up from a snapshot taken at the start of the
    /// frame. Every pixel is visited at most once, even if an earlier hook
    /// moved it into a cell that is visited later. A pixel pushed into a cell
    /// the sweep has already passed, such as one displaced downwards by a
    /// rising swap, waits for the next frame. Paused worlds do not advance.
    pub fn step(&mut self, rng: &mut dyn RngCore, log: &mut dyn LogSink) -> FrameSummary {
        if self.paused {
            return FrameSummary::default();
        }

        self.tick_index = self.tick_index.saturating_add(1);
        let frame = self.tick_index;
        let mut summary = FrameSummary::default();

        for coord in self.sweep_order() {
            let Some(element) = self.begin_visit(coord, frame) else {
                continue;
            };
            let Some(definition) = self.elements.get(&element) else {
                continue;
            };
            let hooks: Vec<TickFn> = definition.ticks.clone();
            let reacts = !definition.reactions.is_empty();

            summary.visited += 1;
            let mut position = Some(coord);
            for hook in hooks {
                let Some(current) = position else {
                    break;
                };
                position = {
                    let mut context = TickContext {
                        host: &mut *self,
                        rng: &mut *rng,
                        log: &mut *log,
                    };
                    hook(&mut context, current)
                };
                if !self.holds(position, &element) {
                    position = None;
                }
            }

            if reacts {
                if let Some(current) = position {
                    if self.react(current, &element, rng) {
                        summary.reactions += 1;
                    }
                }
            }
        }

        trace!(
            frame,
            visited = summary.visited,
            reactions = summary.reactions,
            "world frame advanced"
        );
        summary
    }

    fn sweep_order(&self) -> Vec<GridCoord> {
        let mut order = Vec::new();
        for y in (0..self.size.height()).rev() {
            for x in 0..self.size.width() {
                let coord = grid_coord(x, y);
                if self.pixel(coord).is_some() {
                    order.push(coord);
                }
            }
        }
        order
    }

    fn begin_visit(&mut self, coord: GridCoord, frame: u64) -> Option<String> {
        let index = self.index(coord)?;
        let cell = self.cells.get_mut(index)?.as_mut()?;
        if cell.visited_at == Some(frame) {
            return None;
        }
        cell.visited_at = Some(frame);
        Some(cell.pixel.element().to_owned())
    }

    fn holds(&self, position: Option<GridCoord>, element: &str) -> bool {
        position
            .and_then(|coord| self.pixel(coord))
            .is_some_and(|pixel| pixel.element() == element)
    }

    fn react(&mut self, coord: GridCoord, element: &str, rng: &mut dyn RngCore) -> bool {
        let (dx, dy) = ADJACENT_OFFSETS[rng.gen_range(0..ADJACENT_OFFSETS.len())];
        let neighbour = coord.offset(dx, dy);
        let Some(partner) = self.pixel(neighbour).map(|pixel| pixel.element().to_owned()) else {
            return false;
        };
        let Some(reaction) = self
            .elements
            .get(element)
            .and_then(|definition| definition.reaction_with(&partner))
            .cloned()
        else {
            return false;
        };

        if reaction.possess_other
            && !self
                .pixel(neighbour)
                .is_some_and(Pixel::is_vacant_vessel)
        {
            return false;
        }
        if !roll(rng, reaction.chance) {
            return false;
        }

        self.apply_reaction(coord, neighbour, element, &reaction);
        true
    }

    fn apply_reaction(
        &mut self,
        coord: GridCoord,
        neighbour: GridCoord,
        element: &str,
        reaction: &Reaction,
    ) {
        if let Some(other) = self.pixel_mut(neighbour) {
            if reaction.possess_other {
                let _ = other.possess(element);
            }
            if reaction.other_panic > 0 {
                other.add_panic(reaction.other_panic);
            }
        }
        self.transform(neighbour, &reaction.other_becomes);
        self.transform(coord, &reaction.this_becomes);
    }

    fn transform(&mut self, coord: GridCoord, transform: &Transform) {
        match transform {
            Transform::Keep => {}
            Transform::Delete => {
                let _ = self.delete_pixel(coord);
            }
            Transform::Become(name) => {
                let Some(definition) = self.elements.get(name).cloned() else {
                    return;
                };
                let Some(pixel) = self.pixel_mut(coord) else {
                    return;
                };
                if pixel.element() == name.as_str() {
                    return;
                }
                let before = pixel.clone();
                pixel.convert(&definition);
                self.notify_removal(coord, &before, &Removal::Converted(name.clone()));
            }
        }
    }

    fn notify_removal(&mut self, coord: GridCoord, pixel: &Pixel, removal: &Removal) {
        let hooks: Vec<RemoveFn> = self
            .elements
            .get(pixel.element())
            .map(|definition| definition.on_remove.clone())
            .unwrap_or_default();
        for hook in hooks {
            hook(&mut *self, coord, pixel, removal);
        }
    }

    fn index(&self, coord: GridCoord) -> Option<usize> {
        if !self.size.contains(coord) {
            return None;
        }
        let x = usize::try_from(coord.x()).ok()?;
        let y = usize::try_from(coord.y()).ok()?;
        let width = usize::try_from(self.size.width()).ok()?;
        Some(y * width + x)
    }

    fn cell(&self, coord: GridCoord) -> Option<&Cell> {
        self.index(coord)
            .and_then(|index| self.cells.get(index))
            .and_then(Option::as_ref)
    }
}

impl SandboxHost for World {
    fn size(&self) -> GridSize {
        self.size
    }

    fn elements(&self) -> &ElementRegistry {
        &self.elements
    }

    fn elements_mut(&mut self) -> &mut ElementRegistry {
        &mut self.elements
    }

    fn pixel(&self, coord: GridCoord) -> Option<&Pixel> {
        self.cell(coord).map(|cell| &cell.pixel)
    }

    fn pixel_mut(&mut self, coord: GridCoord) -> Option<&mut Pixel> {
        let index = self.index(coord)?;
        self.cells
            .get_mut(index)
            .and_then(Option::as_mut)
            .map(|cell| &mut cell.pixel)
    }

    fn create_pixel(&mut self, element: &str, coord: GridCoord) -> Result<(), HostError> {
        let definition = self
            .elements
            .get(element)
            .ok_or_else(|| HostError::UnknownElement(element.to_owned()))?;
        let pixel = Pixel::spawn(definition, self.tick_index);
        let index = self.index(coord).ok_or(HostError::OutOfBounds(coord))?;
        let slot = self
            .cells
            .get_mut(index)
            .ok_or(HostError::OutOfBounds(coord))?;
        if slot.is_some() {
            return Err(HostError::Occupied(coord));
        }
        *slot = Some(Cell {
            pixel,
            visited_at: None,
        });
        Ok(())
    }

    fn delete_pixel(&mut self, coord: GridCoord) -> Option<Pixel> {
        let index = self.index(coord)?;
        let pixel = self.cells.get_mut(index).and_then(Option::take)?.pixel;
        self.notify_removal(coord, &pixel, &Removal::Deleted);
        Some(pixel)
    }

    fn try_move(&mut self, from: GridCoord, to: GridCoord) -> bool {
        let (Some(source), Some(target)) = (self.index(from), self.index(to)) else {
            return false;
        };
        if source == target || self.cells[target].is_some() || self.cells[source].is_none() {
            return false;
        }
        self.cells.swap(source, target);
        true
    }

    fn swap_pixels(&mut self, first: GridCoord, second: GridCoord) -> bool {
        let (Some(a), Some(b)) = (self.index(first), self.index(second)) else {
            return false;
        };
        if a == b || self.cells[a].is_none() || self.cells[b].is_none() {
            return false;
        }
        self.cells.swap(a, b);
        true
    }

    fn cursor(&self) -> Option<GridCoord> {
        self.cursor
    }

    fn paused(&self) -> bool {
        self.paused
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn pixel_ticks(&self) -> u64 {
        self.tick_index
    }

    fn clear_pixels(&mut self) -> usize {
        let mut removed = 0;
        for slot in &mut self.cells {
            if slot.take().is_some() {
                removed += 1;
            }
        }
        removed
    }
}

/// Counters describing a single simulated frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameSummary {
    /// Pixels whose hooks were invoked.
    pub visited: usize,
    /// Reactions that fired.
    pub reactions: usize,
}

#[derive(Clone, Debug)]
struct Cell {
    pixel: Pixel,
    visited_at: Option<u64>,
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use sandmod_core::{GridCoord, SandboxHost};

    use super::{grid_coord, World};

    /// Number of live pixels.
    #[must_use]
    pub fn pixel_count(world: &World) -> usize {
        world.cells.iter().filter(|cell| cell.is_some()).count()
    }

    /// Number of live pixels of the provided element.
    #[must_use]
    pub fn count_of(world: &World, element: &str) -> usize {
        world
            .cells
            .iter()
            .flatten()
            .filter(|cell| cell.pixel.element() == element)
            .count()
    }

    /// Cells that currently hold a pixel of the provided element, row by row.
    #[must_use]
    pub fn cells_of(world: &World, element: &str) -> Vec<GridCoord> {
        let size = world.size();
        let mut found = Vec::new();
        for y in 0..size.height() {
            for x in 0..size.width() {
                let coord = grid_coord(x, y);
                if world
                    .pixel(coord)
                    .is_some_and(|pixel| pixel.element() == element)
                {
                    found.push(coord);
                }
            }
        }
        found
    }
}

fn grid_coord(x: u32, y: u32) -> GridCoord {
    GridCoord::new(
        i32::try_from(x).unwrap_or(i32::MAX),
        i32::try_from(y).unwrap_or(i32::MAX),
    )
}

/// Element catalogue the reference world starts with.
#[must_use]
pub fn base_elements() -> ElementRegistry {
    let mut registry = ElementRegistry::new();
    let definitions = [
        element("sand", "land", MatterState::Powder, 1_602.0, &[0xe6d577]),
        element("rock", "land", MatterState::Powder, 2_550.0, &[0x808080]),
        element("water", "liquids", MatterState::Liquid, 997.0, &[0x2167ff]),
        element("magma", "liquids", MatterState::Liquid, 2_725.0, &[0xff6f00]),
        element("wall", "solids", MatterState::Solid, 0.0, &[0x808080]),
        element("rock_wall", "solids", MatterState::Solid, 2_550.0, &[0x666666]),
        element("wire", "machines", MatterState::Solid, 8_960.0, &[0x4d0a03]),
        vessel("body", 1_500.0, &[0x069469]),
        vessel("head", 1_080.0, &[0xf3e7db]),
        vessel("human", 1_450.0, &[0xf5eac6]),
        energy("flash", &[0xfffdcf]),
        energy("proton", &[0xffff00]),
        energy("bless", &[0xffffff]),
    ];
    for definition in definitions {
        let _ = registry.insert(definition);
    }
    registry
}

fn element(
    name: &str,
    category: &str,
    state: MatterState,
    density: f32,
    colors: &[u32],
) -> ElementDefinition {
    let mut definition = ElementDefinition::new(name, category, state);
    definition.density = density;
    definition.colors = colors.iter().copied().map(Rgb::from_hex).collect();
    definition
}

fn vessel(name: &str, density: f32, colors: &[u32]) -> ElementDefinition {
    let mut definition = element(name, "life", MatterState::Solid, density, colors);
    definition.kind = ElementKind::Vessel;
    definition.movable = true;
    definition.temperature = 37.0;
    definition
}

fn energy(name: &str, colors: &[u32]) -> ElementDefinition {
    let mut definition = element(name, "energy", MatterState::Energy, 0.0, colors);
    definition.add_tick(fade_energy);
    definition
}

fn fade_energy(context: &mut TickContext<'_>, coord: GridCoord) -> Option<GridCoord> {
    let ticks = context.host.pixel_ticks();
    let born_at = context.host.pixel(coord)?.born_at;
    if ticks.saturating_sub(born_at) >= ENERGY_LIFETIME {
        let _ = context.host.delete_pixel(coord);
        return None;
    }
    Some(coord)
}
