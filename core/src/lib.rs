#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the sandbox mod toolkit.
//!
//! This crate defines the surface that connects the falling-sand host, the
//! command console, the area selection tool and the element mods. The host is
//! an external collaborator described by the [`SandboxHost`] trait: mods only
//! call into it through the primitives listed there and never own the grid.
//! Element behaviors are plain [`TickFn`] hooks that the host invokes once per
//! live pixel per frame with a [`TickContext`], and every diagnostic they emit
//! flows through a [`LogSink`].

use std::{
    collections::BTreeMap,
    fmt,
    sync::Arc,
};

use chrono::{Local, NaiveTime, Timelike};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Offsets of the eight neighbours surrounding a pixel, in the host's order.
pub const ADJACENT_OFFSETS: [(i32, i32); 8] = [
    (0, 1),
    (0, -1),
    (1, 0),
    (-1, 0),
    (1, 1),
    (-1, -1),
    (1, -1),
    (-1, 1),
];

/// Draws a uniform sample and reports whether it fell below `probability`.
///
/// Every probabilistic clause in the element mods is guarded by one
/// independent call to this helper.
pub fn roll<R>(rng: &mut R, probability: f64) -> bool
where
    R: RngCore + ?Sized,
{
    rng.gen::<f64>() < probability
}

/// Location of a single cell in the host's simulation grid.
///
/// Coordinates are signed so neighbour offsets may step outside the grid;
/// the host decides whether a coordinate is in bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    x: i32,
    y: i32,
}

impl GridCoord {
    /// Creates a new grid coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Column index of the cell.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Row index of the cell. Rows grow downward.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Returns the coordinate displaced by the provided offsets.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    /// Iterates over the eight neighbours in [`ADJACENT_OFFSETS`] order.
    pub fn neighbours(self) -> impl Iterator<Item = GridCoord> {
        ADJACENT_OFFSETS
            .into_iter()
            .map(move |(dx, dy)| self.offset(dx, dy))
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// Dimensions of the host's simulation grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSize {
    width: u32,
    height: u32,
}

impl GridSize {
    /// Creates a new grid size descriptor.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of columns in the grid.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows in the grid.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Reports whether the coordinate lies inside the grid.
    #[must_use]
    pub fn contains(&self, coord: GridCoord) -> bool {
        coord.x() >= 0
            && coord.y() >= 0
            && i64::from(coord.x()) < i64::from(self.width)
            && i64::from(coord.y()) < i64::from(self.height)
    }

    /// Cell located at the middle of the grid, used when no cursor is known.
    #[must_use]
    pub fn center(&self) -> GridCoord {
        let x = i32::try_from(self.width / 2).unwrap_or(i32::MAX);
        let y = i32::try_from(self.height / 2).unwrap_or(i32::MAX);
        GridCoord::new(x, y)
    }

    /// Range covering every cell of the grid, or `None` for an empty grid.
    #[must_use]
    pub fn full_range(&self) -> Option<SelectionRange> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let x2 = i32::try_from(self.width - 1).unwrap_or(i32::MAX);
        let y2 = i32::try_from(self.height - 1).unwrap_or(i32::MAX);
        Some(SelectionRange::new(0, 0, x2, y2))
    }
}

/// Rectangular region of the simulation grid, inclusive on both ends.
///
/// The only constructors normalize the corners so that `x1 <= x2` and
/// `y1 <= y2`; consumers never need to re-sort them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RangeCorners", into = "RangeCorners")]
pub struct SelectionRange {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

impl SelectionRange {
    /// Creates a range from two arbitrary corners, normalizing their order.
    #[must_use]
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Creates a range spanning the two provided cells.
    #[must_use]
    pub fn from_corners(first: GridCoord, second: GridCoord) -> Self {
        Self::new(first.x(), first.y(), second.x(), second.y())
    }

    /// Creates the square range of the provided radius around `center`.
    #[must_use]
    pub fn around(center: GridCoord, radius: u32) -> Self {
        let radius = i32::try_from(radius).unwrap_or(i32::MAX);
        Self::new(
            center.x().saturating_sub(radius),
            center.y().saturating_sub(radius),
            center.x().saturating_add(radius),
            center.y().saturating_add(radius),
        )
    }

    /// Left column of the range.
    #[must_use]
    pub const fn x1(&self) -> i32 {
        self.x1
    }

    /// Top row of the range.
    #[must_use]
    pub const fn y1(&self) -> i32 {
        self.y1
    }

    /// Right column of the range.
    #[must_use]
    pub const fn x2(&self) -> i32 {
        self.x2
    }

    /// Bottom row of the range.
    #[must_use]
    pub const fn y2(&self) -> i32 {
        self.y2
    }

    /// Number of columns covered by the range.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.x2.abs_diff(self.x1).saturating_add(1)
    }

    /// Number of rows covered by the range.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.y2.abs_diff(self.y1).saturating_add(1)
    }

    /// Reports whether the cell lies inside the range.
    #[must_use]
    pub fn contains(&self, coord: GridCoord) -> bool {
        (self.x1..=self.x2).contains(&coord.x()) && (self.y1..=self.y2).contains(&coord.y())
    }

    /// Intersects the range with the grid, returning `None` when disjoint.
    #[must_use]
    pub fn clamp_to(&self, size: GridSize) -> Option<Self> {
        let full = size.full_range()?;
        let x1 = self.x1.max(full.x1);
        let y1 = self.y1.max(full.y1);
        let x2 = self.x2.min(full.x2);
        let y2 = self.y2.min(full.y2);
        if x1 > x2 || y1 > y2 {
            return None;
        }
        Some(Self { x1, y1, x2, y2 })
    }

    /// Iterates over every cell in the range, row by row.
    pub fn cells(&self) -> impl Iterator<Item = GridCoord> {
        let (x1, x2) = (self.x1, self.x2);
        (self.y1..=self.y2).flat_map(move |y| (x1..=x2).map(move |x| GridCoord::new(x, y)))
    }
}

impl fmt::Display for SelectionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.x1, self.y1, self.x2, self.y2)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct RangeCorners {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

impl From<RangeCorners> for SelectionRange {
    fn from(corners: RangeCorners) -> Self {
        Self::new(corners.x1, corners.y1, corners.x2, corners.y2)
    }
}

impl From<SelectionRange> for RangeCorners {
    fn from(range: SelectionRange) -> Self {
        Self {
            x1: range.x1,
            y1: range.y1,
            x2: range.x2,
            y2: range.y2,
        }
    }
}

/// Importance attached to a console log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// General information.
    Info,
    /// Lifecycle messages emitted by the console itself.
    System,
    /// Echo of a submitted command line.
    Command,
    /// Confirmation that an action completed.
    Success,
    /// Something unexpected that did not prevent execution.
    Warning,
    /// A failed action.
    Error,
}

impl Severity {
    /// Lowercase label used when presenting the severity.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::System => "system",
            Self::Command => "command",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Local wall-clock time of day attached to log entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(NaiveTime);

impl Timestamp {
    const SECONDS_PER_DAY: u64 = 86_400;

    /// Captures the current local time of day, truncated to whole seconds.
    #[must_use]
    pub fn now() -> Self {
        let time = Local::now().time();
        Self(time.with_nanosecond(0).unwrap_or(time))
    }

    /// Creates a timestamp from seconds, wrapping at midnight.
    #[must_use]
    pub fn from_seconds(seconds: u64) -> Self {
        let of_day = u32::try_from(seconds % Self::SECONDS_PER_DAY).unwrap_or(0);
        Self(NaiveTime::from_num_seconds_from_midnight_opt(of_day, 0).unwrap_or(NaiveTime::MIN))
    }

    /// Seconds elapsed since midnight.
    #[must_use]
    pub fn seconds(&self) -> u32 {
        self.0.num_seconds_from_midnight()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M:%S"))
    }
}

/// One line recorded by the console.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Time of day the entry was recorded.
    pub timestamp: Timestamp,
    /// Human readable message.
    pub message: String,
    /// Importance of the message.
    pub severity: Severity,
}

impl LogEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn now(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            timestamp: Timestamp::now(),
            message: message.into(),
            severity,
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp, self.message)
    }
}

/// Destination for diagnostics emitted by mods and element behaviors.
pub trait LogSink {
    /// Records a message with the provided severity.
    fn log(&mut self, message: String, severity: Severity);
}

impl LogSink for Vec<LogEntry> {
    fn log(&mut self, message: String, severity: Severity) {
        self.push(LogEntry::now(message, severity));
    }
}

/// Opaque RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    red: u8,
    green: u8,
    blue: u8,
}

impl Rgb {
    /// Creates a color from byte components.
    #[must_use]
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Creates a color from a packed `0xRRGGBB` value.
    #[must_use]
    pub const fn from_hex(packed: u32) -> Self {
        Self {
            red: ((packed >> 16) & 0xff) as u8,
            green: ((packed >> 8) & 0xff) as u8,
            blue: (packed & 0xff) as u8,
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}

/// Physical state an element is simulated in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatterState {
    /// Static solids such as walls.
    Solid,
    /// Granular solids that fall and pile.
    Powder,
    /// Flowing liquids.
    Liquid,
    /// Rising or drifting gases.
    Gas,
    /// Short-lived energy pixels.
    Energy,
}

impl MatterState {
    /// Lowercase label used when presenting the state.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Solid => "solid",
            Self::Powder => "powder",
            Self::Liquid => "liquid",
            Self::Gas => "gas",
            Self::Energy => "energy",
        }
    }
}

/// Selects which per-pixel state a freshly created pixel carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    /// No element specific state.
    Inert,
    /// Wandering spirit with a movement stage.
    Spirit,
    /// Living matter that can be possessed and panic.
    Vessel,
}

/// Movement stage of a spirit pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoulStage {
    /// Hovers in place, occasionally drifting sideways and upward.
    #[default]
    Drift,
    /// Sweeps diagonally toward increasing rows.
    Descend,
    /// Wanders erratically in random directions.
    Wander,
}

impl SoulStage {
    /// Numeric stage index (0, 1 or 2).
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::Drift => 0,
            Self::Descend => 1,
            Self::Wander => 2,
        }
    }

    /// Stage that follows this one in the one-directional cycle.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Drift => Self::Descend,
            Self::Descend => Self::Wander,
            Self::Wander => Self::Drift,
        }
    }
}

/// Marks a vessel as inhabited by a spirit element.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Possession {
    /// Element that possessed the vessel.
    pub by: String,
}

/// Element specific state carried by a pixel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelState {
    /// No additional state.
    Inert,
    /// Spirit pixels progress through movement stages.
    Spirit {
        /// Current movement stage.
        stage: SoulStage,
    },
    /// Vessels may be possessed and accumulate panic.
    Vessel {
        /// Spirit currently inhabiting the vessel, if any.
        possession: Option<Possession>,
        /// Accumulated panic.
        panic: u32,
    },
}

impl PixelState {
    /// Initial state for a pixel of the provided kind.
    #[must_use]
    pub const fn for_kind(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Inert => Self::Inert,
            ElementKind::Spirit => Self::Spirit {
                stage: SoulStage::Drift,
            },
            ElementKind::Vessel => Self::Vessel {
                possession: None,
                panic: 0,
            },
        }
    }
}

/// A single live cell owned by the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pixel {
    element: String,
    /// Temperature in degrees Celsius.
    pub temperature: f32,
    /// Host tick at which the pixel was created.
    pub born_at: u64,
    /// Horizontal facing used by directional behaviors.
    pub flip_x: bool,
    /// Whether the pixel currently emits light.
    pub glow: bool,
    /// Color override applied on top of the element's palette.
    pub tint: Option<Rgb>,
    /// Element specific state.
    pub state: PixelState,
}

impl Pixel {
    /// Creates a pixel of the provided element.
    #[must_use]
    pub fn spawn(definition: &ElementDefinition, born_at: u64) -> Self {
        Self {
            element: definition.name.clone(),
            temperature: definition.temperature,
            born_at,
            flip_x: false,
            glow: false,
            tint: None,
            state: PixelState::for_kind(definition.kind),
        }
    }

    /// Name of the element this pixel belongs to.
    #[must_use]
    pub fn element(&self) -> &str {
        &self.element
    }

    /// Turns the pixel into another element, resetting element specific state.
    pub fn convert(&mut self, definition: &ElementDefinition) {
        self.element = definition.name.clone();
        self.glow = false;
        self.tint = None;
        self.state = PixelState::for_kind(definition.kind);
    }

    /// Movement stage for spirit pixels.
    #[must_use]
    pub fn soul_stage(&self) -> Option<SoulStage> {
        match self.state {
            PixelState::Spirit { stage } => Some(stage),
            _ => None,
        }
    }

    /// Updates the movement stage; ignored for non-spirit pixels.
    pub fn set_soul_stage(&mut self, next: SoulStage) {
        if let PixelState::Spirit { stage } = &mut self.state {
            *stage = next;
        }
    }

    /// Reports whether the pixel is a possessed vessel.
    #[must_use]
    pub fn is_possessed(&self) -> bool {
        matches!(
            self.state,
            PixelState::Vessel {
                possession: Some(_),
                ..
            }
        )
    }

    /// Reports whether the pixel can be possessed right now.
    #[must_use]
    pub fn is_vacant_vessel(&self) -> bool {
        matches!(
            self.state,
            PixelState::Vessel {
                possession: None,
                ..
            }
        )
    }

    /// Marks a vacant vessel as possessed, returning whether it changed.
    pub fn possess(&mut self, by: &str) -> bool {
        match &mut self.state {
            PixelState::Vessel { possession, .. } if possession.is_none() => {
                *possession = Some(Possession { by: by.to_owned() });
                true
            }
            _ => false,
        }
    }

    /// Clears any possession, returning the spirit that was released.
    pub fn release(&mut self) -> Option<Possession> {
        match &mut self.state {
            PixelState::Vessel { possession, .. } => possession.take(),
            _ => None,
        }
    }

    /// Panic accumulated by a vessel.
    #[must_use]
    pub fn panic(&self) -> Option<u32> {
        match self.state {
            PixelState::Vessel { panic, .. } => Some(panic),
            _ => None,
        }
    }

    /// Adds panic to a vessel; ignored for other pixels.
    pub fn add_panic(&mut self, amount: u32) {
        if let PixelState::Vessel { panic, .. } = &mut self.state {
            *panic = panic.saturating_add(amount);
        }
    }
}

/// What a reaction does to one of its participants.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Transform {
    /// Leave the pixel untouched.
    #[default]
    Keep,
    /// Remove the pixel.
    Delete,
    /// Convert the pixel into the named element.
    Become(String),
}

/// Declarative interaction between an element and a neighbouring partner.
#[derive(Clone, Debug, PartialEq)]
pub struct Reaction {
    /// Element the reaction applies to.
    pub partner: String,
    /// Probability that the reaction fires when the pair is examined.
    pub chance: f64,
    /// Effect on the reacting pixel.
    pub this_becomes: Transform,
    /// Effect on the partner pixel.
    pub other_becomes: Transform,
    /// Panic added to the partner when it is a vessel.
    pub other_panic: u32,
    /// Whether the reacting pixel possesses the partner. Only fires when the
    /// partner is a vacant vessel.
    pub possess_other: bool,
}

impl Reaction {
    /// Creates a reaction with the partner that always fires and changes nothing.
    #[must_use]
    pub fn with(partner: impl Into<String>) -> Self {
        Self {
            partner: partner.into(),
            chance: 1.0,
            this_becomes: Transform::Keep,
            other_becomes: Transform::Keep,
            other_panic: 0,
            possess_other: false,
        }
    }

    /// Sets the firing probability.
    #[must_use]
    pub fn chance(mut self, chance: f64) -> Self {
        self.chance = chance;
        self
    }

    /// Sets the effect on the reacting pixel.
    #[must_use]
    pub fn this_becomes(mut self, transform: Transform) -> Self {
        self.this_becomes = transform;
        self
    }

    /// Sets the effect on the partner pixel.
    #[must_use]
    pub fn other_becomes(mut self, transform: Transform) -> Self {
        self.other_becomes = transform;
        self
    }

    /// Adds panic to the partner.
    #[must_use]
    pub fn other_panic(mut self, panic: u32) -> Self {
        self.other_panic = panic;
        self
    }

    /// Makes the reacting pixel possess the partner.
    #[must_use]
    pub fn possess_other(mut self) -> Self {
        self.possess_other = true;
        self
    }
}

/// Per-pixel behavior invoked by the host once per frame.
///
/// The hook receives the pixel's current cell and returns the cell it
/// occupies afterwards, or `None` once the pixel no longer exists. The host
/// uses the returned cell to run the next chained hook.
pub type TickFn = Arc<dyn Fn(&mut TickContext<'_>, GridCoord) -> Option<GridCoord>>;

/// How a pixel stopped being its element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Removal {
    /// The pixel was deleted and its cell is now empty.
    Deleted,
    /// The pixel was converted in place into the named element.
    Converted(String),
}

/// Hook run by the host after a pixel of the element is deleted or converted.
///
/// Receives the cell the pixel occupied and the pixel as it was before the
/// removal.
pub type RemoveFn = Arc<dyn Fn(&mut dyn SandboxHost, GridCoord, &Pixel, &Removal)>;

/// Collaborators handed to a [`TickFn`] for a single invocation.
pub struct TickContext<'a> {
    /// Host grid the pixel lives in.
    pub host: &'a mut dyn SandboxHost,
    /// Random source used by every probabilistic clause.
    pub rng: &'a mut dyn RngCore,
    /// Destination for observability messages.
    pub log: &'a mut dyn LogSink,
}

impl TickContext<'_> {
    /// Draws an independent sample and reports whether it fell below `probability`.
    pub fn chance(&mut self, probability: f64) -> bool {
        roll(&mut *self.rng, probability)
    }
}

impl fmt::Debug for TickContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickContext")
            .field("size", &self.host.size())
            .finish_non_exhaustive()
    }
}

/// Description of an element known to the host.
#[derive(Clone)]
pub struct ElementDefinition {
    /// Unique registry key.
    pub name: String,
    /// Menu category the element is listed under.
    pub category: String,
    /// Physical state the host simulates the element in.
    pub state: MatterState,
    /// Density used by the host when sorting pixels.
    pub density: f32,
    /// Temperature assigned to freshly created pixels.
    pub temperature: f32,
    /// Whether other pixels may displace this element.
    pub movable: bool,
    /// Whether the element is hidden from the element menu.
    pub hidden: bool,
    /// Short description shown to players.
    pub description: String,
    /// Palette the host samples pixel colors from.
    pub colors: Vec<Rgb>,
    /// Per-pixel state carried by pixels of this element.
    pub kind: ElementKind,
    /// Elements produced when a pixel is shattered.
    pub break_into: Vec<String>,
    /// Chained per-frame hooks, run in installation order.
    pub ticks: Vec<TickFn>,
    /// Hooks run when a pixel is deleted or converted, in installation order.
    pub on_remove: Vec<RemoveFn>,
    /// Reactions with neighbouring elements.
    pub reactions: Vec<Reaction>,
}

impl ElementDefinition {
    /// Creates a definition with neutral defaults.
    #[must_use]
    pub fn new(name: impl Into<String>, category: impl Into<String>, state: MatterState) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            state,
            density: 1_000.0,
            temperature: 20.0,
            movable: !matches!(state, MatterState::Solid),
            hidden: false,
            description: String::new(),
            colors: Vec::new(),
            kind: ElementKind::Inert,
            break_into: Vec::new(),
            ticks: Vec::new(),
            on_remove: Vec::new(),
            reactions: Vec::new(),
        }
    }

    /// Appends a hook that runs after every hook installed so far.
    pub fn add_tick<F>(&mut self, hook: F)
    where
        F: Fn(&mut TickContext<'_>, GridCoord) -> Option<GridCoord> + 'static,
    {
        self.ticks.push(Arc::new(hook));
    }

    /// Appends a hook that runs whenever a pixel of this element is removed.
    pub fn add_remove_hook<F>(&mut self, hook: F)
    where
        F: Fn(&mut dyn SandboxHost, GridCoord, &Pixel, &Removal) + 'static,
    {
        self.on_remove.push(Arc::new(hook));
    }

    /// Reaction registered against the provided partner element, if any.
    #[must_use]
    pub fn reaction_with(&self, partner: &str) -> Option<&Reaction> {
        self.reactions
            .iter()
            .find(|reaction| reaction.partner == partner)
    }

    /// Inserts a reaction, replacing any existing one for the same partner.
    pub fn set_reaction(&mut self, reaction: Reaction) {
        self.reactions
            .retain(|existing| existing.partner != reaction.partner);
        self.reactions.push(reaction);
    }
}

impl fmt::Debug for ElementDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementDefinition")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("state", &self.state)
            .field("kind", &self.kind)
            .field("ticks", &self.ticks.len())
            .field("on_remove", &self.on_remove.len())
            .field("reactions", &self.reactions)
            .finish_non_exhaustive()
    }
}

/// Registry of every element known to the host, keyed by name.
#[derive(Clone, Debug, Default)]
pub struct ElementRegistry {
    definitions: BTreeMap<String, ElementDefinition>,
}

impl ElementRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a definition, returning the one it replaced.
    pub fn insert(&mut self, definition: ElementDefinition) -> Option<ElementDefinition> {
        self.definitions.insert(definition.name.clone(), definition)
    }

    /// Looks up a definition by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ElementDefinition> {
        self.definitions.get(name)
    }

    /// Looks up a definition by name for modification.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ElementDefinition> {
        self.definitions.get_mut(name)
    }

    /// Reports whether the element is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Element names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Definitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ElementDefinition> {
        self.definitions.values()
    }

    /// Number of registered elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Reports whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Reasons a host primitive may refuse a request.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The element is not present in the registry.
    #[error("unknown element '{0}'")]
    UnknownElement(String),
    /// The coordinate lies outside the grid.
    #[error("{0} is outside the grid")]
    OutOfBounds(GridCoord),
    /// The target cell already holds a pixel.
    #[error("{0} is already occupied")]
    Occupied(GridCoord),
}

/// Primitives exposed by the falling-sand host.
///
/// Mods call into the host exclusively through this trait. Coordinates
/// outside the grid are never empty and never hold a pixel.
pub trait SandboxHost {
    /// Dimensions of the simulation grid.
    fn size(&self) -> GridSize;

    /// Registry of known elements.
    fn elements(&self) -> &ElementRegistry;

    /// Registry of known elements, for mods that install definitions.
    fn elements_mut(&mut self) -> &mut ElementRegistry;

    /// Pixel stored at the coordinate.
    fn pixel(&self, coord: GridCoord) -> Option<&Pixel>;

    /// Pixel stored at the coordinate, for in-place modification.
    fn pixel_mut(&mut self, coord: GridCoord) -> Option<&mut Pixel>;

    /// Creates a pixel of the element in an empty, in-bounds cell.
    fn create_pixel(&mut self, element: &str, coord: GridCoord) -> Result<(), HostError>;

    /// Removes and returns the pixel at the coordinate.
    ///
    /// The element's [`RemoveFn`] hooks run after the cell is emptied.
    fn delete_pixel(&mut self, coord: GridCoord) -> Option<Pixel>;

    /// Moves the pixel at `from` into the empty cell `to`, returning success.
    fn try_move(&mut self, from: GridCoord, to: GridCoord) -> bool;

    /// Exchanges the pixels stored at two in-bounds cells.
    fn swap_pixels(&mut self, first: GridCoord, second: GridCoord) -> bool;

    /// Grid cell under the player's pointer, if known.
    fn cursor(&self) -> Option<GridCoord>;

    /// Whether the host simulation is paused.
    fn paused(&self) -> bool;

    /// Pauses or resumes the host simulation.
    fn set_paused(&mut self, paused: bool);

    /// Number of frames the host has simulated.
    fn pixel_ticks(&self) -> u64;

    /// Deletes every pixel without running removal hooks, returning how
    /// many were removed.
    fn clear_pixels(&mut self) -> usize;

    /// Reports whether the coordinate lies inside the grid.
    fn in_bounds(&self, coord: GridCoord) -> bool {
        self.size().contains(coord)
    }

    /// Reports whether the coordinate is inside the grid and holds no pixel.
    fn is_empty(&self, coord: GridCoord) -> bool {
        self.in_bounds(coord) && self.pixel(coord).is_none()
    }

    /// Spawns `element` in the first empty neighbour of `coord`.
    fn release_element(&mut self, coord: GridCoord, element: &str) -> Option<GridCoord> {
        let target = coord.neighbours().find(|cell| self.is_empty(*cell))?;
        self.create_pixel(element, target).ok()?;
        Some(target)
    }
}

/// Failures reported by console command handlers.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The arguments did not match the command's usage string.
    #[error("Usage: {usage}")]
    Usage {
        /// Usage string of the command.
        usage: String,
    },
    /// An argument could not be interpreted.
    #[error("invalid {name} '{value}': expected {expected}")]
    InvalidArgument {
        /// Name of the argument.
        name: &'static str,
        /// Raw value supplied by the user.
        value: String,
        /// Description of the accepted values.
        expected: &'static str,
    },
    /// A host collaborator the command depends on is not attached yet.
    #[error("{dependency} is not available yet")]
    HostUnavailable {
        /// Name of the missing collaborator.
        dependency: &'static str,
    },
    /// The named element is not registered with the host.
    #[error("unknown element '{0}'")]
    UnknownElement(String),
    /// The command needs a stored selection and none exists.
    #[error("no range selected")]
    NoSelection,
    /// The host refused a primitive.
    #[error(transparent)]
    Host(#[from] HostError),
    /// Any other failure raised by a mod.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl CommandError {
    /// Builds a usage error from the command's usage string.
    #[must_use]
    pub fn usage(usage: impl Into<String>) -> Self {
        Self::Usage {
            usage: usage.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn selection_range_normalizes_reversed_corners() {
        let forward = SelectionRange::new(10, 10, 50, 40);
        let reversed = SelectionRange::new(50, 40, 10, 10);
        assert_eq!(forward, reversed);
        assert_eq!(
            (forward.x1(), forward.y1(), forward.x2(), forward.y2()),
            (10, 10, 50, 40)
        );
    }

    #[test]
    fn selection_range_normalizes_when_deserialized() {
        let bytes = bincode::serialize(&RangeCorners {
            x1: 9,
            y1: 7,
            x2: 3,
            y2: 1,
        })
        .expect("serialize");
        let restored: SelectionRange = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored, SelectionRange::new(3, 1, 9, 7));
    }

    #[test]
    fn selection_range_clamps_to_grid() {
        let range = SelectionRange::new(-5, -5, 3, 100);
        let clamped = range.clamp_to(GridSize::new(10, 20)).expect("overlaps");
        assert_eq!(clamped, SelectionRange::new(0, 0, 3, 19));
        assert!(SelectionRange::new(20, 20, 30, 30)
            .clamp_to(GridSize::new(10, 10))
            .is_none());
    }

    #[test]
    fn zero_area_range_covers_one_cell() {
        let range = SelectionRange::new(4, 4, 4, 4);
        assert_eq!(range.width(), 1);
        assert_eq!(range.height(), 1);
        assert_eq!(range.cells().count(), 1);
    }

    #[test]
    fn timestamp_formats_time_of_day() {
        let timestamp = Timestamp::from_seconds(86_400 + 3_600 * 13 + 60 * 7 + 5);
        assert_eq!(timestamp.to_string(), "13:07:05");
        assert_eq!(timestamp.seconds(), 3_600 * 13 + 60 * 7 + 5);
    }

    #[test]
    fn timestamp_now_follows_the_local_clock() {
        let before = Local::now().time().num_seconds_from_midnight();
        let stamp = Timestamp::now().seconds();
        let after = Local::now().time().num_seconds_from_midnight();

        if before <= after {
            assert!((before..=after).contains(&stamp), "{before} <= {stamp} <= {after}");
        }
        assert_eq!(Timestamp::now().to_string().len(), "00:00:00".len());
    }

    #[test]
    fn possession_only_applies_to_vacant_vessels() {
        let mut body = ElementDefinition::new("body", "life", MatterState::Solid);
        body.kind = ElementKind::Vessel;
        let sand = ElementDefinition::new("sand", "land", MatterState::Powder);

        let mut vessel = Pixel::spawn(&body, 0);
        assert!(vessel.possess("soul"));
        assert!(!vessel.possess("soul"), "second possession must be refused");
        assert!(vessel.is_possessed());
        assert_eq!(
            vessel.release(),
            Some(Possession {
                by: "soul".to_owned()
            })
        );

        let mut grain = Pixel::spawn(&sand, 0);
        assert!(!grain.possess("soul"));
        assert_eq!(grain.panic(), None);
    }

    #[test]
    fn soul_stage_cycles_forward() {
        assert_eq!(SoulStage::Drift.next(), SoulStage::Descend);
        assert_eq!(SoulStage::Descend.next(), SoulStage::Wander);
        assert_eq!(SoulStage::Wander.next(), SoulStage::Drift);
    }

    #[test]
    fn roll_respects_extreme_probabilities() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert!((0..1_000).all(|_| !roll(&mut rng, 0.0)));
        assert!((0..1_000).all(|_| roll(&mut rng, 1.0)));
    }

    #[test]
    fn rgb_formats_as_hex() {
        assert_eq!(Rgb::from_hex(0xb3d9ff).to_string(), "#b3d9ff");
    }
}
