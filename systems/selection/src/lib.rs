#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Area selection tool that turns a pointer drag into a grid range.
//!
//! The tool is a small state machine. While active, a press on the
//! simulation surface anchors a drag, pointer motion updates a screen-space
//! preview and the release converts both corners into grid cells and stores
//! the single live [`SelectionRange`]. Outcomes are reported as
//! [`SelectionEvent`]s so the caller decides how to surface them.

use std::fmt;

use glam::Vec2;
use sandmod_core::{GridCoord, GridSize, SelectionRange, Severity};
use tracing::debug;

/// Screen-space placement of the simulation canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasBounds {
    origin: Vec2,
    size: Vec2,
    cell_size: f32,
}

impl CanvasBounds {
    /// Creates bounds from the canvas's top-left corner, extent and cell size.
    ///
    /// Cell sizes below one screen unit are raised to one.
    #[must_use]
    pub fn new(origin: Vec2, size: Vec2, cell_size: f32) -> Self {
        Self {
            origin,
            size: size.max(Vec2::ZERO),
            cell_size: cell_size.max(1.0),
        }
    }

    /// Creates bounds that exactly cover a grid drawn at `cell_size`.
    #[must_use]
    pub fn for_grid(origin: Vec2, grid: GridSize, cell_size: f32) -> Self {
        let cells = Vec2::new(grid.width() as f32, grid.height() as f32);
        Self::new(origin, cells * cell_size.max(1.0), cell_size)
    }

    /// Top-left corner of the canvas in screen space.
    #[must_use]
    pub const fn origin(&self) -> Vec2 {
        self.origin
    }

    /// Width and height of the canvas in screen space.
    #[must_use]
    pub const fn size(&self) -> Vec2 {
        self.size
    }

    /// Screen-space length of one grid cell.
    #[must_use]
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Reports whether the screen point lies on the canvas.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        let local = point - self.origin;
        local.x >= 0.0 && local.y >= 0.0 && local.x < self.size.x && local.y < self.size.y
    }

    /// Grid cell under the screen point.
    #[must_use]
    pub fn to_grid(&self, point: Vec2) -> GridCoord {
        let cell = ((point - self.origin) / self.cell_size).floor();
        GridCoord::new(cell.x as i32, cell.y as i32)
    }

    /// Screen rectangle covering every cell of the range.
    #[must_use]
    pub fn project(&self, range: SelectionRange) -> ScreenRect {
        let min = Vec2::new(range.x1() as f32, range.y1() as f32);
        let max = Vec2::new(range.x2() as f32 + 1.0, range.y2() as f32 + 1.0);
        ScreenRect {
            min: self.origin + min * self.cell_size,
            max: self.origin + max * self.cell_size,
        }
    }
}

/// Axis-aligned rectangle in screen space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenRect {
    min: Vec2,
    max: Vec2,
}

impl ScreenRect {
    /// Creates the rectangle spanned by two arbitrary corners.
    #[must_use]
    pub fn from_corners(first: Vec2, second: Vec2) -> Self {
        Self {
            min: first.min(second),
            max: first.max(second),
        }
    }

    /// Top-left corner.
    #[must_use]
    pub const fn min(&self) -> Vec2 {
        self.min
    }

    /// Bottom-right corner.
    #[must_use]
    pub const fn max(&self) -> Vec2 {
        self.max
    }

    /// Width and height of the rectangle.
    #[must_use]
    pub fn extent(&self) -> Vec2 {
        self.max - self.min
    }
}

/// Element a pointer press landed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerTarget {
    /// The simulation canvas.
    Surface,
    /// The console panel, its buttons or any other overlay.
    Overlay,
}

/// Observable outcomes of selection interactions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionEvent {
    /// The tool was switched on.
    ToolActivated,
    /// The tool was switched off.
    ToolDeactivated,
    /// A press while the tool was active did not land on the canvas.
    PointerOutsideSurface,
    /// A drag completed and its range was stored.
    AreaSelected {
        /// Normalized grid range covered by the drag.
        range: SelectionRange,
    },
    /// A drag ended without storing a range.
    SelectionCancelled,
}

impl SelectionEvent {
    /// Severity the event is logged with.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::AreaSelected { .. } => Severity::Success,
            Self::SelectionCancelled => Severity::Warning,
            Self::ToolActivated | Self::ToolDeactivated | Self::PointerOutsideSurface => {
                Severity::Info
            }
        }
    }
}

impl fmt::Display for SelectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToolActivated => f.write_str("SELECT tool activated. Drag on canvas to select an area."),
            Self::ToolDeactivated => f.write_str("SELECT tool deactivated."),
            Self::PointerOutsideSurface => {
                f.write_str("Click not on game canvas, skipping selection drag.")
            }
            Self::AreaSelected { range } => write!(f, "Area selected: {range}"),
            Self::SelectionCancelled => {
                f.write_str("Selection released outside the canvas; nothing stored.")
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Drag {
    anchor: Vec2,
    current: Vec2,
}

/// Selection tool state: activation, drag in progress and the stored range.
#[derive(Clone, Debug, Default)]
pub struct AreaSelection {
    active: bool,
    drag: Option<Drag>,
    stored: Option<SelectionRange>,
    highlight_visible: bool,
}

impl AreaSelection {
    /// Creates an inactive tool with no stored range.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports whether the tool is switched on.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Reports whether a drag is in progress.
    #[must_use]
    pub const fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Flips tool activation. Switching off abandons any drag in progress.
    pub fn toggle_tool(&mut self, out: &mut Vec<SelectionEvent>) {
        self.active = !self.active;
        if self.active {
            out.push(SelectionEvent::ToolActivated);
            return;
        }
        if self.drag.take().is_some() {
            out.push(SelectionEvent::SelectionCancelled);
        }
        out.push(SelectionEvent::ToolDeactivated);
    }

    /// Starts a drag at the screen point.
    ///
    /// Starting a drag discards the stored range and hides the highlight
    /// immediately. Presses while the tool is off are ignored silently.
    pub fn begin_selection(
        &mut self,
        point: Vec2,
        target: PointerTarget,
        canvas: &CanvasBounds,
        out: &mut Vec<SelectionEvent>,
    ) -> bool {
        if !self.active {
            return false;
        }
        if target != PointerTarget::Surface || !canvas.contains(point) {
            out.push(SelectionEvent::PointerOutsideSurface);
            return false;
        }

        self.drag = Some(Drag {
            anchor: point,
            current: point,
        });
        self.stored = None;
        self.highlight_visible = false;
        debug!(x = point.x, y = point.y, "selection drag started");
        true
    }

    /// Moves the free corner of the drag preview.
    pub fn update_selection(&mut self, point: Vec2) {
        if let Some(drag) = &mut self.drag {
            drag.current = point;
        }
    }

    /// Finishes the drag, storing the range it covers.
    ///
    /// A release outside the canvas abandons the drag and stores nothing.
    pub fn commit_selection(
        &mut self,
        point: Vec2,
        canvas: &CanvasBounds,
        out: &mut Vec<SelectionEvent>,
    ) -> Option<SelectionRange> {
        let drag = self.drag.take()?;
        if !canvas.contains(point) {
            out.push(SelectionEvent::SelectionCancelled);
            return None;
        }

        let range = SelectionRange::from_corners(canvas.to_grid(drag.anchor), canvas.to_grid(point));
        self.stored = Some(range);
        self.highlight_visible = true;
        out.push(SelectionEvent::AreaSelected { range });
        Some(range)
    }

    /// Replaces the stored range and shows its highlight.
    pub fn set_range(&mut self, range: SelectionRange) {
        self.stored = Some(range);
        self.highlight_visible = true;
    }

    /// Currently stored range.
    #[must_use]
    pub const fn stored_range(&self) -> Option<SelectionRange> {
        self.stored
    }

    /// Discards the stored range and hides the highlight.
    pub fn clear_selection(&mut self) -> Option<SelectionRange> {
        self.highlight_visible = false;
        self.stored.take()
    }

    /// Screen rectangle to draw over the canvas, if any.
    ///
    /// While dragging this is the raw preview; afterwards it covers the
    /// stored range until the selection is cleared or a new drag starts.
    #[must_use]
    pub fn highlight(&self, canvas: &CanvasBounds) -> Option<ScreenRect> {
        if let Some(drag) = self.drag {
            return Some(ScreenRect::from_corners(drag.anchor, drag.current));
        }
        if !self.highlight_visible {
            return None;
        }
        self.stored.map(|range| canvas.project(range))
    }
}
