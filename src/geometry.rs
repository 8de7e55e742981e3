//! Geometry resolution: layout entry + work area -> concrete pixel rectangle
//!
//! Three mutually exclusive strategies (grid > anchor > explicit/percent),
//! all funneled through a final clamp that keeps at least a 50 px footprint
//! inside the monitor's work area.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::LayoutEntry;
use crate::errors::{Error, Result};

/// Smallest visible footprint a resolved rectangle may have, in pixels.
pub const MIN_DIMENSION: i32 = 50;

/// A monitor's usable region, excluding taskbars/docks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkArea {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl WorkArea {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// Inset all four edges by `pad` pixels. A pad that would leave less
    /// than the minimum footprint is ignored with a warning.
    pub fn padded(&self, pad: i32) -> Self {
        if pad <= 0 {
            return *self;
        }
        let inner = Self::new(
            self.left + pad,
            self.top + pad,
            self.right - pad,
            self.bottom - pad,
        );
        if inner.width() < MIN_DIMENSION || inner.height() < MIN_DIMENSION {
            warn!(pad, "pad leaves no usable work area, ignoring");
            return *self;
        }
        inner
    }
}

/// A resolved window rectangle in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// Named reference positions on the work area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    TopLeft,
    Top,
    TopRight,
    Left,
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl Anchor {
    /// Parse a name or abbreviation. Unrecognized input falls back to
    /// TopLeft with a warning rather than failing the entry.
    pub fn parse(raw: &str) -> Self {
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "topleft" | "tl" => Self::TopLeft,
            "top" | "t" => Self::Top,
            "topright" | "tr" => Self::TopRight,
            "left" | "l" => Self::Left,
            "center" | "centre" | "c" => Self::Center,
            "right" | "r" => Self::Right,
            "bottomleft" | "bl" => Self::BottomLeft,
            "bottom" | "b" => Self::Bottom,
            "bottomright" | "br" => Self::BottomRight,
            _ => {
                warn!(anchor = %raw, "unrecognized anchor, falling back to TopLeft");
                Self::TopLeft
            }
        }
    }

    /// Horizontal placement: 0 = flush left, 1 = centered, 2 = flush right.
    fn column(&self) -> u8 {
        match self {
            Self::TopLeft | Self::Left | Self::BottomLeft => 0,
            Self::Top | Self::Center | Self::Bottom => 1,
            Self::TopRight | Self::Right | Self::BottomRight => 2,
        }
    }

    fn row(&self) -> u8 {
        match self {
            Self::TopLeft | Self::Top | Self::TopRight => 0,
            Self::Left | Self::Center | Self::Right => 1,
            Self::BottomLeft | Self::Bottom | Self::BottomRight => 2,
        }
    }
}

/// Compute the target rectangle for an entry on a work area.
///
/// Strategy precedence: grid > anchor > explicit/percent. Every strategy's
/// output is clamped into the work area before being returned.
pub fn compute_rect(entry: &LayoutEntry, area: &WorkArea) -> Result<Rect> {
    let rect = if entry.grid.is_some() {
        grid_rect(entry, area)?
    } else if let Some(anchor) = entry.anchor.as_deref() {
        anchor_rect(Anchor::parse(anchor), entry, area)
    } else {
        explicit_rect(entry, area)
    };
    Ok(clamp_to_area(rect, area))
}

/// Clamp a rectangle fully inside the work area.
///
/// Width/height first into [50, area dimension], then origin so the far
/// edge stays inside. Guarantees x >= left, x + width <= right (y/height
/// analogous) for any input, including degenerate work areas.
pub fn clamp_to_area(rect: Rect, area: &WorkArea) -> Rect {
    let width = rect
        .width
        .min(area.width().max(MIN_DIMENSION))
        .max(MIN_DIMENSION);
    let height = rect
        .height
        .min(area.height().max(MIN_DIMENSION))
        .max(MIN_DIMENSION);
    let x = rect.x.min(area.right - width).max(area.left);
    let y = rect.y.min(area.bottom - height).max(area.top);
    Rect::new(x, y, width, height)
}

fn parse_grid(spec: &str) -> Result<(u32, u32)> {
    let (rows, cols) = spec
        .split_once(['x', 'X'])
        .ok_or_else(|| Error::Geometry(format!("malformed grid spec '{spec}', expected RxC")))?;
    let rows: u32 = rows
        .trim()
        .parse()
        .map_err(|_| Error::Geometry(format!("malformed grid rows in '{spec}'")))?;
    let cols: u32 = cols
        .trim()
        .parse()
        .map_err(|_| Error::Geometry(format!("malformed grid columns in '{spec}'")))?;
    if rows == 0 || cols == 0 {
        return Err(Error::Geometry(format!("grid '{spec}' must have at least 1x1 cells")));
    }
    Ok((rows, cols))
}

fn parse_cell(spec: &str, rows: u32, cols: u32) -> Result<(u32, u32)> {
    let (row, col) = spec
        .split_once(',')
        .ok_or_else(|| Error::Geometry(format!("malformed cell '{spec}', expected row,col")))?;
    let row: u32 = row
        .trim()
        .parse()
        .map_err(|_| Error::Geometry(format!("malformed cell row in '{spec}'")))?;
    let col: u32 = col
        .trim()
        .parse()
        .map_err(|_| Error::Geometry(format!("malformed cell column in '{spec}'")))?;
    if row < 1 || row > rows || col < 1 || col > cols {
        return Err(Error::Geometry(format!(
            "cell '{spec}' outside {rows}x{cols} grid"
        )));
    }
    Ok((row, col))
}

/// Grid strategy. Cell sizes are computed in real arithmetic and rounded
/// per boundary, so spanned cells never accumulate rounding drift and a
/// zero-gutter grid tiles the work area exactly.
fn grid_rect(entry: &LayoutEntry, area: &WorkArea) -> Result<Rect> {
    let spec = entry.grid.as_deref().unwrap_or_default();
    let (rows, cols) = parse_grid(spec)?;
    let cell = entry
        .cell
        .as_deref()
        .ok_or_else(|| Error::Geometry(format!("grid '{spec}' requires a cell")))?;
    let (row, col) = parse_cell(cell, rows, cols)?;

    let row_span = entry.row_span.unwrap_or(1).max(1).min(rows - row + 1);
    let col_span = entry.col_span.unwrap_or(1).max(1).min(cols - col + 1);
    let gutter = entry.gutter.unwrap_or(0).max(0) as f64;
    let inner = area.padded(entry.outer_gutter.unwrap_or(0));

    let cell_w = (inner.width() as f64 - (cols - 1) as f64 * gutter) / cols as f64;
    let cell_h = (inner.height() as f64 - (rows - 1) as f64 * gutter) / rows as f64;
    let x_at = |i: u32| inner.left as f64 + i as f64 * (cell_w + gutter);
    let y_at = |i: u32| inner.top as f64 + i as f64 * (cell_h + gutter);

    let x = x_at(col - 1).round() as i32;
    let y = y_at(row - 1).round() as i32;
    let width = (x_at(col - 1 + col_span) - gutter).round() as i32 - x;
    let height = (y_at(row - 1 + row_span) - gutter).round() as i32 - y;
    Ok(Rect::new(x, y, width, height))
}

fn anchor_rect(anchor: Anchor, entry: &LayoutEntry, area: &WorkArea) -> Rect {
    let width = dimension(entry.width, entry.width_pct, area.width());
    let height = dimension(entry.height, entry.height_pct, area.height());
    let x = match anchor.column() {
        0 => area.left,
        1 => area.left + (area.width() - width) / 2,
        _ => area.right - width,
    };
    let y = match anchor.row() {
        0 => area.top,
        1 => area.top + (area.height() - height) / 2,
        _ => area.bottom - height,
    };
    Rect::new(x, y, width, height)
}

fn explicit_rect(entry: &LayoutEntry, area: &WorkArea) -> Rect {
    let width = dimension(entry.width, entry.width_pct, area.width());
    let height = dimension(entry.height, entry.height_pct, area.height());
    let x = area.left + offset(entry.x, entry.x_pct, area.width());
    let y = area.top + offset(entry.y, entry.y_pct, area.height());
    Rect::new(x, y, width, height)
}

/// Absolute value wins over percentage; neither means the full dimension.
fn dimension(absolute: Option<i32>, pct: Option<f64>, full: i32) -> i32 {
    match (absolute, pct) {
        (Some(v), _) => v,
        (None, Some(p)) => (p / 100.0 * full as f64).round() as i32,
        (None, None) => full,
    }
}

/// Offset from the work-area origin; defaults to 0.
fn offset(absolute: Option<i32>, pct: Option<f64>, full: i32) -> i32 {
    match (absolute, pct) {
        (Some(v), _) => v,
        (None, Some(p)) => (p / 100.0 * full as f64).round() as i32,
        (None, None) => 0,
    }
}
