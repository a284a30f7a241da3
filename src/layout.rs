//! Composite layout engine — place fragment codes, an optional target-list
//! code and an optional label on one canvas.
//!
//! # Geometry
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ N+1                                          │  ← top band (only with aux code or label)
//! │ ┌─────┐  LABEL TEXT                          │
//! │ │ aux │                                      │
//! │ └─────┘                                      │
//! ├──────────────────────┬───────────────────────┤
//! │ 1                    │ 2                     │  ← grid, cols = ceil(sqrt(N))
//! │ ┌──────────┐         │ ┌──────────┐          │
//! │ │ fragment │         │ │ fragment │          │
//! │ └──────────┘         │ └──────────┘          │
//! ├──────────────────────┼───────────────────────┤
//! │ 3 …                  │ 4 …                   │
//! └──────────────────────┴───────────────────────┘
//! ```
//!
//! Cells are square, `canvas_width / cols` on a side.  Each code sits one
//! margin in from its cell's top-left corner with its numeral drawn in the
//! margin above it.  The canvas height is cropped to the lowest placed
//! content plus one margin.
//!
//! Planning is a pure function of the input sizes and [`LayoutSpec`];
//! rendering replays the plan onto any [`Surface`].

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const WHITE: Rgba<u8> = Rgba([0xFF, 0xFF, 0xFF, 0xFF]);
pub const INK:   Rgba<u8> = Rgba([0x00, 0x00, 0x00, 0xFF]);

/// Pixel scale of frame numerals (3×5 glyphs → 9×15).
pub const NUMERAL_SCALE: u32 = 3;
/// Pixel scale of label text (3×5 glyphs → 6×10).
pub const LABEL_SCALE: u32 = 2;

const GLYPH_W: u32 = 3;
const GLYPH_H: u32 = 5;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LayoutError {
    #[error("No fragment codes to lay out")]
    NoFragments,
    #[error("Fragment {order} code ({width}x{height}) does not fit its {available}x{available} cell area")]
    CellOverflow { order: u32, width: u32, height: u32, available: u32 },
    #[error("Top band content is {needed} px wide, canvas is {available} px")]
    BandOverflow { needed: u32, available: u32 },
    #[error("Layout needs {needed} px of height, canvas is {available} px")]
    CanvasOverflow { needed: u32, available: u32 },
    #[error("Plan references fragment {0} but no image was supplied")]
    MissingImage(u32),
}

// ── Geometry types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub width:  u32,
    pub height: u32,
}

impl Size {
    pub fn of(image: &RgbaImage) -> Self {
        Self { width: image.width(), height: image.height() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x:      u32,
    pub y:      u32,
    pub width:  u32,
    pub height: u32,
}

impl Rect {
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSpec {
    pub canvas_width:  u32,
    pub canvas_height: u32,
    pub margin:        u32,
}

impl Default for LayoutSpec {
    fn default() -> Self {
        Self { canvas_width: 1000, canvas_height: 1600, margin: 24 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementKind {
    Label(String),
    Auxiliary,
    Fragment(u32),
    Numeral(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub kind: PlacementKind,
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPlan {
    /// Cropped canvas size.
    pub width:      u32,
    pub height:     u32,
    pub cols:       u32,
    pub rows:       u32,
    pub cell:       u32,
    pub placements: Vec<Placement>,
}

/// `(cols, rows)` for `n` cells: `cols = ceil(sqrt(n))`, `rows = ceil(n / cols)`.
pub fn grid_shape(n: u32) -> (u32, u32) {
    let mut cols = 1u32;
    while cols * cols < n {
        cols += 1;
    }
    (cols, n.div_ceil(cols))
}

/// Pixel size of `text` drawn at `scale`.
pub fn text_size(text: &str, scale: u32) -> Size {
    let chars = text.chars().count() as u32;
    let width = if chars == 0 { 0 } else { (chars * (GLYPH_W + 1) - 1) * scale };
    Size { width, height: GLYPH_H * scale }
}

// ── Planning ─────────────────────────────────────────────────────────────────

/// Compute placements for `fragments` (index `i` is order `i + 1`).
pub fn plan(
    fragments: &[Size],
    auxiliary: Option<Size>,
    label:     Option<&str>,
    spec:      &LayoutSpec,
) -> Result<LayoutPlan, LayoutError> {
    if fragments.is_empty() {
        return Err(LayoutError::NoFragments);
    }
    let n      = fragments.len() as u32;
    let margin = spec.margin;
    let numeral_y_pad = margin.saturating_sub(GLYPH_H * NUMERAL_SCALE) / 2;
    let mut placements = Vec::new();

    let numeral = |value: u32, x: u32, y: u32| Placement {
        kind: PlacementKind::Numeral(value),
        rect: {
            let s = text_size(&value.to_string(), NUMERAL_SCALE);
            Rect { x, y, width: s.width, height: s.height }
        },
    };

    // ── Top band ──
    let mut grid_top = 0;
    if auxiliary.is_some() || label.is_some() {
        let mut x = margin;
        let mut band_content = 0;

        if let Some(aux) = auxiliary {
            placements.push(numeral(n + 1, x, numeral_y_pad));
            placements.push(Placement {
                kind: PlacementKind::Auxiliary,
                rect: Rect { x, y: margin, width: aux.width, height: aux.height },
            });
            x += aux.width + margin;
            band_content = band_content.max(aux.height);
        }
        if let Some(text) = label {
            let s = text_size(text, LABEL_SCALE);
            placements.push(Placement {
                kind: PlacementKind::Label(text.to_owned()),
                rect: Rect { x, y: margin, width: s.width, height: s.height },
            });
            x += s.width + margin;
            band_content = band_content.max(s.height);
        }

        if x > spec.canvas_width {
            return Err(LayoutError::BandOverflow { needed: x, available: spec.canvas_width });
        }
        grid_top = margin + band_content;
    }

    // ── Fragment grid ──
    let (cols, rows) = grid_shape(n);
    let cell      = spec.canvas_width / cols;
    let available = cell.saturating_sub(2 * margin);

    for (i, size) in fragments.iter().enumerate() {
        let order = i as u32 + 1;
        if size.width > available || size.height > available {
            return Err(LayoutError::CellOverflow {
                order,
                width: size.width,
                height: size.height,
                available,
            });
        }
        let cx = (i as u32 % cols) * cell;
        let cy = grid_top + (i as u32 / cols) * cell;
        placements.push(numeral(order, cx + margin, cy + numeral_y_pad));
        placements.push(Placement {
            kind: PlacementKind::Fragment(order),
            rect: Rect { x: cx + margin, y: cy + margin, width: size.width, height: size.height },
        });
    }

    let content_bottom = placements.iter().map(|p| p.rect.bottom()).max().unwrap_or(0);
    let height = content_bottom + margin;
    if height > spec.canvas_height {
        return Err(LayoutError::CanvasOverflow { needed: height, available: spec.canvas_height });
    }

    Ok(LayoutPlan { width: spec.canvas_width, height, cols, rows, cell, placements })
}

// ── Rendering ────────────────────────────────────────────────────────────────

/// Anything the plan can be drawn onto.
pub trait Surface {
    fn blit(&mut self, image: &RgbaImage, x: u32, y: u32);
    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>);
}

impl Surface for RgbaImage {
    fn blit(&mut self, image: &RgbaImage, x: u32, y: u32) {
        image::imageops::overlay(self, image, i64::from(x), i64::from(y));
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) {
        let right  = rect.right().min(self.width());
        let bottom = rect.bottom().min(self.height());
        for y in rect.y..bottom {
            for x in rect.x..right {
                self.put_pixel(x, y, color);
            }
        }
    }
}

/// Draw `text` with the built-in 3×5 font.  Lowercase is drawn as uppercase;
/// characters without a glyph are drawn as `?`.
pub fn draw_text<S: Surface + ?Sized>(surface: &mut S, text: &str, x: u32, y: u32, scale: u32) {
    for (i, c) in text.chars().enumerate() {
        let gx = x + i as u32 * (GLYPH_W + 1) * scale;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (1 << (GLYPH_W - 1 - col)) != 0 {
                    surface.fill_rect(
                        Rect {
                            x: gx + col * scale,
                            y: y + row as u32 * scale,
                            width: scale,
                            height: scale,
                        },
                        INK,
                    );
                }
            }
        }
    }
}

/// Replay `plan` onto `surface`.
pub fn render<S: Surface + ?Sized>(
    plan:      &LayoutPlan,
    fragments: &[RgbaImage],
    auxiliary: Option<&RgbaImage>,
    surface:   &mut S,
) -> Result<(), LayoutError> {
    for p in &plan.placements {
        match &p.kind {
            PlacementKind::Fragment(order) => {
                let image = order
                    .checked_sub(1)
                    .and_then(|i| fragments.get(i as usize))
                    .ok_or(LayoutError::MissingImage(*order))?;
                surface.blit(image, p.rect.x, p.rect.y);
            }
            PlacementKind::Auxiliary => {
                if let Some(image) = auxiliary {
                    surface.blit(image, p.rect.x, p.rect.y);
                }
            }
            PlacementKind::Label(text) => draw_text(&mut *surface, text, p.rect.x, p.rect.y, LABEL_SCALE),
            PlacementKind::Numeral(value) => {
                draw_text(&mut *surface, &value.to_string(), p.rect.x, p.rect.y, NUMERAL_SCALE)
            }
        }
    }
    Ok(())
}

/// Plan and render onto a fresh white canvas cropped to the plan height.
pub fn compose(
    fragments: &[RgbaImage],
    auxiliary: Option<&RgbaImage>,
    label:     Option<&str>,
    spec:      &LayoutSpec,
) -> Result<RgbaImage, LayoutError> {
    let sizes: Vec<Size> = fragments.iter().map(Size::of).collect();
    let plan = plan(&sizes, auxiliary.map(Size::of), label, spec)?;
    let mut canvas = RgbaImage::from_pixel(plan.width, plan.height, WHITE);
    render(&plan, fragments, auxiliary, &mut canvas)?;
    Ok(canvas)
}

// ── Font ─────────────────────────────────────────────────────────────────────

fn glyph(c: char) -> [u8; 5] {
    match c.to_ascii_uppercase() {
        '0' => [7, 5, 5, 5, 7],
        '1' => [2, 6, 2, 2, 7],
        '2' => [7, 1, 7, 4, 7],
        '3' => [7, 1, 7, 1, 7],
        '4' => [5, 5, 7, 1, 1],
        '5' => [7, 4, 7, 1, 7],
        '6' => [7, 4, 7, 5, 7],
        '7' => [7, 1, 1, 1, 1],
        '8' => [7, 5, 7, 5, 7],
        '9' => [7, 5, 7, 1, 7],
        'A' => [2, 5, 7, 5, 5],
        'B' => [6, 5, 6, 5, 6],
        'C' => [3, 4, 4, 4, 3],
        'D' => [6, 5, 5, 5, 6],
        'E' => [7, 4, 6, 4, 7],
        'F' => [7, 4, 6, 4, 4],
        'G' => [3, 4, 5, 5, 3],
        'H' => [5, 5, 7, 5, 5],
        'I' => [7, 2, 2, 2, 7],
        'J' => [1, 1, 1, 5, 2],
        'K' => [5, 5, 6, 5, 5],
        'L' => [4, 4, 4, 4, 7],
        'M' => [5, 7, 7, 5, 5],
        'N' => [6, 5, 5, 5, 5],
        'O' => [2, 5, 5, 5, 2],
        'P' => [6, 5, 6, 4, 4],
        'Q' => [2, 5, 5, 6, 3],
        'R' => [6, 5, 6, 5, 5],
        'S' => [3, 4, 2, 1, 6],
        'T' => [7, 2, 2, 2, 2],
        'U' => [5, 5, 5, 5, 7],
        'V' => [5, 5, 5, 5, 2],
        'W' => [5, 5, 7, 7, 5],
        'X' => [5, 5, 2, 5, 5],
        'Y' => [5, 5, 2, 2, 2],
        'Z' => [7, 1, 2, 4, 7],
        '-' => [0, 0, 7, 0, 0],
        ':' => [0, 2, 0, 2, 0],
        '.' => [0, 0, 0, 0, 2],
        '/' => [1, 1, 2, 4, 4],
        '#' => [5, 7, 5, 7, 5],
        ' ' => [0, 0, 0, 0, 0],
        _   => [7, 1, 2, 0, 2],
    }
}
