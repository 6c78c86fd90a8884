//! Letter overlay: font loading with a built-in fallback, glyph rasterization
//! into a coverage mask, and centered source-over compositing.

use std::fs;
use std::path::Path;

use ab_glyph::{Font, FontVec, PxScale, point};
use font8x8::{BASIC_FONTS, LATIN_FONTS, UnicodeFonts};
use image::{Rgba, RgbaImage};
use tracing::{debug, info, warn};

use crate::models::Rgb;

/// Largest accepted font size in pixels per em.
pub const MAX_FONT_SIZE: f32 = 4096.0;

/// A glyph is never rendered larger than this multiple of the canvas edge.
const MAX_CANVAS_SCALE: f32 = 4.0;

pub fn valid_font_size(size: f32) -> bool {
    size.is_finite() && size > 0.0 && size <= MAX_FONT_SIZE
}

/// Tuning for where the glyph lands relative to the canvas center.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GlyphPlacement {
    /// Upward shift as a fraction of the glyph's ink height.
    pub bias: f32,
    pub offset_x: i32,
    pub offset_y: i32,
}

pub enum GlyphFont {
    Outline(FontVec),
    /// 8x8 bitmap font compiled into the binary.
    Builtin,
}

impl GlyphFont {
    /// Load a TrueType/OpenType font (face 0 of a collection). Any failure
    /// yields the built-in font.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            debug!("no font requested, using built-in font");
            return GlyphFont::Builtin;
        };
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                info!(path = %path.display(), error = %e, "font unavailable, using built-in font");
                return GlyphFont::Builtin;
            }
        };
        match FontVec::try_from_vec_and_index(data, 0) {
            Ok(font) => {
                debug!(path = %path.display(), "loaded font");
                GlyphFont::Outline(font)
            }
            Err(e) => {
                info!(path = %path.display(), error = %e, "font unreadable, using built-in font");
                GlyphFont::Builtin
            }
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, GlyphFont::Builtin)
    }

    /// Rasterize `ch` at `size` pixels per em, cropped to its ink. `None` when
    /// the character has no visible ink in either font. Sizes above
    /// [`MAX_FONT_SIZE`] are clamped; non-finite or non-positive sizes draw
    /// nothing.
    pub fn rasterize(&self, ch: char, size: f32) -> Option<GlyphMask> {
        if !(size.is_finite() && size > 0.0) {
            debug!(size, "unusable font size");
            return None;
        }
        let size = size.min(MAX_FONT_SIZE);
        match self {
            GlyphFont::Outline(font) => {
                rasterize_outline(font, ch, size).or_else(|| rasterize_builtin(ch, size))
            }
            GlyphFont::Builtin => rasterize_builtin(ch, size),
        }
    }
}

/// Per-pixel coverage in `0.0..=1.0`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphMask {
    pub width: u32,
    pub height: u32,
    coverage: Vec<f32>,
}

impl GlyphMask {
    fn new(width: u32, height: u32) -> Option<Self> {
        let len = (width as usize).checked_mul(height as usize)?;
        Some(Self { width, height, coverage: vec![0.0; len] })
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.coverage[self.index(x, y)]
    }

    fn set(&mut self, x: u32, y: u32, c: f32) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.coverage[i] = c.clamp(0.0, 1.0);
        }
    }

    /// Drop fully empty border rows and columns.
    fn trim(self) -> Option<Self> {
        let inked = |x: u32, y: u32| self.get(x, y) > 0.0;
        let rows: Vec<u32> = (0..self.height).filter(|&y| (0..self.width).any(|x| inked(x, y))).collect();
        let cols: Vec<u32> = (0..self.width).filter(|&x| (0..self.height).any(|y| inked(x, y))).collect();
        let (&y0, &y1) = (rows.first()?, rows.last()?);
        let (&x0, &x1) = (cols.first()?, cols.last()?);
        if (x0, y0, x1, y1) == (0, 0, self.width - 1, self.height - 1) {
            return Some(self);
        }
        let mut out = GlyphMask::new(x1 - x0 + 1, y1 - y0 + 1)?;
        for y in 0..out.height {
            for x in 0..out.width {
                out.set(x, y, self.get(x0 + x, y0 + y));
            }
        }
        Some(out)
    }
}

// PxScale is ascent-to-descent height; convert so `size` is the em size.
fn em_scale(font: &FontVec, size: f32) -> PxScale {
    match font.units_per_em() {
        Some(upem) if upem > 0.0 => PxScale::from(size * font.height_unscaled() / upem),
        _ => PxScale::from(size),
    }
}

fn rasterize_outline(font: &FontVec, ch: char, size: f32) -> Option<GlyphMask> {
    let id = font.glyph_id(ch);
    if id.0 == 0 {
        debug!(%ch, "glyph missing from font");
        return None;
    }
    let glyph = id.with_scale_and_position(em_scale(font, size), point(0.0, 0.0));
    let outlined = font.outline_glyph(glyph)?;
    let bounds = outlined.px_bounds();
    let (width, height) = (bounds.width() as u32, bounds.height() as u32);
    if width == 0 || height == 0 {
        return None;
    }
    let mut mask = GlyphMask::new(width, height)?;
    outlined.draw(|x, y, c| mask.set(x, y, c));
    mask.trim()
}

fn rasterize_builtin(ch: char, size: f32) -> Option<GlyphMask> {
    let rows = BASIC_FONTS.get(ch).or_else(|| LATIN_FONTS.get(ch))?;
    let cols = rows.iter().fold(0u8, |acc, r| acc | r);
    if cols == 0 {
        return None;
    }
    // bit 0 is the leftmost column
    let c0 = cols.trailing_zeros();
    let c1 = 7 - cols.leading_zeros();
    let r0 = rows.iter().position(|r| *r != 0)? as u32;
    let r1 = rows.iter().rposition(|r| *r != 0)? as u32;

    let cell = ((size / 8.0).round() as u32).max(1);
    let mut mask = GlyphMask::new((c1 - c0 + 1).checked_mul(cell)?, (r1 - r0 + 1).checked_mul(cell)?)?;
    for y in 0..mask.height {
        let row = rows[(r0 + y / cell) as usize];
        for x in 0..mask.width {
            if (row >> (c0 + x / cell)) & 1 == 1 {
                mask.set(x, y, 1.0);
            }
        }
    }
    Some(mask)
}

/// Top-left position of a `w` x `h` glyph on a `canvas_w` x `canvas_h` canvas.
pub fn centered_origin(canvas_w: u32, canvas_h: u32, w: u32, h: u32, placement: &GlyphPlacement) -> (i64, i64) {
    let x = ((canvas_w as f32 - w as f32) / 2.0).floor() as i64;
    let y = ((canvas_h as f32 - h as f32) / 2.0 - placement.bias * h as f32).floor() as i64;
    (x + placement.offset_x as i64, y + placement.offset_y as i64)
}

/// Draw `label` centered on the canvas. Returns the glyph rectangle
/// `(x, y, w, h)` that was composited, or `None` if the label has no ink.
/// The glyph is clipped to the canvas; sizes beyond four times the canvas
/// edge are clamped.
pub fn overlay_centered(
    canvas: &mut RgbaImage,
    font: &GlyphFont,
    label: char,
    size: f32,
    placement: &GlyphPlacement,
    color: Rgb,
) -> Option<(i64, i64, u32, u32)> {
    let limit = canvas.width().max(canvas.height()) as f32 * MAX_CANVAS_SCALE;
    let size = if size > limit {
        warn!(size, limit, "font size too large for canvas, clamping");
        limit
    } else {
        size
    };
    let Some(mask) = font.rasterize(label, size) else {
        debug!(%label, "label has no ink, nothing drawn");
        return None;
    };
    let (ox, oy) = centered_origin(canvas.width(), canvas.height(), mask.width, mask.height, placement);

    for my in 0..mask.height {
        let cy = oy + my as i64;
        if cy < 0 || cy >= canvas.height() as i64 {
            continue;
        }
        for mx in 0..mask.width {
            let cx = ox + mx as i64;
            if cx < 0 || cx >= canvas.width() as i64 {
                continue;
            }
            let a = mask.get(mx, my);
            if a > 0.0 {
                blend(canvas.get_pixel_mut(cx as u32, cy as u32), color, a);
            }
        }
    }

    debug!(%label, x = ox, y = oy, w = mask.width, h = mask.height, builtin = font.is_builtin(), "glyph placed");
    Some((ox, oy, mask.width, mask.height))
}

// Source-over with straight (non-premultiplied) alpha.
fn blend(dst: &mut Rgba<u8>, src: Rgb, a: f32) {
    let da = dst[3] as f32 / 255.0;
    let out_a = a + da * (1.0 - a);
    if out_a <= 0.0 {
        return;
    }
    for (i, s) in [src.0, src.1, src.2].into_iter().enumerate() {
        let c = (s as f32 * a + dst[i] as f32 * da * (1.0 - a)) / out_a;
        dst[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon::{bounding_box, render_base};
    use std::num::NonZeroU32;

    fn base(size: u32) -> RgbaImage {
        render_base(NonZeroU32::new(size).unwrap(), Rgb::GREEN, size / 20)
    }

    fn white(p: &Rgba<u8>) -> bool {
        p[0] == 255 && p[1] == 255 && p[2] == 255 && p[3] > 0
    }

    fn ink_center(img: &RgbaImage) -> (f32, f32) {
        let (x0, y0, x1, y1) = bounding_box(img, white).expect("glyph drawn");
        ((x0 + x1 + 1) as f32 / 2.0, (y0 + y1 + 1) as f32 / 2.0)
    }

    #[test]
    fn missing_font_falls_back_to_builtin() {
        let font = GlyphFont::load_or_default(Some(Path::new("/nonexistent/Helvetica.ttc")));
        assert!(font.is_builtin());
        assert!(GlyphFont::load_or_default(None).is_builtin());
    }

    #[test]
    fn garbage_font_file_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        fs::write(&path, b"definitely not a font").unwrap();
        assert!(GlyphFont::load_or_default(Some(&path)).is_builtin());
    }

    #[test]
    fn fallback_font_still_draws_the_label() {
        let mut img = base(1024);
        let font = GlyphFont::load_or_default(Some(Path::new("/nonexistent/font.ttf")));
        let placed = overlay_centered(&mut img, &font, 'N', 500.0, &GlyphPlacement::default(), Rgb::WHITE);
        assert!(placed.is_some());
        assert!(img.pixels().filter(|p| white(p)).count() > 1000);
    }

    #[test]
    fn builtin_glyph_is_centered() {
        for size in [64, 512, 1024] {
            let mut img = base(size);
            overlay_centered(&mut img, &GlyphFont::Builtin, 'N', size as f32 / 2.0, &GlyphPlacement::default(), Rgb::WHITE)
                .unwrap();
            let (cx, cy) = ink_center(&img);
            let mid = size as f32 / 2.0;
            assert!((cx - mid).abs() <= 1.0, "x center {cx} vs {mid}");
            assert!((cy - mid).abs() <= 1.0, "y center {cy} vs {mid}");
        }
    }

    #[test]
    fn bias_moves_glyph_up_by_fraction_of_height() {
        let mut img = base(1024);
        let placement = GlyphPlacement { bias: 0.25, ..Default::default() };
        let (_, _, _, h) =
            overlay_centered(&mut img, &GlyphFont::Builtin, 'N', 600.0, &placement, Rgb::WHITE).unwrap();
        let (cx, cy) = ink_center(&img);
        assert!((cx - 512.0).abs() <= 1.0);
        let expected = 512.0 - 0.25 * h as f32;
        assert!((cy - expected).abs() <= 1.0, "y center {cy} vs {expected}");
    }

    #[test]
    fn offsets_shift_glyph() {
        let mut img = base(512);
        let placement = GlyphPlacement { bias: 0.0, offset_x: 10, offset_y: -20 };
        overlay_centered(&mut img, &GlyphFont::Builtin, 'A', 200.0, &placement, Rgb::WHITE).unwrap();
        let (cx, cy) = ink_center(&img);
        assert!((cx - 266.0).abs() <= 1.0);
        assert!((cy - 236.0).abs() <= 1.0);
    }

    #[test]
    fn builtin_mask_is_cropped_and_scaled() {
        // 'N' occupies 7x7 cells of its 8x8 bitmap
        let mask = GlyphFont::Builtin.rasterize('N', 80.0).unwrap();
        assert_eq!((mask.width, mask.height), (70, 70));
        assert_eq!(mask.get(0, 0), 1.0);
        let tiny = GlyphFont::Builtin.rasterize('N', 1.0).unwrap();
        assert_eq!((tiny.width, tiny.height), (7, 7));
    }

    #[test]
    fn blank_label_leaves_canvas_untouched() {
        let mut img = base(128);
        let before = img.clone();
        assert!(overlay_centered(&mut img, &GlyphFont::Builtin, ' ', 64.0, &GlyphPlacement::default(), Rgb::WHITE).is_none());
        assert_eq!(img, before);
    }

    #[test]
    fn glyph_is_clipped_at_canvas_edges() {
        let mut img = base(32);
        let placement = GlyphPlacement { bias: 0.0, offset_x: -30, offset_y: 30 };
        assert!(overlay_centered(&mut img, &GlyphFont::Builtin, 'W', 64.0, &placement, Rgb::WHITE).is_some());
        assert_eq!(img.dimensions(), (32, 32));
    }

    #[test]
    fn blend_over_transparent_takes_source_color() {
        let mut px = Rgba([0, 0, 0, 0]);
        blend(&mut px, Rgb::WHITE, 0.5);
        assert_eq!(px, Rgba([255, 255, 255, 128]));
        let mut px = Rgba([76, 175, 80, 255]);
        blend(&mut px, Rgb::WHITE, 1.0);
        assert_eq!(px, Rgba([255, 255, 255, 255]));
    }

    // single-glyph TrueType font: 'N' only, 1000 units per em
    const FIXTURE_FONT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/block-n.ttf");

    #[test]
    fn outline_font_glyph_is_centered() {
        let font = GlyphFont::load_or_default(Some(Path::new(FIXTURE_FONT)));
        assert!(!font.is_builtin());
        let mut img = base(1024);
        let (_, _, w, h) =
            overlay_centered(&mut img, &font, 'N', 500.0, &GlyphPlacement::default(), Rgb::WHITE).unwrap();
        // ink spans 480x700 font units
        assert!((w as i32 - 240).abs() <= 1, "width {w}");
        assert!((h as i32 - 350).abs() <= 1, "height {h}");
        let (x0, y0, x1, y1) = bounding_box(&img, |p| p[0] > 200 && p[1] > 200 && p[2] > 200).unwrap();
        let (cx, cy) = ((x0 + x1 + 1) as f32 / 2.0, (y0 + y1 + 1) as f32 / 2.0);
        assert!((cx - 512.0).abs() <= 2.0, "x center {cx}");
        assert!((cy - 512.0).abs() <= 2.0, "y center {cy}");
    }

    #[test]
    fn character_missing_from_outline_font_uses_builtin() {
        let font = GlyphFont::load_or_default(Some(Path::new(FIXTURE_FONT)));
        let mask = font.rasterize('A', 80.0).unwrap();
        assert_eq!(mask.height, 70);
    }

    #[test]
    fn huge_font_size_is_clamped_and_clipped() {
        let mut img = base(64);
        let (x, y, w, h) =
            overlay_centered(&mut img, &GlyphFont::Builtin, 'N', 100_000.0, &GlyphPlacement::default(), Rgb::WHITE)
                .unwrap();
        // clamped to 4 x 64 px per em, so each bitmap cell is 32 px
        assert_eq!((w, h), (224, 224));
        assert_eq!((x, y), (-80, -80));
        assert_eq!(img.dimensions(), (64, 64));
        assert!(img.pixels().any(white));
    }

    #[test]
    fn rasterize_bounds_the_mask() {
        let mask = GlyphFont::Builtin.rasterize('N', 1.0e9).unwrap();
        assert_eq!(mask.width, 7 * (MAX_FONT_SIZE / 8.0) as u32);
        assert!(GlyphFont::Builtin.rasterize('N', f32::INFINITY).is_none());
        assert!(GlyphFont::Builtin.rasterize('N', f32::NAN).is_none());
        assert!(GlyphFont::Builtin.rasterize('N', -5.0).is_none());
    }

    #[test]
    fn font_size_validation() {
        assert!(valid_font_size(500.0));
        assert!(valid_font_size(MAX_FONT_SIZE));
        assert!(!valid_font_size(0.0));
        assert!(!valid_font_size(MAX_FONT_SIZE + 1.0));
        assert!(!valid_font_size(f32::NAN));
    }
}
