//! Image attachments drawn with terminal cells.
//!
//! Every source pixel becomes a two column cell, so a pixel is roughly square
//! on screen. Rows are independent and are built in parallel.

use std::collections::HashMap;

use image::imageops::FilterType;
use image::{GenericImageView, RgbaImage};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::ImageStyle;
use crate::utils::{display_path, expand_tilde};

/// Character cells are taller than they are wide; this stretches the width
/// so images keep their proportions.
const CELL_ASPECT_CORRECTION: f64 = 1.15;

/// Glyphs for the `Ascii` style with the share of the cell each one inks.
const GLYPHS: &[(char, f32)] = &[
    ('⠁', 0.10),
    ('⠃', 0.18),
    ('○', 0.25),
    ('⠇', 0.30),
    ('▁', 0.35),
    ('⠏', 0.40),
    ('▂', 0.45),
    ('◧', 0.50),
    ('▃', 0.55),
    ('⠟', 0.58),
    ('▲', 0.62),
    ('▄', 0.66),
    ('◉', 0.70),
    ('⠿', 0.74),
    ('▅', 0.78),
    ('●', 0.82),
    ('▆', 0.86),
    ('▊', 0.90),
    ('⣿', 0.94),
    ('█', 1.00),
];

#[derive(Debug, Clone, PartialEq)]
pub struct ImageArt {
    pub lines: Vec<Line<'static>>,
    /// Width in terminal columns.
    pub width: usize,
}

/// Pixel dimensions that fit `max_width` columns by `max_height` rows.
///
/// Height is filled first; if the resulting width would overflow, the image is
/// fitted to the width instead.
pub fn fit_dimensions(src_w: u32, src_h: u32, max_width: u16, max_height: u16) -> (u32, u32) {
    let max_cols = u32::from(max_width / 2).max(1);
    let max_rows = u32::from(max_height).max(1);
    if src_w == 0 || src_h == 0 {
        return (1, 1);
    }
    let aspect = f64::from(src_w) * CELL_ASPECT_CORRECTION / f64::from(src_h);

    let height_fit_w = (f64::from(max_rows) * aspect).round() as u32;
    if height_fit_w <= max_cols {
        return (height_fit_w.max(1), max_rows);
    }
    let width_fit_h = (f64::from(max_cols) / aspect).round() as u32;
    (max_cols, width_fit_h.clamp(1, max_rows))
}

pub fn render_file(
    path: &str,
    max_width: u16,
    max_height: u16,
    style: ImageStyle,
) -> Result<ImageArt, image::ImageError> {
    let expanded = expand_tilde(path);
    let img = image::open(&expanded)?;
    let (src_w, src_h) = img.dimensions();
    let (w, h) = fit_dimensions(src_w, src_h, max_width, max_height);
    debug!(
        "Rendering {} ({src_w}x{src_h}) at {w}x{h} cells",
        display_path(&expanded)
    );
    let resized = img.resize_exact(w, h, FilterType::Nearest).to_rgba8();
    Ok(render_pixels(&resized, style))
}

pub fn render_pixels(img: &RgbaImage, style: ImageStyle) -> ImageArt {
    let (w, h) = img.dimensions();
    let lines = (0..h)
        .into_par_iter()
        .map(|y| {
            let spans: Vec<Span<'static>> = (0..w)
                .map(|x| pixel_cell(img.get_pixel(x, y).0, style))
                .collect();
            Line::from(spans)
        })
        .collect();
    ImageArt {
        lines,
        width: w as usize * 2,
    }
}

fn pixel_cell([r, g, b, a]: [u8; 4], style: ImageStyle) -> Span<'static> {
    if a == 0 {
        return Span::raw("  ");
    }
    let color = Color::Rgb(r, g, b);
    match style {
        ImageStyle::Blocks => Span::styled("  ", Style::default().bg(color)),
        ImageStyle::Ascii => {
            let glyph = glyph_for(luminance(r, g, b));
            Span::styled(format!("{glyph}{glyph}"), Style::default().fg(color))
        }
    }
}

fn luminance(r: u8, g: u8, b: u8) -> f32 {
    (0.2126 * f32::from(r) + 0.7152 * f32::from(g) + 0.0722 * f32::from(b)) / 255.0
}

fn glyph_for(density: f32) -> char {
    GLYPHS
        .iter()
        .min_by(|(_, a), (_, b)| (a - density).abs().total_cmp(&(b - density).abs()))
        .map_or('█', |(glyph, _)| *glyph)
}

/// Rendered attachments keyed by path and size. Failures are cached as well so
/// a broken file is only reported once.
#[derive(Debug, Default)]
pub struct ImageArtCache {
    entries: HashMap<(String, u16, u16), Option<ImageArt>>,
    style: ImageStyle,
}

impl ImageArtCache {
    pub fn new(style: ImageStyle) -> Self {
        Self {
            entries: HashMap::new(),
            style,
        }
    }

    pub fn get(&mut self, path: &str, max_width: u16, max_height: u16) -> Option<&ImageArt> {
        let style = self.style;
        self.entries
            .entry((path.to_string(), max_width, max_height))
            .or_insert_with(|| match render_file(path, max_width, max_height, style) {
                Ok(art) => Some(art),
                Err(e) => {
                    warn!("Failed to load image {path}: {e}");
                    None
                }
            })
            .as_ref()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_fit_prefers_height() {
        // Square image in a wide area: height limits.
        assert_eq!(fit_dimensions(100, 100, 80, 10), (12, 10));
    }

    #[test]
    fn test_fit_falls_back_to_width() {
        // Very wide image: 20 pixel columns available.
        let (w, h) = fit_dimensions(1000, 100, 40, 30);
        assert_eq!(w, 20);
        assert!(h <= 30);
        assert_eq!(h, 2);
    }

    #[test]
    fn test_fit_never_zero() {
        assert_eq!(fit_dimensions(0, 10, 10, 10), (1, 1));
        let (w, h) = fit_dimensions(1, 10_000, 2, 1);
        assert!(w >= 1 && h >= 1);
    }

    #[test]
    fn test_transparent_pixels_are_blank() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 0, Rgba([255, 0, 0, 255]));

        let art = render_pixels(&img, ImageStyle::Blocks);
        assert_eq!(art.width, 4);
        let spans = &art.lines[0].spans;
        assert_eq!(spans[0].content, "  ");
        assert_eq!(spans[0].style.bg, None);
        assert_eq!(spans[1].style.bg, Some(Color::Rgb(255, 0, 0)));
    }

    #[test]
    fn test_ascii_style_uses_dense_glyph_for_bright_pixels() {
        let mut img = RgbaImage::new(1, 1);
        img.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        let art = render_pixels(&img, ImageStyle::Ascii);
        assert_eq!(art.lines[0].spans[0].content, "██");
        assert_eq!(art.lines[0].spans[0].style.fg, Some(Color::Rgb(255, 255, 255)));
    }

    #[test]
    fn test_render_file_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.png");
        RgbaImage::from_pixel(8, 8, Rgba([10, 200, 30, 255]))
            .save(&path)
            .unwrap();
        let path = path.to_string_lossy().to_string();

        let mut cache = ImageArtCache::new(ImageStyle::Blocks);
        let art = cache.get(&path, 20, 5).cloned().unwrap();
        assert_eq!(art.lines.len(), 5);
        assert!(art.width <= 20);

        assert!(cache.get("/definitely/not/here.png", 20, 5).is_none());
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
