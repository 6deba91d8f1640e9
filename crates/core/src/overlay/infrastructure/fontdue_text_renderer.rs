use std::path::Path;

use fontdue::{Font, FontSettings};

use crate::overlay::domain::composite_style::CompositeStyle;
use crate::overlay::domain::label_metrics::LabelMetrics;
use crate::overlay::domain::placement::Anchor;
use crate::overlay::domain::text_renderer::TextRenderer;
use crate::shared::constants::MAX_FONT_SIZE;
use crate::shared::error::WatermarkError;
use crate::shared::frame::{Frame, CHANNELS};

/// Renders the label with a TrueType/OpenType font via fontdue.
///
/// Glyph coverage is used as the alpha channel, so edges are anti-aliased.
/// A stroke thickness above 1 emboldens the coverage by smearing it
/// `thickness - 1` pixels right and up, which keeps the text on its
/// baseline and grows the measured extent by the same amount.
pub struct FontdueTextRenderer {
    font: Font,
}

/// Glyph bitmap position relative to the pen origin on the baseline
/// (y grows downward, so `top` is negative for glyphs above the baseline).
struct PlacedGlyph {
    ch: char,
    left: i32,
    top: i32,
    width: usize,
    height: usize,
}

impl FontdueTextRenderer {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, WatermarkError> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| WatermarkError::RenderUnavailable(format!("invalid font data: {e}")))?;
        Ok(Self { font })
    }

    pub fn from_path(path: &Path) -> Result<Self, WatermarkError> {
        let bytes = std::fs::read(path).map_err(|e| {
            WatermarkError::RenderUnavailable(format!(
                "failed to read font {}: {e}",
                path.display()
            ))
        })?;
        log::debug!("Loaded font {}", path.display());
        Self::from_bytes(bytes)
    }

    /// Lays out glyphs left to right, applying kerning between pairs.
    /// Returns the placed glyphs and the final pen advance.
    fn layout(&self, text: &str, px: f32) -> (Vec<PlacedGlyph>, f32) {
        let mut glyphs = Vec::with_capacity(text.len());
        let mut pen = 0.0f32;
        let mut prev: Option<char> = None;

        for ch in text.chars() {
            if let Some(p) = prev {
                pen += self.font.horizontal_kern(p, ch, px).unwrap_or(0.0);
            }
            let m = self.font.metrics(ch, px);
            if m.width > 0 && m.height > 0 {
                glyphs.push(PlacedGlyph {
                    ch,
                    left: (pen + m.xmin as f32).round() as i32,
                    top: -(m.height as i32 + m.ymin),
                    width: m.width,
                    height: m.height,
                });
            }
            pen += m.advance_width;
            prev = Some(ch);
        }

        (glyphs, pen)
    }
}

fn stroke_grow(style: &CompositeStyle) -> i32 {
    style.stroke_thickness.max(1) as i32 - 1
}

fn check_font_size(style: &CompositeStyle) -> Result<(), WatermarkError> {
    if style.font_size > 0.0 && style.font_size <= MAX_FONT_SIZE {
        Ok(())
    } else {
        Err(WatermarkError::RenderUnavailable(format!(
            "font size {} is outside (0, {MAX_FONT_SIZE}]",
            style.font_size
        )))
    }
}

/// Half-open pixel rectangle in frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Clip {
    left: i64,
    top: i64,
    right: i64,
    bottom: i64,
}

impl Clip {
    fn intersect(self, other: Clip) -> Option<Clip> {
        let clip = Clip {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        };
        (clip.left < clip.right && clip.top < clip.bottom).then_some(clip)
    }

    fn width(&self) -> usize {
        (self.right - self.left) as usize
    }

    fn height(&self) -> usize {
        (self.bottom - self.top) as usize
    }
}

impl TextRenderer for FontdueTextRenderer {
    fn measure(
        &self,
        text: &str,
        style: &CompositeStyle,
    ) -> Result<LabelMetrics, Box<dyn std::error::Error>> {
        check_font_size(style)?;
        if text.is_empty() {
            return Ok(LabelMetrics::default());
        }

        let grow = stroke_grow(style);
        let (glyphs, advance) = self.layout(text, style.font_size);

        let ascent = glyphs.iter().map(|g| -g.top).max().unwrap_or(0).max(0);
        let descent = glyphs
            .iter()
            .map(|g| g.top + g.height as i32)
            .max()
            .unwrap_or(0)
            .max(0);

        Ok(LabelMetrics::new(
            advance.ceil().max(0.0) as u32 + grow as u32,
            (ascent + grow) as u32,
            descent as u32,
        ))
    }

    fn stamp(
        &self,
        frame: &mut Frame,
        anchor: Anchor,
        text: &str,
        style: &CompositeStyle,
    ) -> Result<(), Box<dyn std::error::Error>> {
        check_font_size(style)?;
        let grow = i64::from(stroke_grow(style));
        let (glyphs, _) = self.layout(text, style.font_size);

        let frame_w = i64::from(frame.width());
        let frame_h = i64::from(frame.height());
        let frame_rect = Clip {
            left: 0,
            top: 0,
            right: frame_w,
            bottom: frame_h,
        };

        // Glyph bounds in frame coordinates, widened by the stroke smear.
        let glyph_rect = |g: &PlacedGlyph| Clip {
            left: anchor.x + i64::from(g.left),
            top: anchor.y + i64::from(g.top) - grow,
            right: anchor.x + i64::from(g.left) + g.width as i64 + grow,
            bottom: anchor.y + i64::from(g.top) + g.height as i64,
        };

        let label_rect = glyphs.iter().map(glyph_rect).reduce(|a, b| Clip {
            left: a.left.min(b.left),
            top: a.top.min(b.top),
            right: a.right.max(b.right),
            bottom: a.bottom.max(b.bottom),
        });
        // Coverage mask only spans the visible part of the label.
        let Some(clip) = label_rect.and_then(|r| r.intersect(frame_rect)) else {
            return Ok(());
        };
        let mask_w = clip.width();
        let mut mask = vec![0u8; mask_w * clip.height()];

        for glyph in &glyphs {
            if glyph_rect(glyph).intersect(clip).is_none() {
                continue;
            }
            let (_, bitmap) = self.font.rasterize(glyph.ch, style.font_size);
            let gx0 = anchor.x + i64::from(glyph.left);
            let gy0 = anchor.y + i64::from(glyph.top);
            for gy in 0..glyph.height {
                for gx in 0..glyph.width {
                    let coverage = bitmap[gy * glyph.width + gx];
                    if coverage == 0 {
                        continue;
                    }
                    for dy in 0..=grow {
                        let fy = gy0 + gy as i64 - dy;
                        if fy < clip.top || fy >= clip.bottom {
                            continue;
                        }
                        for dx in 0..=grow {
                            let fx = gx0 + gx as i64 + dx;
                            if fx < clip.left || fx >= clip.right {
                                continue;
                            }
                            let idx = (fy - clip.top) as usize * mask_w + (fx - clip.left) as usize;
                            mask[idx] = mask[idx].max(coverage);
                        }
                    }
                }
            }
        }

        let color = style.text_color;
        let data = frame.data_mut();
        for (row, line) in mask.chunks_exact(mask_w).enumerate() {
            let fy = clip.top + row as i64;
            for (col, &coverage) in line.iter().enumerate() {
                if coverage == 0 {
                    continue;
                }
                let coverage = u32::from(coverage);
                let fx = clip.left + col as i64;
                let offset = ((fy * frame_w + fx) as usize) * CHANNELS;
                for (c, v) in data[offset..offset + CHANNELS].iter_mut().enumerate() {
                    let blended =
                        coverage * u32::from(color[c]) + (255 - coverage) * u32::from(*v);
                    *v = ((blended + 127) / 255) as u8;
                }
            }
        }

        Ok(())
    }
}
